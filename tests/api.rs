//! End-to-end tests: a real listener, the real router, real sockets.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use securechat::hub::event::{ChatMessage, ServerEvent};
use securechat::hub::Hub;
use securechat::mirror::Mirror;
use securechat::store::rooms;
use securechat::{app, db, AppState};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    base_url: String,
    ws_url: String,
    client: reqwest::Client,
}

impl TestServer {
    async fn spawn() -> Self {
        let db_pool = db::connect_memory().await.unwrap();
        db::init_schema(&db_pool).await.unwrap();

        let mirror = Mirror::disabled();
        let (room_id, _) = rooms::get_or_create_default(&db_pool).await.unwrap();
        let hub = Arc::new(Hub::new(db_pool.clone(), room_id, mirror.clone()));
        let state = AppState { db_pool, hub, mirror };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            ws_url: format!("ws://{addr}/ws"),
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Registers a user and returns their session cookie.
    async fn register(&self, username: &str, email: &str, password: &str) -> String {
        let resp = self
            .post(
                "/api/register",
                json!({ "username": username, "email": email, "password": password }),
            )
            .await;
        assert_eq!(resp.status(), 201);
        session_cookie(&resp)
    }

    async fn connect_ws(&self, cookie: &str) -> WsStream {
        let mut request = self.ws_url.as_str().into_client_request().unwrap();
        request
            .headers_mut()
            .insert("Cookie", cookie.parse::<HeaderValue>().unwrap());
        let (ws, _) = tokio_tungstenite::connect_async(request).await.unwrap();
        ws
    }
}

fn session_cookie(resp: &reqwest::Response) -> String {
    let raw = resp
        .headers()
        .get("set-cookie")
        .expect("response should set a session cookie")
        .to_str()
        .unwrap();
    raw.split(';').next().unwrap().to_owned()
}

async fn send_event(ws: &mut WsStream, event_type: &str, data: Value) {
    let frame = json!({ "type": event_type, "data": data }).to_string();
    ws.send(Message::Text(frame.into())).await.unwrap();
}

async fn next_event(ws: &mut WsStream) -> ServerEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for an event")
            .expect("socket closed unexpectedly")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn join(ws: &mut WsStream, username: &str) -> Vec<ChatMessage> {
    send_event(ws, "join", json!({ "username": username })).await;
    match next_event(ws).await {
        ServerEvent::History(history) => history,
        other => panic!("expected history first, got {other:?}"),
    }
}

#[tokio::test]
async fn register_login_session_logout_roundtrip() {
    let server = TestServer::spawn().await;

    // validation failures come back as 400
    let resp = server
        .post(
            "/api/register",
            json!({ "username": "al", "email": "al@x.com", "password": "secret1" }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    let resp = server
        .post(
            "/api/register",
            json!({ "username": "alice", "email": "alice@x.com", "password": "12345" }),
        )
        .await;
    assert_eq!(resp.status(), 400);

    let cookie = server.register("alice", "alice@x.com", "secret1").await;

    // duplicates are conflicts
    let resp = server
        .post(
            "/api/register",
            json!({ "username": "alice", "email": "other@x.com", "password": "secret1" }),
        )
        .await;
    assert_eq!(resp.status(), 409);
    assert_eq!(
        resp.json::<Value>().await.unwrap()["error"],
        "Username already exists"
    );

    // the register response established a session
    let resp = server
        .client
        .get(format!("{}/api/session", server.base_url))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"]["username"], "alice");

    // bad credentials
    let resp = server
        .post("/api/login", json!({ "username": "alice", "password": "wrong" }))
        .await;
    assert_eq!(resp.status(), 401);

    // login works by username or email
    let resp = server
        .post(
            "/api/login",
            json!({ "username": "alice@x.com", "password": "secret1" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap()["username"], "alice");

    // logout destroys the session
    let resp = server
        .client
        .post(format!("{}/api/logout", server.base_url))
        .header("Cookie", &cookie)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = server
        .client
        .get(format!("{}/api/session", server.base_url))
        .header("Cookie", &cookie)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn websocket_requires_a_session() {
    let server = TestServer::spawn().await;

    let request = server.ws_url.as_str().into_client_request().unwrap();
    let err = tokio_tungstenite::connect_async(request).await;
    assert!(err.is_err(), "upgrade without a session must be refused");
}

#[tokio::test]
async fn two_clients_chat_end_to_end() {
    let server = TestServer::spawn().await;
    let alice_cookie = server.register("alice", "alice@x.com", "secret1").await;
    let bob_cookie = server.register("bob", "bob@x.com", "secret1").await;

    let join_time = time::OffsetDateTime::now_utc();

    // alice joins an empty room: history first, then the roster
    let mut alice = server.connect_ws(&alice_cookie).await;
    let history = join(&mut alice, "alice").await;
    assert!(history.is_empty());
    match next_event(&mut alice).await {
        ServerEvent::Roster(entries) => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].username, "alice");
        }
        other => panic!("expected roster, got {other:?}"),
    }

    // bob joins: alice hears about it, both see the two-user roster
    let mut bob = server.connect_ws(&bob_cookie).await;
    let history = join(&mut bob, "bob").await;
    assert!(history.is_empty());

    match next_event(&mut alice).await {
        ServerEvent::PresenceJoined(notice) => {
            assert_eq!(notice.message, "bob joined the chat");
        }
        other => panic!("expected presence-joined, got {other:?}"),
    }
    for ws in [&mut alice, &mut bob] {
        match next_event(ws).await {
            ServerEvent::Roster(entries) => {
                let names: Vec<&str> =
                    entries.iter().map(|entry| entry.username.as_str()).collect();
                assert_eq!(names, vec!["alice", "bob"]);
            }
            other => panic!("expected roster, got {other:?}"),
        }
    }

    // alice posts; the server echo reaches both, with a fresh timestamp
    send_event(&mut alice, "message", json!({ "message": "hi" })).await;
    for ws in [&mut alice, &mut bob] {
        match next_event(ws).await {
            ServerEvent::Message(msg) => {
                assert_eq!(msg.username, "alice");
                assert_eq!(msg.message, "hi");
                assert!(!msg.id.is_empty());
                let stamp = time::OffsetDateTime::parse(
                    &msg.timestamp,
                    &time::format_description::well_known::Rfc3339,
                )
                .unwrap();
                assert!(stamp >= join_time - time::Duration::seconds(1));
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    // typing reaches bob only
    send_event(&mut alice, "typing", json!({ "isTyping": true })).await;
    match next_event(&mut bob).await {
        ServerEvent::Typing { username, is_typing } => {
            assert_eq!(username, "alice");
            assert!(is_typing);
        }
        other => panic!("expected typing, got {other:?}"),
    }

    // bob leaves; alice gets the notice and a one-user roster
    bob.close(None).await.unwrap();
    match next_event(&mut alice).await {
        ServerEvent::PresenceLeft(notice) => {
            assert_eq!(notice.message, "bob left the chat");
        }
        other => panic!("expected presence-left, got {other:?}"),
    }
    match next_event(&mut alice).await {
        ServerEvent::Roster(entries) => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].username, "alice");
        }
        other => panic!("expected roster, got {other:?}"),
    }
}

#[tokio::test]
async fn join_with_foreign_username_is_rejected() {
    let server = TestServer::spawn().await;
    let alice_cookie = server.register("alice", "alice@x.com", "secret1").await;

    let mut alice = server.connect_ws(&alice_cookie).await;
    send_event(&mut alice, "join", json!({ "username": "admin" })).await;
    match next_event(&mut alice).await {
        ServerEvent::Error { message } => {
            assert_eq!(message, "Username does not match session");
        }
        other => panic!("expected error, got {other:?}"),
    }

    // messages before a successful join are rejected too
    send_event(&mut alice, "message", json!({ "message": "hi" })).await;
    match next_event(&mut alice).await {
        ServerEvent::Error { message } => {
            assert_eq!(message, "User not authenticated");
        }
        other => panic!("expected error, got {other:?}"),
    }
}
