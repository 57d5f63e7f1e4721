//! Transport gateway: owns the physical websocket, binds it to the identity
//! from the HTTP session, and translates wire events into hub operations.

use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_sessions::Session;
use uuid::Uuid;

use crate::appresult::{AppError, AppResult};
use crate::hub::event::{ClientEvent, ServerEvent};
use crate::hub::Hub;
use crate::session::{self, SessionUser};

#[debug_handler(state = crate::AppState)]
pub async fn chat_ws(
    State(hub): State<Arc<Hub>>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    // no session, no socket; the session identity is what may join
    let Some(user) = session::current_user(&session).await? else {
        return Err(AppError::Auth("Login required".to_owned()));
    };

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, hub, user))
        .into_response())
}

async fn handle_socket(socket: WebSocket, hub: Arc<Hub>, user: SessionUser) {
    let conn_id = Uuid::now_v7();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (mut sender, mut receiver) = socket.split();

    let forward_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = receiver.next().await {
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let Ok(event) = serde_json::from_str::<ClientEvent>(text.as_str()) else {
            continue;
        };

        match event {
            ClientEvent::Join { username } => {
                if username != user.username {
                    let _ = tx.send(ServerEvent::Error {
                        message: "Username does not match session".to_owned(),
                    });
                    continue;
                }

                if let Err(err) = hub.announce_join(conn_id, &user.username, tx.clone()).await {
                    let message = match err {
                        AppError::NotFound(msg) => msg,
                        err => {
                            tracing::error!(username = %user.username, "join failed: {err}");
                            "Failed to join chat".to_owned()
                        }
                    };
                    let _ = tx.send(ServerEvent::Error { message });
                }
            }
            ClientEvent::Message { message } => {
                if let Err(err) = hub.post_message(conn_id, &message).await {
                    let message = match err {
                        AppError::Auth(msg) | AppError::Validation(msg) => msg,
                        err => {
                            tracing::error!(username = %user.username, "message failed: {err}");
                            "Failed to send message".to_owned()
                        }
                    };
                    let _ = tx.send(ServerEvent::Error { message });
                }
            }
            ClientEvent::Typing { is_typing } => {
                hub.set_typing(conn_id, is_typing).await;
            }
        }
    }

    if let Err(err) = hub.disconnect(conn_id).await {
        tracing::error!(username = %user.username, "disconnect cleanup failed: {err}");
    }
    forward_task.abort();
}
