//! Presence & broadcast hub: the in-memory registry of live connections and
//! the event handlers that fan chat traffic out to them.
//!
//! The connection map belongs to the hub alone; everything else goes through
//! the operations below. Store calls are suspension points and no lock is
//! held across them, so presence flags are last-write-wins and the
//! membership check-then-create race resolves as a benign conflict.

pub mod event;
pub mod sweep;

use std::collections::HashMap;

use sqlx::SqlitePool;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::appresult::{AppError, AppResult};
use crate::clock;
use crate::mirror::Mirror;
use crate::store::{messages, rooms, users};
use crate::validation;

use self::event::{ChatMessage, PresenceNotice, ServerEvent};

/// How much history a joining connection is replayed.
pub const HISTORY_LIMIT: i64 = 100;

pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// One open socket bound to one user for the socket's lifetime.
#[derive(Debug)]
struct LiveConnection {
    user_id: String,
    username: String,
    #[allow(dead_code)]
    joined_at: i64,
    tx: EventSender,
}

pub struct Hub {
    pool: SqlitePool,
    room_id: String,
    mirror: Mirror,
    connections: RwLock<HashMap<Uuid, LiveConnection>>,
}

impl Hub {
    pub fn new(pool: SqlitePool, room_id: String, mirror: Mirror) -> Self {
        Self {
            pool,
            room_id,
            mirror,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// A connection announces who it is. Resolves the username (NotFound if
    /// it doesn't exist), registers the live connection, marks the user
    /// online, ensures an active membership in the shared room, replays
    /// history privately to the joiner, tells everyone else, and
    /// rebroadcasts the roster to all.
    ///
    /// Joining again over the same connection re-runs the sequence and never
    /// errors; the registry entry is simply replaced.
    pub async fn announce_join(
        &self,
        conn_id: Uuid,
        username: &str,
        tx: EventSender,
    ) -> AppResult<()> {
        let Some((user_id, username, _avatar_url)) =
            users::find_by_username(&self.pool, username).await?
        else {
            return Err(AppError::NotFound("User not found".to_owned()));
        };

        self.connections.write().await.insert(
            conn_id,
            LiveConnection {
                user_id: user_id.clone(),
                username: username.clone(),
                joined_at: clock::now_ms(),
                tx: tx.clone(),
            },
        );

        users::set_online(&self.pool, &user_id, true).await?;
        self.mirror_user_status(&user_id, true);

        rooms::ensure_membership(&self.pool, &user_id, &self.room_id).await?;

        let history: Vec<ChatMessage> = messages::recent(&self.pool, &self.room_id, HISTORY_LIMIT)
            .await?
            .into_iter()
            .map(ChatMessage::from)
            .collect();
        let _ = tx.send(ServerEvent::History(history));

        self.broadcast_except(
            conn_id,
            ServerEvent::PresenceJoined(PresenceNotice::new(&username, "joined")),
        )
        .await;

        self.broadcast_roster().await?;

        tracing::info!(%username, "joined the chat");
        Ok(())
    }

    /// Persists a message from a joined connection, then broadcasts the
    /// persisted row to every connection including the sender; the server
    /// echo is the authoritative copy.
    pub async fn post_message(&self, conn_id: Uuid, content: &str) -> AppResult<()> {
        let (user_id, username) = {
            let connections = self.connections.read().await;
            let Some(conn) = connections.get(&conn_id) else {
                return Err(AppError::Auth("User not authenticated".to_owned()));
            };
            (conn.user_id.clone(), conn.username.clone())
        };

        validation::validate_message_content(content)?;

        let stored = messages::insert(&self.pool, &self.room_id, &user_id, &username, content).await?;

        self.mirror.record(
            "messages",
            serde_json::json!({
                "id": stored.id,
                "content": stored.content,
                "type": "text",
                "user_id": user_id,
                "room_id": self.room_id,
                "username": stored.username,
                "created_at": stored.created_at,
            }),
        );

        self.broadcast(ServerEvent::Message(ChatMessage::from(stored))).await;
        Ok(())
    }

    /// Relays a typing signal to everyone but the typist. Unregistered
    /// connections are ignored; repeat calls just re-broadcast.
    pub async fn set_typing(&self, conn_id: Uuid, is_typing: bool) {
        let username = {
            let connections = self.connections.read().await;
            match connections.get(&conn_id) {
                Some(conn) => conn.username.clone(),
                None => return,
            }
        };

        self.broadcast_except(conn_id, ServerEvent::Typing { username, is_typing })
            .await;
    }

    /// Removes the connection, marks the user offline and tells the
    /// remaining connections. Removal from the map decides whether anything
    /// happens, so a second call for the same id is a no-op.
    pub async fn disconnect(&self, conn_id: Uuid) -> AppResult<()> {
        let Some(conn) = self.connections.write().await.remove(&conn_id) else {
            return Ok(());
        };

        users::set_online(&self.pool, &conn.user_id, false).await?;
        self.mirror_user_status(&conn.user_id, false);

        self.broadcast(ServerEvent::PresenceLeft(PresenceNotice::new(
            &conn.username,
            "left",
        )))
        .await;

        self.broadcast_roster().await?;

        tracing::info!(username = %conn.username, "left the chat");
        Ok(())
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    async fn broadcast_roster(&self) -> AppResult<()> {
        let roster = users::online(&self.pool).await?;
        self.broadcast(ServerEvent::Roster(roster)).await;
        Ok(())
    }

    /// Sends to every live connection; a send to a connection that died
    /// mid-flight is dropped.
    async fn broadcast(&self, event: ServerEvent) {
        let connections = self.connections.read().await;
        for conn in connections.values() {
            let _ = conn.tx.send(event.clone());
        }
    }

    async fn broadcast_except(&self, skip: Uuid, event: ServerEvent) {
        let connections = self.connections.read().await;
        for (id, conn) in connections.iter() {
            if *id != skip {
                let _ = conn.tx.send(event.clone());
            }
        }
    }

    fn mirror_user_status(&self, user_id: &str, is_online: bool) {
        self.mirror.record(
            "users",
            serde_json::json!({
                "id": user_id,
                "is_online": is_online,
                "last_seen": clock::now_ms(),
            }),
        );
    }
}
