use sqlx::SqlitePool;
use uuid::Uuid;

use crate::clock;

/// A persisted message annotated with its author's username, the shape the
/// wire payloads are built from.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: String,
    pub username: String,
    pub content: String,
    pub created_at: i64,
}

pub async fn insert(
    pool: &SqlitePool,
    room_id: &str,
    user_id: &str,
    username: &str,
    content: &str,
) -> Result<StoredMessage, sqlx::Error> {
    let id = Uuid::now_v7().to_string();
    let now = clock::now_ms();

    sqlx::query(
        "INSERT INTO messages (id,content,type,user_id,room_id,is_deleted,created_at) \
         VALUES (?,?,'text',?,?,0,?)",
    )
    .bind(&id)
    .bind(content)
    .bind(user_id)
    .bind(room_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(StoredMessage {
        id,
        username: username.to_owned(),
        content: content.to_owned(),
        created_at: now,
    })
}

/// The most recent `limit` non-deleted messages of the room, oldest first.
/// Ties on created_at fall back to the id, which is insertion-ordered.
pub async fn recent(
    pool: &SqlitePool,
    room_id: &str,
    limit: i64,
) -> Result<Vec<StoredMessage>, sqlx::Error> {
    let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
        "SELECT id,username,content,created_at FROM ( \
            SELECT m.id AS id, u.username AS username, m.content AS content, \
                   m.created_at AS created_at \
            FROM messages m JOIN users u ON u.id = m.user_id \
            WHERE m.room_id=? AND m.is_deleted=0 \
            ORDER BY m.created_at DESC, m.id DESC LIMIT ? \
         ) ORDER BY created_at ASC, id ASC",
    )
    .bind(room_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, username, content, created_at)| StoredMessage {
            id,
            username,
            content,
            created_at,
        })
        .collect())
}
