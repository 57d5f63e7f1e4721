use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::clock;

pub const STATUS_ACTIVE: &str = "active";

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub status: String,
    pub is_online: bool,
    pub last_seen: i64,
}

/// One entry of the broadcast online-user list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

pub async fn create(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, sqlx::Error> {
    let id = Uuid::now_v7().to_string();
    let now = clock::now_ms();

    sqlx::query(
        "INSERT INTO users (id,username,email,password_hash,status,is_online,last_seen,created_at) \
         VALUES (?,?,?,?,?,0,?,?)",
    )
    .bind(&id)
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(STATUS_ACTIVE)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(User {
        id,
        username: username.to_owned(),
        email: email.to_owned(),
        password_hash: password_hash.to_owned(),
        avatar_url: None,
        status: STATUS_ACTIVE.to_owned(),
        is_online: false,
        last_seen: now,
    })
}

/// Login lookup: the identifier may be a username or an email, and only
/// active accounts qualify.
pub async fn find_for_login(pool: &SqlitePool, ident: &str) -> Result<Option<User>, sqlx::Error> {
    let row: Option<(String, String, String, String, Option<String>, String, bool, i64)> =
        sqlx::query_as(
            "SELECT id,username,email,password_hash,avatar_url,status,is_online,last_seen \
             FROM users WHERE (username=? OR email=?) AND status=?",
        )
        .bind(ident)
        .bind(ident)
        .bind(STATUS_ACTIVE)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(
        |(id, username, email, password_hash, avatar_url, status, is_online, last_seen)| User {
            id,
            username,
            email,
            password_hash,
            avatar_url,
            status,
            is_online,
            last_seen,
        },
    ))
}

/// (id, username, avatar_url) of the named user, if any.
pub async fn find_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<(String, String, Option<String>)>, sqlx::Error> {
    sqlx::query_as("SELECT id,username,avatar_url FROM users WHERE username=?")
        .bind(username)
        .fetch_optional(pool)
        .await
}

/// Flips the online flag and stamps last_seen.
pub async fn set_online(
    pool: &SqlitePool,
    user_id: &str,
    is_online: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET is_online=?, last_seen=? WHERE id=?")
        .bind(is_online)
        .bind(clock::now_ms())
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// The canonical roster: online, active accounts only.
pub async fn online(pool: &SqlitePool) -> Result<Vec<RosterEntry>, sqlx::Error> {
    let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
        "SELECT id,username,avatar_url FROM users \
         WHERE is_online=1 AND status=? ORDER BY username",
    )
    .bind(STATUS_ACTIVE)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, username, avatar_url)| RosterEntry {
            id,
            username,
            avatar_url,
        })
        .collect())
}

/// Marks every user offline whose last_seen is older than the threshold.
/// Returns how many rows were flipped.
pub async fn mark_stale_offline(
    pool: &SqlitePool,
    threshold_ms: i64,
) -> Result<u64, sqlx::Error> {
    let cutoff = clock::now_ms() - threshold_ms;

    let result = sqlx::query("UPDATE users SET is_online=0 WHERE is_online=1 AND last_seen < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
