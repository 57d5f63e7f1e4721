use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                use sqlx::Executor;
                conn.execute("PRAGMA busy_timeout = 5000").await?;
                conn.execute("PRAGMA journal_mode = WAL").await?;
                conn.execute("PRAGMA foreign_keys = ON").await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    Ok(pool)
}

/// In-memory database on a single connection, for tests. With more than one
/// connection each would get its own empty `:memory:` database.
pub async fn connect_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .context("Failed to open in-memory database")?;

    Ok(pool)
}

pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY NOT NULL,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            avatar_url TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            is_online INTEGER NOT NULL DEFAULT 0,
            last_seen INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            type TEXT NOT NULL DEFAULT 'public',
            created_by TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            max_members INTEGER,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (created_by) REFERENCES users (id)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create rooms table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY NOT NULL,
            content TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'text',
            user_id TEXT NOT NULL,
            room_id TEXT NOT NULL,
            reply_to_id TEXT,
            edited_at INTEGER,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users (id),
            FOREIGN KEY (room_id) REFERENCES rooms (id),
            FOREIGN KEY (reply_to_id) REFERENCES messages (id)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create messages table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_rooms (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            room_id TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'member',
            joined_at INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            last_read_message_id TEXT,
            UNIQUE (user_id, room_id),
            FOREIGN KEY (user_id) REFERENCES users (id),
            FOREIGN KEY (room_id) REFERENCES rooms (id),
            FOREIGN KEY (last_read_message_id) REFERENCES messages (id)
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create user_rooms table")?;

    for index in [
        "CREATE INDEX IF NOT EXISTS idx_users_status ON users (status)",
        "CREATE INDEX IF NOT EXISTS idx_users_is_online ON users (is_online)",
        "CREATE INDEX IF NOT EXISTS idx_messages_room_id ON messages (room_id)",
        "CREATE INDEX IF NOT EXISTS idx_messages_user_id ON messages (user_id)",
        "CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages (created_at)",
        "CREATE INDEX IF NOT EXISTS idx_user_rooms_room_id ON user_rooms (room_id)",
    ] {
        sqlx::query(index)
            .execute(pool)
            .await
            .context("Failed to create index")?;
    }

    Ok(())
}

/// True when `err` is sqlite's unique-constraint violation and the failing
/// column list mentions `what` (e.g. "users.username").
pub fn is_unique_violation(err: &sqlx::Error, what: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            let msg = db.message();
            msg.contains("UNIQUE constraint failed") && msg.contains(what)
        }
        _ => false,
    }
}
