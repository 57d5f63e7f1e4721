use sqlx::SqlitePool;
use uuid::Uuid;

use crate::clock;
use crate::db;
use crate::store::users;

pub const DEFAULT_ROOM_NAME: &str = "General";

pub async fn create(
    pool: &SqlitePool,
    name: &str,
    room_type: &str,
    created_by: &str,
    description: Option<&str>,
) -> Result<String, sqlx::Error> {
    let id = Uuid::now_v7().to_string();

    sqlx::query(
        "INSERT INTO rooms (id,name,description,type,created_by,is_active,created_at) \
         VALUES (?,?,?,?,?,1,?)",
    )
    .bind(&id)
    .bind(name)
    .bind(description)
    .bind(room_type)
    .bind(created_by)
    .bind(clock::now_ms())
    .execute(pool)
    .await?;

    Ok(id)
}

/// The well-known shared room, created on first boot. Its creator is a
/// bootstrap admin account, itself created on demand. Returns the room id
/// and whether this call created it.
pub async fn get_or_create_default(pool: &SqlitePool) -> anyhow::Result<(String, bool)> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM rooms WHERE name=? AND type='public' AND is_active=1")
            .bind(DEFAULT_ROOM_NAME)
            .fetch_optional(pool)
            .await?;

    if let Some((id,)) = existing {
        return Ok((id, false));
    }

    let admin_id = match users::find_by_username(pool, "admin").await? {
        Some((id, _, _)) => id,
        None => {
            let hash = bcrypt::hash("admin123", 12)?;
            users::create(pool, "admin", "admin@chatapp.com", &hash).await?.id
        }
    };

    let id = create(
        pool,
        DEFAULT_ROOM_NAME,
        "public",
        &admin_id,
        Some("Default public chat room"),
    )
    .await?;

    Ok((id, true))
}

/// Puts the user in the room: creates the membership, or reactivates a
/// deactivated one. A concurrent create losing the race on the
/// UNIQUE(user_id, room_id) constraint counts as already joined.
pub async fn ensure_membership(
    pool: &SqlitePool,
    user_id: &str,
    room_id: &str,
) -> Result<(), sqlx::Error> {
    let existing: Option<(String, bool)> =
        sqlx::query_as("SELECT id,is_active FROM user_rooms WHERE user_id=? AND room_id=?")
            .bind(user_id)
            .bind(room_id)
            .fetch_optional(pool)
            .await?;

    match existing {
        Some((_, true)) => Ok(()),
        Some((id, false)) => {
            sqlx::query("UPDATE user_rooms SET is_active=1 WHERE id=?")
                .bind(id)
                .execute(pool)
                .await?;
            Ok(())
        }
        None => {
            let insert = sqlx::query(
                "INSERT INTO user_rooms (id,user_id,room_id,role,joined_at,is_active) \
                 VALUES (?,?,?,'member',?,1)",
            )
            .bind(Uuid::now_v7().to_string())
            .bind(user_id)
            .bind(room_id)
            .bind(clock::now_ms())
            .execute(pool)
            .await;

            match insert {
                Ok(_) => Ok(()),
                // lost the race to a concurrent join; the row exists
                Err(err) if db::is_unique_violation(&err, "user_rooms") => {
                    sqlx::query("UPDATE user_rooms SET is_active=1 WHERE user_id=? AND room_id=?")
                        .bind(user_id)
                        .bind(room_id)
                        .execute(pool)
                        .await?;
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }
    }
}
