//! Periodic presence reconciliation. Clients that crash or drop their
//! socket never deliver a disconnect event, so a timer flips any online
//! flag whose last_seen has gone stale. The live-connection map is left
//! alone; the durable flag and the map may disagree until the next real
//! join or leave.

use std::time::Duration;

use sqlx::SqlitePool;

use crate::store::users;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const OFFLINE_THRESHOLD_MS: i64 = 5 * 60 * 1000;

pub async fn sweep_inactive(pool: &SqlitePool, threshold_ms: i64) -> Result<u64, sqlx::Error> {
    users::mark_stale_offline(pool, threshold_ms).await
}

/// Runs the sweep every `SWEEP_INTERVAL` until the process exits. Failures
/// are logged and the loop keeps going.
pub fn spawn(pool: SqlitePool) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await; // the first tick fires immediately

        loop {
            ticker.tick().await;
            match sweep_inactive(&pool, OFFLINE_THRESHOLD_MS).await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "marked inactive users offline"),
                Err(err) => tracing::error!("presence sweep failed: {err}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock;
    use crate::db;

    #[tokio::test]
    async fn sweep_only_touches_stale_online_users() {
        let pool = db::connect_memory().await.unwrap();
        db::init_schema(&pool).await.unwrap();

        let stale = users::create(&pool, "stale", "stale@x.com", "h").await.unwrap();
        let fresh = users::create(&pool, "fresh", "fresh@x.com", "h").await.unwrap();
        let offline = users::create(&pool, "offline", "offline@x.com", "h").await.unwrap();

        users::set_online(&pool, &stale.id, true).await.unwrap();
        users::set_online(&pool, &fresh.id, true).await.unwrap();

        let old = clock::now_ms() - OFFLINE_THRESHOLD_MS - 1_000;
        sqlx::query("UPDATE users SET last_seen=? WHERE id=?")
            .bind(old)
            .bind(&stale.id)
            .execute(&pool)
            .await
            .unwrap();
        // an already-offline user with an old last_seen is not counted
        sqlx::query("UPDATE users SET last_seen=? WHERE id=?")
            .bind(old)
            .bind(&offline.id)
            .execute(&pool)
            .await
            .unwrap();

        let flipped = sweep_inactive(&pool, OFFLINE_THRESHOLD_MS).await.unwrap();
        assert_eq!(flipped, 1);

        let names: Vec<String> = users::online(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.username)
            .collect();
        assert_eq!(names, vec!["fresh"]);
    }
}
