use axum::{debug_handler, extract::State, Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::appresult::AppResult;
use crate::clock;
use crate::mirror::Mirror;
use crate::session;
use crate::store::users;

/// Marks the user offline and destroys the session. Calling without a
/// session is fine and still succeeds.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn logout(
    State(db_pool): State<SqlitePool>,
    State(mirror): State<Mirror>,
    session: Session,
) -> AppResult<Json<Value>> {
    if let Some(user) = session::current_user(&session).await? {
        users::set_online(&db_pool, &user.id, false).await?;
        mirror.record(
            "users",
            json!({ "id": user.id, "is_online": false, "last_seen": clock::now_ms() }),
        );
        session.flush().await?;
        tracing::info!(username = %user.username, "user logged out");
    }

    Ok(Json(json!({ "success": true })))
}
