mod login;
mod logout;
mod register;

use axum::{debug_handler, routing::{get, post}, Json, Router};
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::appresult::AppResult;
use crate::session;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::register))
        .route("/login", post(login::login))
        .route("/session", get(session_status))
        .route("/logout", post(logout::logout))
}

#[debug_handler]
async fn session_status(session: Session) -> AppResult<Json<Value>> {
    Ok(Json(match session::current_user(&session).await? {
        Some(user) => json!({ "authenticated": true, "user": user }),
        None => json!({ "authenticated": false }),
    }))
}
