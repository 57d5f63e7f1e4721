use axum::{debug_handler, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::appresult::{AppError, AppResult};
use crate::clock;
use crate::mirror::Mirror;
use crate::session::{self, SessionUser};
use crate::store::users;

#[derive(Deserialize)]
pub(crate) struct LoginBody {
    username: Option<String>,
    password: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    State(mirror): State<Mirror>,
    session: Session,
    Json(LoginBody { username, password }): Json<LoginBody>,
) -> AppResult<Json<Value>> {
    let (Some(username), Some(password)) = (username, password) else {
        return Err(AppError::Validation(
            "Username and password are required".to_owned(),
        ));
    };
    if username.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Username and password are required".to_owned(),
        ));
    }

    // the identifier may also be an email; only active accounts may log in
    let Some(user) = users::find_for_login(&db_pool, &username).await? else {
        return Err(AppError::Auth("Invalid username or password".to_owned()));
    };

    if !bcrypt::verify(&password, &user.password_hash).unwrap_or(false) {
        return Err(AppError::Auth("Invalid username or password".to_owned()));
    }

    users::set_online(&db_pool, &user.id, true).await?;
    mirror.record(
        "users",
        json!({ "id": user.id, "is_online": true, "last_seen": clock::now_ms() }),
    );

    let session_user = SessionUser {
        id: user.id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
    };
    session::establish(&session, &session_user).await?;

    tracing::info!(username = %user.username, "user logged in");
    Ok(Json(json!({ "success": true, "username": user.username })))
}
