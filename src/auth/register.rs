use axum::{debug_handler, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::appresult::{AppError, AppResult};
use crate::db;
use crate::mirror::Mirror;
use crate::session::{self, SessionUser};
use crate::store::users;
use crate::validation;

pub const BCRYPT_COST: u32 = 12;

#[derive(Deserialize)]
pub(crate) struct RegisterBody {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn register(
    State(db_pool): State<SqlitePool>,
    State(mirror): State<Mirror>,
    session: Session,
    Json(RegisterBody { username, email, password }): Json<RegisterBody>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let (Some(username), Some(email), Some(password)) = (username, email, password) else {
        return Err(AppError::Validation("All fields are required".to_owned()));
    };

    validation::validate_username(&username)?;
    validation::validate_email(&email)?;
    validation::validate_password(&password)?;

    let password_hash = bcrypt::hash(&password, BCRYPT_COST).map_err(anyhow::Error::from)?;

    let user = match users::create(&db_pool, &username, &email, &password_hash).await {
        Ok(user) => user,
        Err(err) if db::is_unique_violation(&err, "users.username") => {
            return Err(AppError::Conflict("Username already exists".to_owned()));
        }
        Err(err) if db::is_unique_violation(&err, "users.email") => {
            return Err(AppError::Conflict("Email already exists".to_owned()));
        }
        Err(err) => return Err(err.into()),
    };

    mirror.record(
        "users",
        json!({
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "status": user.status,
            "is_online": false,
            "last_seen": user.last_seen,
        }),
    );

    let session_user = SessionUser {
        id: user.id.clone(),
        username: user.username.clone(),
        email: user.email.clone(),
    };
    session::establish(&session, &session_user).await?;

    tracing::info!(username = %user.username, "new user registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "username": user.username })),
    ))
}
