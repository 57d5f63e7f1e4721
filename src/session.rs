use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::appresult::AppResult;

pub const USER: &str = "user";

/// What the login/register handlers put in the session. The websocket
/// gateway reads it back to bind a connection to an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

pub async fn current_user(session: &Session) -> AppResult<Option<SessionUser>> {
    Ok(session.get::<SessionUser>(USER).await?)
}

pub async fn establish(session: &Session, user: &SessionUser) -> AppResult<()> {
    session.insert(USER, user).await?;
    Ok(())
}
