pub mod appresult;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod hub;
pub mod index;
pub mod mirror;
pub mod res;
pub mod session;
pub mod store;
pub mod validation;
pub mod ws;

use std::sync::Arc;

use axum::{extract::FromRef, http::Method, routing::get, Router};
use sqlx::SqlitePool;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub use appresult::{AppError, AppResult};

use hub::Hub;
use mirror::Mirror;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub hub: Arc<Hub>,
    pub mirror: Mirror,
}

/// The full application: API routes, the websocket endpoint, the embedded
/// shell as fallback, with session, CORS and trace layers attached.
pub fn app(state: AppState) -> Router {
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(24)));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .nest("/api", auth::router())
        .route("/ws", get(ws::chat_ws))
        .fallback(index::shell)
        .with_state(state)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
