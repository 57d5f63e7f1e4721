use std::sync::Arc;

use securechat::{app, config::Config, db, hub::{sweep, Hub}, mirror::Mirror, store::rooms, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("securechat=info,tower_http=warn")),
        )
        .init();

    let config = Config::from_env()?;

    let db_pool = db::connect(&config.database_url).await?;
    db::init_schema(&db_pool).await?;

    let mirror = Mirror::new(config.mirror_url.clone());
    if mirror.is_enabled() {
        tracing::info!("document-store mirroring enabled");
    }

    let (room_id, created) = rooms::get_or_create_default(&db_pool).await?;
    if created {
        mirror.record(
            "rooms",
            serde_json::json!({
                "id": room_id,
                "name": rooms::DEFAULT_ROOM_NAME,
                "type": "public",
                "is_active": true,
            }),
        );
        tracing::info!(room = rooms::DEFAULT_ROOM_NAME, "created default room");
    }

    let hub = Arc::new(Hub::new(db_pool.clone(), room_id, mirror.clone()));
    sweep::spawn(db_pool.clone());

    let state = AppState { db_pool, hub, mirror };

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("chat server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app(state)).await?;

    Ok(())
}
