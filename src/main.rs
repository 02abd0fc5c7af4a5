use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use archen_api::{app_router, config, db, events, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let db = Arc::new(
        db::establish_connection_from_app_config(&cfg)
            .await
            .context("failed to connect to database")?,
    );
    if cfg.auto_migrate {
        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;
    }

    let (event_sender, mut event_rx) = events::channel(cfg.event_channel_capacity);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "domain event");
        }
    });

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let state = AppState::new(db, cfg, Arc::new(event_sender));
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "archen-api listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
