mod auth;
mod error;
mod routes;

use std::sync::Arc;

use anyhow::Result;
use innerforge_core::config::ForgeConfig;
use innerforge_core::storage::{self, SqliteStore};

pub struct AppState {
    pub store: SqliteStore,
    pub config: ForgeConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "innerforge_web=info,tower_http=warn".parse().unwrap()),
        )
        .init();

    let config = ForgeConfig::load(None).unwrap_or_else(|_| ForgeConfig::default_config());

    let store = storage::open_from_config(&config)?;
    tracing::info!(db = %store.path().display(), "database ready");

    let state = Arc::new(AppState {
        store,
        config: config.clone(),
    });

    let app = routes::router()
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.web.host, config.web.port);
    tracing::info!("innerforge-web listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
