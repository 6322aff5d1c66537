mod config;

use std::sync::Arc;

use tracing::info;

use justtext_api::auth::{AppState, AppStateInner};
use justtext_api::routes;
use justtext_api::token::TokenSigner;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "justtext_server=debug,justtext_api=debug,justtext_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = justtext_db::Database::open(&config.db_path)?;

    // Shared state
    let tokens = TokenSigner::new(&config.secret_key, chrono::Duration::minutes(config.token_ttl_minutes));
    let app_state: AppState = Arc::new(AppStateInner::new(db, tokens));

    let app = routes::router(app_state);

    info!("just-text server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
