use std::sync::Arc;

mod app;
mod config;
mod error;
mod state;
mod users;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "userhub=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(
        name = %config.application.name,
        version = %config.application.version,
        base_path = %config.application.base_path(),
        "starting"
    );

    let db = state::connect(&config.database).await?;
    let app = app::build_app(AppState::init(config.clone(), db.clone())?);
    let served = app::serve(app, &config.http.address(), config.http.shutdown_timeout).await;

    db.close().await;
    tracing::info!("database pool closed");
    served
}
