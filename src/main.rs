use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use condowatch::config::AppConfig;
use condowatch::db;
use condowatch::handlers;
use condowatch::services::email::http::HttpEmailProvider;
use condowatch::services::mls::{HttpTransport, MlsClient, MlsTokens};
use condowatch::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.admin_token.is_empty() {
        tracing::warn!("ADMIN_TOKEN not set, admin routes are locked");
    }
    if let Err(e) = config.require_digest_settings() {
        tracing::warn!("saved-search digest disabled until configured: {e}");
    }

    let transport = HttpTransport::new(Duration::from_secs(30))?;
    tracing::info!("using MLS feed at {}", config.mls_base_url);
    let mls = MlsClient::new(
        Box::new(transport),
        config.mls_base_url.clone(),
        MlsTokens::from_config(&config),
        config.retry_policy(),
    );
    let mailer = HttpEmailProvider::new(config.email_api_url.clone(), config.email_api_key.clone());

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        mls,
        mailer: Box::new(mailer),
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
