use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use careloop::api::{server::start_server, ApiContext};
use careloop::config::{self, LlmConfig};
use careloop::db::sqlite::open_database;
use careloop::pipeline::llm::LlmClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = config::APP_VERSION, "starting {}", config::APP_NAME);

    let data_dir = config::app_data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let db_path = config::database_path();

    // Open once at startup so migrations run before the first request.
    let conn = open_database(&db_path)?;
    drop(conn);
    info!(path = %db_path.display(), "database ready");

    let llm_config = LlmConfig::from_env();
    info!(model = %llm_config.model, endpoint = %llm_config.base_url, "model endpoint configured");
    let llm = LlmClient::new(&llm_config)?;

    let ctx = ApiContext::new(db_path, Arc::new(llm));
    let bind_addr =
        std::env::var("CARELOOP_BIND_ADDR").unwrap_or_else(|_| config::DEFAULT_BIND_ADDR.into());
    let mut server = start_server(ctx, &bind_addr).await?;
    info!(addr = %server.addr, "listening");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    server.shutdown();

    Ok(())
}
