pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod extract;
pub mod llm;
pub mod models;
pub mod prompt;
pub mod session;
pub mod transcript;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::ApiContext;
use crate::auth::CredentialStore;
use crate::llm::{GenerationOptions, ResponsesClient};
use crate::transcript::TranscriptStore;

/// Load config, open the stores and serve until the process is killed.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let cfg = config::Config::from_env()?;

    let credentials = CredentialStore::open(&config::users_db_path())?;
    let transcripts = TranscriptStore::new(&config::transcripts_dir());
    let client = ResponsesClient::new(
        &cfg.api_base_url,
        &cfg.api_key,
        &cfg.model,
        llm::DEFAULT_TIMEOUT_SECS,
    );
    let options = GenerationOptions {
        web_search: cfg.enable_web_search,
        max_output_tokens: cfg.max_output_tokens,
    };

    let ctx = ApiContext::new(credentials, transcripts, Arc::new(client), options);

    let server = api::start_server(ctx, cfg.bind_addr).await?;
    tracing::info!(addr = %server.addr, "listening");
    server.join().await;

    Ok(())
}
