pub mod args;
pub mod config;
pub mod http;
pub mod llm;
pub mod server;
pub mod store;

use anyhow::Result;
use args::CliArgs;
use config::AppConfig;
use llm::openai::OpenAiForwarder;
use llm::{DEFAULT_SYSTEM_PROMPT, UPSTREAM_TIMEOUT};
use server::AppState;
use store::PromptStore;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub async fn run(args: CliArgs) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load();
    let port = args.port.unwrap_or(config.port);
    let database_path = args.database.unwrap_or_else(|| config.database_path.clone());

    let state = build_state(&config, &database_path).await;

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    server::run_on_listener(listener, state).await
}

/// Opens the store and builds the forwarder. Both failures are logged and
/// leave the process listening in a degraded state rather than exiting.
async fn build_state(config: &AppConfig, database_path: &str) -> AppState {
    let store = match PromptStore::open(database_path) {
        Ok(store) => {
            info!("connected to prompt store at {database_path}");
            if let Err(err) = store.seed_if_empty(DEFAULT_SYSTEM_PROMPT).await {
                error!("failed to seed prompt store: {err}");
            }
            Some(store)
        }
        Err(err) => {
            error!("prompt store connection error: {err}; continuing without persistence");
            None
        }
    };

    let forwarder = match OpenAiForwarder::new(
        reqwest::Client::new(),
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        config.openai_base_url.clone(),
        UPSTREAM_TIMEOUT,
    ) {
        Ok(forwarder) => Some(forwarder),
        Err(err) => {
            warn!("completion forwarding disabled: {err}");
            None
        }
    };

    AppState { store, forwarder }
}
