use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use verity::api::{self, AppState, KeyStatus};
use verity::config::load_config;
use verity::domains::DomainRegistry;
use verity::pipeline::Pipeline;
use verity::providers::RoleClients;
use verity::search::TavilySearch;
use verity::service::QueryService;
use verity::store::ChatStore;

#[derive(Debug, Parser)]
#[command(name = "verity", about = "Cross-checked question answering service", version)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen host.
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let key_status = KeyStatus::from_env(&config);

    let clients =
        RoleClients::from_config(&config.models).context("failed to initialize model clients")?;
    let search = Arc::new(TavilySearch::from_config(&config.search));
    if !search.is_configured() {
        info!("search API key not set, queries will run without web grounding");
    }

    let pipeline = Pipeline::new(clients, search, &config.pipeline);
    let store = ChatStore::open(&config.store.db_path).context("failed to open chat store")?;
    let service = QueryService::new(store, pipeline, DomainRegistry::builtin());

    let state = Arc::new(AppState {
        service,
        key_status,
    });

    api::run(state, &config).await
}
