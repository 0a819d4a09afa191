//! Process bootstrap (Component K, §4.K): load config, build the Query
//! Client / Snapshot Store / On-Chain Publisher, then either run the HTTP
//! API or perform a one-shot distribution close.
//!
//! Grounded on the teacher's `src/main.rs` startup sequence (tracing init
//! from a level string, build shared clients once, `axum::serve(...)
//! .with_graceful_shutdown(...)`), scaled down to this service's actual
//! dependency graph — no mempool/gossip/mining background tasks, since
//! those have no counterpart here.

use std::sync::Arc;

use epoch_orchestrator::api::{self, AppState};
use epoch_orchestrator::chain::{OnChainPublisher, RpcPublisher};
use epoch_orchestrator::cli::{Cli, Command};
use epoch_orchestrator::config::{Config, LogConfig, LogFormat};
use epoch_orchestrator::domain::Address;
use epoch_orchestrator::driver::close_epoch;
use epoch_orchestrator::error::{OrchestratorError, Result};
use epoch_orchestrator::indexer::{GraphQlClient, QueryClient};
use epoch_orchestrator::store::SnapshotStore;

use clap::Parser;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("epoch-orchestrator: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load_from_file(&cli.config)?;
    init_tracing(&config.log)?;

    let query: Arc<dyn QueryClient> =
        Arc::new(GraphQlClient::new(config.indexer.endpoint.clone(), config.indexer.timeout)?);
    let store = Arc::new(SnapshotStore::open(&config.store.path)?);
    let publisher: Arc<dyn OnChainPublisher> = Arc::new(RpcPublisher::from_config(&config.chain)?);

    match cli.command() {
        Command::Serve => serve(config, query, store, publisher).await,
        Command::Close { vault, epoch } => {
            let vault = Address::parse(&vault)?;
            let result = close_epoch(query.as_ref(), &store, publisher.as_ref(), vault, epoch).await?;
            println!("{}", serde_json::to_string_pretty(&result).expect("serializing result"));
            Ok(())
        }
    }
}

async fn serve(
    config: Config,
    query: Arc<dyn QueryClient>,
    store: Arc<SnapshotStore>,
    publisher: Arc<dyn OnChainPublisher>,
) -> Result<()> {
    if let Some(interval) = config.driver.close_interval {
        spawn_close_ticker(
            interval,
            config.driver.vaults.clone(),
            query.clone(),
            store.clone(),
            publisher.clone(),
        );
    }

    let state = AppState::new(query, store, publisher);
    let app = api::router(state);

    let addr = config.api.bind_addr.clone();
    tracing::info!(listen = %addr, "epoch orchestrator listening");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| OrchestratorError::ConfigError(format!("binding {addr}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .map_err(|e| OrchestratorError::ConfigError(format!("server error: {e}")))
}

/// Closes each configured vault's active epoch on a fixed interval. Failures
/// are logged and do not stop the ticker (§4.K).
fn spawn_close_ticker(
    interval: std::time::Duration,
    vaults: Vec<String>,
    query: Arc<dyn QueryClient>,
    store: Arc<SnapshotStore>,
    publisher: Arc<dyn OnChainPublisher>,
) {
    if vaults.is_empty() {
        tracing::warn!("driver.close_interval is set but driver.vaults is empty; ticker is a no-op");
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for raw_vault in &vaults {
                let vault = match Address::parse(raw_vault) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(vault = %raw_vault, error = %e, "skipping malformed vault in ticker");
                        continue;
                    }
                };
                match close_epoch(query.as_ref(), &store, publisher.as_ref(), vault, None).await {
                    Ok(result) => {
                        tracing::info!(vault = %vault, accounts = result.accounts, "ticker close completed")
                    }
                    Err(e) => tracing::error!(vault = %vault, error = %e, "ticker close failed"),
                }
            }
        }
    });
}

fn build_log_writer(output: &str) -> Result<BoxMakeWriter> {
    match output {
        "stdout" => Ok(BoxMakeWriter::new(std::io::stdout)),
        "stderr" => Ok(BoxMakeWriter::new(std::io::stderr)),
        path => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| OrchestratorError::ConfigError(format!("opening log.output {path}: {e}")))?;
            Ok(BoxMakeWriter::new(move || {
                file.try_clone().expect("cloning log file handle")
            }))
        }
    }
}

fn init_tracing(log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = build_log_writer(&log.output)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer);

    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
    Ok(())
}
