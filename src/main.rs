use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod aggregator;
use aggregator::Aggregator;

mod cache;
use cache::CacheStore;

mod config;
use config::{AppConfig, CliArgs};

mod model;

mod server;
use server::{run_server, RefreshRegistry, ServerState};

mod sources;
use sources::{HttpAssetProber, SourceRegistry};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let config = Arc::new(AppConfig::resolve(cli_args)?);
    info!(
        "Catalog at {:?}, cache at {:?} (TTL {}h), sources from {:?}",
        config.catalog_dir, config.cache_dir, config.cache_ttl_hours, config.sources_file
    );

    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let registry = SourceRegistry::new(
        http.clone(),
        Arc::new(HttpAssetProber::new(http)),
        config.catalog_dir.clone(),
        config.sources_file.clone(),
        config.public_base_url.clone(),
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    let state = ServerState {
        start_time: Instant::now(),
        config: config.clone(),
        cache: Arc::new(CacheStore::new(
            config.cache_dir.clone(),
            config.cache_ttl_hours,
        )),
        aggregator: Arc::new(Aggregator::new(registry)),
        refreshes: Arc::new(RefreshRegistry::new(shutdown.clone())),
    };

    run_server(state, shutdown).await
}
