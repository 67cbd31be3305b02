//! # APR Table
//!
//! One-shot run: prices the token catalog, populates every configured staking
//! contract and prints the protocol-by-pair APR matrix.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin apr_table -- --config Config.toml --retries 3
//! cargo run --bin apr_table -- --json
//! ```
//!
//! `SDK_RPC_HTTP_URL`, `SDK_CLASSIFICATION_CACHE_PATH` and `SDK_MULTICALL_ADDRESS` override
//! the config file.

use anyhow::{Context, Result};
use clap::Parser;
use ethers::prelude::{Http, Provider};
use futures::future::join_all;
use log::{info, warn};
use mig_yield_sdk::{
    aggregator::{self, AprMatrix},
    classification_cache::{ClassificationStore, FileClassificationStore, InMemoryClassificationStore},
    classifier::PoolTypeClassifier,
    coingecko_price_updater::CoinGeckoPriceUpdater,
    error::PopulationError,
    fetcher::PoolStateFetcher,
    metrics,
    multicall::{BatchCaller, Multicall},
    price_feeds::{PairPriceResolver, SharedPriceCache},
    settings::Settings,
    staking_contract::StakingContractAggregate,
    token_catalog::TokenCatalog,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

#[derive(Parser, Debug)]
#[command(name = "apr_table", about = "Per-pair APRs across MasterChef-style staking contracts")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "Config.toml")]
    config: String,

    /// Retries per contract after a transient population failure
    #[arg(long, default_value_t = 2)]
    retries: usize,

    /// Print the matrix as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Expose Prometheus metrics on this port while running
    #[cfg(feature = "observability")]
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    env_logger::init();

    let args = Args::parse();

    #[cfg(feature = "observability")]
    if let Some(port) = args.metrics_port {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("failed to install Prometheus exporter")?;
        info!("Prometheus exporter listening on :{}", port);
    }
    metrics::describe_metrics();

    // 1. Settings
    let settings = Settings::from_path(&args.config)
        .with_context(|| format!("failed to load {}", args.config))?;
    info!(
        "Loaded {} staking contracts, {} tokens, {} pairs",
        settings.staking_contracts.len(),
        settings.tokens.len(),
        settings.pairs.len()
    );

    // 2. Transport
    let provider = Provider::<Http>::try_from(settings.rpc.http_url.as_str())
        .with_context(|| format!("invalid RPC url {}", settings.rpc.http_url))?;
    let caller: Arc<dyn BatchCaller> = Arc::new(
        Multicall::new(
            Arc::new(provider),
            settings.rpc.multicall_address,
            settings.rpc.multicall_batch_size,
        )
        .with_timeout(settings.rpc.multicall_timeout_seconds),
    );

    // 3. Classification store
    let store: Arc<dyn ClassificationStore> = match &settings.classification_cache.path {
        Some(path) => Arc::new(FileClassificationStore::open(path)),
        None => Arc::new(InMemoryClassificationStore::new()),
    };
    let classifier = PoolTypeClassifier::new(caller.clone(), store);
    let fetcher = Arc::new(PoolStateFetcher::new(caller.clone(), classifier));

    // 4. Prices
    let catalog = Arc::new(TokenCatalog::from_settings(&settings.tokens)?);
    let prices = SharedPriceCache::new();
    let coingecko = CoinGeckoPriceUpdater::new(
        prices.clone(),
        &catalog,
        settings.price_feeds.coingecko_base_url.clone(),
        Duration::from_secs(settings.price_feeds.request_timeout_seconds),
    )?;
    if let Err(e) = coingecko.refresh().await {
        warn!("CoinGecko refresh failed: {}", e);
    }
    let pair_prices = PairPriceResolver::new(
        caller.clone(),
        prices.clone(),
        catalog.clone(),
        settings.price_feeds.native_token.clone(),
    );
    if let Err(e) = pair_prices.refresh().await {
        warn!("Pair price refresh failed: {}", e);
    }

    // 5. Aggregates
    let aggregates = settings
        .staking_contracts
        .iter()
        .map(|config| -> Result<Arc<StakingContractAggregate>> {
            let reward_token = catalog.reward_token(&config.reward_token, &prices)?;
            Ok(Arc::new(StakingContractAggregate::new(
                config.clone(),
                reward_token,
                fetcher.clone(),
            )))
        })
        .collect::<Result<Vec<_>>>()?;
    // 6. Populate every contract concurrently, retrying transient failures
    let results = join_all(aggregates.iter().map(|aggregate| {
        let strategy = ExponentialBackoff::from_millis(250)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(args.retries);
        RetryIf::spawn(strategy, || aggregate.populate(), PopulationError::is_transient)
    }))
    .await;

    for (aggregate, result) in aggregates.iter().zip(&results) {
        match result {
            Ok(state) => info!("{}: {} pools", aggregate.name(), state.pools.len()),
            Err(e) => warn!("{}: giving up: {}", aggregate.name(), e),
        }
    }
    aggregator::refresh_reward_prices(&aggregates, &prices);

    // 7. Matrix
    let pairs: Vec<(String, String)> = settings
        .pairs
        .iter()
        .filter_map(|pair| match pair.as_slice() {
            [a, b] => Some((a.clone(), b.clone())),
            _ => None,
        })
        .collect();
    let matrix = AprMatrix::build(&aggregates, &pairs, &catalog, &prices);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&matrix)?);
    } else {
        print_table(&matrix);
    }

    Ok(())
}

fn print_table(matrix: &AprMatrix) {
    let pair_width = matrix.pairs.iter().map(String::len).max().unwrap_or(4).max(4);
    let column_width = |name: &str| name.len().max(14);

    let mut header = format!("{:<width$}", "PAIR", width = pair_width);
    for protocol in &matrix.protocols {
        header.push_str(&format!(
            "  {:>width$}",
            protocol.protocol.to_uppercase(),
            width = column_width(&protocol.protocol)
        ));
    }
    println!("{}", header);

    for (row, pair) in matrix.pairs.iter().enumerate() {
        let mut line = format!("{:<width$}", pair, width = pair_width);
        for protocol in &matrix.protocols {
            let cell = protocol
                .aprs
                .get(row)
                .map(ToString::to_string)
                .unwrap_or_default();
            line.push_str(&format!("  {:>width$}", cell, width = column_width(&protocol.protocol)));
        }
        println!("{}", line);
    }
}
