//! Market snapshot runner - fetches index, SOFR, treasury and forex data and stores one cycle

use anyhow::{bail, Context, Result};
use market_data_collector::config::parse_currency_list;
use market_data_collector::ingestion::{CrossRates, MarketSnapshot};
use market_data_collector::{Config, DataFetcher};
use std::env;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    info!("Configuration loaded");

    // First argument picks the command, the rest override the currency list
    let args: Vec<String> = env::args().skip(1).collect();
    let (command, overrides) = match args.split_first() {
        Some((command, rest)) => (command.as_str(), rest),
        None => ("push", &[][..]),
    };
    let currencies = if overrides.is_empty() {
        config.forex_currencies.clone()
    } else {
        parse_currency_list(&overrides.join(","))
    };

    match command {
        "push" => run_push(&config, currencies.as_deref()).await,
        "schema" => run_schema(&config).await,
        "print" => run_print(&config, currencies.as_deref()).await,
        other => bail!("Unknown command: {} (expected push, schema or print)", other),
    }
}

/// Ensure the schema, then push one cycle
async fn run_push(config: &Config, currencies: Option<&[String]>) -> Result<()> {
    info!("🚀 Starting market data cycle...");

    let database = config
        .database
        .clone()
        .context("push requires DATABASE_URL or DB_HOST to be set")?;
    let mut fetcher = DataFetcher::new(config.sources.clone(), Some(database)).await?;

    info!("Step 1/2: Verifying schema...");
    if let Err(e) = fetcher.ensure_schema().await {
        warn!("Schema check failed: {}", e);
    }

    info!("Step 2/2: Fetching and storing data...");
    let result = fetcher.push_cycle(currencies).await;
    fetcher.close().await;

    match result {
        Ok(stats) => {
            info!("✅ Cycle complete: {}", stats);
            Ok(())
        }
        Err(e) => {
            error!("❌ Cycle failed, nothing was stored: {}", e);
            Err(e.into())
        }
    }
}

async fn run_schema(config: &Config) -> Result<()> {
    let database = config
        .database
        .clone()
        .context("schema requires DATABASE_URL or DB_HOST to be set")?;
    let mut fetcher = DataFetcher::new(config.sources.clone(), Some(database)).await?;

    let result = fetcher.ensure_schema().await;
    fetcher.close().await;
    result?;

    info!("✅ Schema ready");
    Ok(())
}

/// Fetch everything without touching the store and log it
async fn run_print(config: &Config, currencies: Option<&[String]>) -> Result<()> {
    let fetcher = DataFetcher::new(config.sources.clone(), None).await?;
    let snapshot = fetcher.snapshot(currencies).await;

    print_snapshot(config, &snapshot);
    Ok(())
}

fn print_snapshot(config: &Config, snapshot: &MarketSnapshot) {
    match &snapshot.index_price {
        Ok(Some(price)) => info!("The current {} price is: {}", config.sources.index_symbol, price),
        _ => warn!("Could not retrieve the {} price", config.sources.index_symbol),
    }

    match &snapshot.reference_rate {
        Ok(Some(rate)) => info!("The latest {} rate is: {}", config.sources.reference_rate_series, rate),
        _ => warn!("Could not retrieve the {} rate", config.sources.reference_rate_series),
    }

    info!("Latest Treasury Yields:");
    for (term, outcome) in snapshot.yields.iter() {
        match outcome {
            Ok(Some(rate)) => info!("  {:>4}  {}", term, rate),
            _ => info!("  {:>4}  No data available", term),
        }
    }

    match &snapshot.conversion_rates {
        Ok(Some(rates)) => print_forex_rates(rates),
        _ => warn!("Could not retrieve forex rates"),
    }
}

fn print_forex_rates(rates: &CrossRates) {
    info!("Forex Conversion Rates:");
    for (base, target, rate) in rates.iter() {
        info!("  {} to {}: {:.4}", base, target, rate);
    }
}
