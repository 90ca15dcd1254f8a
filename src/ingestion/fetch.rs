//! Fetch functions - retrieve one data point per external source

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::ingestion::parse::{
    derive_cross_rates, parse_latest_close, parse_latest_observation, parse_quotes, FOREX, FRED,
    MARKET_DATA,
};
use crate::ingestion::types::{CrossRates, FetchOutcome, Term, TermMap, YieldCurve};
use crate::ingestion::utils::{endpoint_url, http_get_json};
use reqwest::Client;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt::Display;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// How many recent observations to ask FRED for. Enough to step over
/// holidays and weekends that are reported as missing.
const OBSERVATION_LIMIT: &str = "30";

/// Latest close of the configured index
pub async fn fetch_index_price(client: &Client, sources: &SourceConfig) -> FetchOutcome<Decimal> {
    let outcome = fetch_chart_close(client, sources).await;
    log_outcome(&format!("{} price", sources.index_symbol), &outcome);
    outcome
}

async fn fetch_chart_close(client: &Client, sources: &SourceConfig) -> FetchOutcome<Decimal> {
    let url = endpoint_url(
        &sources.market_data_url,
        &["v8", "finance", "chart", sources.index_symbol.as_str()],
        MARKET_DATA,
    )?;
    let request = client
        .get(url)
        .query(&[("range", "1d"), ("interval", "1d")]);

    let raw = http_get_json(request, MARKET_DATA).await?;
    parse_latest_close(raw)
}

/// Latest non-missing value of a FRED series
pub async fn fetch_series_latest(
    client: &Client,
    sources: &SourceConfig,
    series_id: &str,
) -> FetchOutcome<Decimal> {
    let url = endpoint_url(&sources.fred_url, &["fred", "series", "observations"], FRED)?;
    let request = client
        .get(url)
        .query(&[
            ("series_id", series_id),
            ("api_key", sources.fred_api_key.as_str()),
            ("file_type", "json"),
            ("sort_order", "desc"),
            ("limit", OBSERVATION_LIMIT),
        ]);

    let raw = http_get_json(request, FRED).await?;
    parse_latest_observation(series_id, raw)
}

/// Latest reference rate (SOFR by default)
pub async fn fetch_reference_rate(
    client: &Client,
    sources: &SourceConfig,
) -> FetchOutcome<Decimal> {
    let outcome = fetch_series_latest(client, sources, &sources.reference_rate_series).await;
    log_outcome(&format!("{} rate", sources.reference_rate_series), &outcome);
    outcome
}

/// Latest treasury yield for one term
pub async fn fetch_treasury_yield(
    client: &Client,
    sources: &SourceConfig,
    term: Term,
) -> FetchOutcome<Decimal> {
    let outcome = fetch_series_latest(client, sources, term.series_id()).await;
    log_outcome(&format!("{} treasury ({})", term, term.series_id()), &outcome);
    outcome
}

/// All ten treasury yields, fetched concurrently with one task per term
pub async fn fetch_yield_curve(client: &Client, sources: &SourceConfig) -> YieldCurve {
    info!("Fetching {} treasury yields", Term::COUNT);

    let mut tasks = JoinSet::new();
    for term in Term::ALL {
        let client = client.clone();
        let sources = sources.clone();
        tasks.spawn(async move {
            let outcome = fetch_treasury_yield(&client, &sources, term).await;
            (term, outcome)
        });
    }

    let mut slots: TermMap<Option<FetchOutcome<Decimal>>> = TermMap::from_fn(|_| None);
    let mut join_failure: Option<String> = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((term, outcome)) => slots.set(term, Some(outcome)),
            Err(e) => {
                warn!("Treasury fetch task failed: {}", e);
                join_failure = Some(e.to_string());
            }
        }
    }

    slots.map(|term, slot| {
        slot.unwrap_or_else(|| {
            Err(FetchError::TaskFailed {
                term,
                detail: join_failure
                    .clone()
                    .unwrap_or_else(|| "no result reported".to_string()),
            })
        })
    })
}

/// Cross rates for the requested currencies (all available when None)
pub async fn fetch_conversion_rates(
    client: &Client,
    sources: &SourceConfig,
    currencies: Option<&[String]>,
) -> FetchOutcome<CrossRates> {
    let outcome = fetch_latest_quotes(client, sources)
        .await
        .map(|quotes| derive_cross_rates(&quotes, currencies));

    match &outcome {
        Ok(Some(rates)) => info!(
            "Forex rates: {} pairs over {} currencies",
            rates.len(),
            rates.currencies().len()
        ),
        Ok(None) => warn!("Forex rates: no data available"),
        Err(e) => warn!("Error retrieving forex rates: {}", e),
    }
    outcome
}

async fn fetch_latest_quotes(
    client: &Client,
    sources: &SourceConfig,
) -> Result<BTreeMap<String, f64>, FetchError> {
    let url = endpoint_url(
        &sources.forex_url,
        &["v4", "latest", sources.reference_currency.as_str()],
        FOREX,
    )?;
    let raw = http_get_json(client.get(url), FOREX).await?;
    parse_quotes(raw)
}

fn log_outcome<T: Display>(label: &str, outcome: &FetchOutcome<T>) {
    match outcome {
        Ok(Some(value)) => info!("{}: {}", label, value),
        Ok(None) => warn!("{}: no data available", label),
        Err(e) => warn!("Error retrieving {}: {}", label, e),
    }
}
