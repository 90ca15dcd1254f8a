//! Parse functions - turn raw source payloads into typed values

use crate::error::FetchError;
use crate::ingestion::types::{CrossRates, FetchOutcome};
use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

pub const MARKET_DATA: &str = "market data";
pub const FRED: &str = "FRED";
pub const FOREX: &str = "forex";

/// FRED marks missing observations with a single dot
const FRED_MISSING: &str = ".";

/// Yahoo Finance v8 chart response (only the fields we read)
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Latest non-null close from a chart response.
/// An empty session yields `Ok(None)`.
pub fn parse_latest_close(raw: Value) -> FetchOutcome<Decimal> {
    let response: ChartResponse =
        serde_json::from_value(raw).map_err(|e| FetchError::malformed(MARKET_DATA, e))?;

    if let Some(err) = response.chart.error {
        return Err(FetchError::malformed(
            MARKET_DATA,
            format!("{}: {}", err.code, err.description),
        ));
    }

    let latest = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .and_then(|data| data.indicators.quote.into_iter().next())
        .and_then(|quote| {
            quote
                .close
                .into_iter()
                .rev()
                .flatten()
                .find(|close| close.is_finite())
        });

    match latest {
        None => Ok(None),
        Some(close) => Decimal::from_f64(close)
            .map(Some)
            .ok_or_else(|| FetchError::malformed(MARKET_DATA, format!("close {close} out of range"))),
    }
}

/// FRED `series/observations` response
#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: NaiveDate,
    value: String,
}

/// Most recent usable observation, whatever order the series arrives in.
/// Values that do not parse are skipped; the series only fails when every
/// non-missing value is bad.
pub fn parse_latest_observation(series_id: &str, raw: Value) -> FetchOutcome<Decimal> {
    let response: ObservationsResponse =
        serde_json::from_value(raw).map_err(|e| FetchError::malformed(FRED, e))?;

    let mut latest: Option<(NaiveDate, Decimal)> = None;
    let mut first_bad: Option<String> = None;
    for observation in response.observations {
        let value = observation.value.trim();
        if value == FRED_MISSING || value.is_empty() {
            continue;
        }

        let rate = match Decimal::from_str(value) {
            Ok(rate) => rate,
            Err(e) => {
                warn!(
                    "Skipping {} observation on {}: '{}' ({})",
                    series_id, observation.date, value, e
                );
                if first_bad.is_none() {
                    first_bad = Some(format!(
                        "{series_id} value '{value}' on {}: {e}",
                        observation.date
                    ));
                }
                continue;
            }
        };

        if latest.map_or(true, |(date, _)| observation.date > date) {
            latest = Some((observation.date, rate));
        }
    }

    match (latest, first_bad) {
        (Some((_, rate)), _) => Ok(Some(rate)),
        (None, Some(detail)) => Err(FetchError::malformed(FRED, detail)),
        (None, None) => Ok(None),
    }
}

/// exchangerate-api `latest` response. Quotes stay raw so one bad entry
/// does not sink the rest.
#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    #[serde(default)]
    rates: BTreeMap<String, Value>,
}

/// Numeric quotes against the reference currency, keyed by currency code.
/// Null or non-numeric quotes are dropped with a warning.
pub fn parse_quotes(raw: Value) -> Result<BTreeMap<String, f64>, FetchError> {
    let response: LatestRatesResponse =
        serde_json::from_value(raw).map_err(|e| FetchError::malformed(FOREX, e))?;

    let quotes = response
        .rates
        .into_iter()
        .filter_map(|(code, quote)| match quote.as_f64() {
            Some(value) => Some((code, value)),
            None => {
                warn!("Dropping non-numeric forex quote {} = {}", code, quote);
                None
            }
        })
        .collect();
    Ok(quotes)
}

/// Derive the cross-rate matrix `rate(i, j) = quote(j) / quote(i)`.
///
/// Without a requested set every usable quote is included, in code order.
/// Requested codes missing from the quotes are dropped. Returns None when no
/// currency is left.
pub fn derive_cross_rates(
    quotes: &BTreeMap<String, f64>,
    requested: Option<&[String]>,
) -> Option<CrossRates> {
    let usable: BTreeMap<&str, f64> = quotes
        .iter()
        .filter(|(code, quote)| {
            let ok = quote.is_finite() && **quote > 0.0;
            if !ok {
                warn!("Dropping unusable forex quote {} = {}", code, quote);
            }
            ok
        })
        .map(|(code, quote)| (code.as_str(), *quote))
        .collect();

    if usable.is_empty() {
        warn!("No forex rates returned from source");
        return None;
    }

    let currencies: Vec<String> = match requested {
        None => usable.keys().map(|code| code.to_string()).collect(),
        Some(codes) => {
            let mut selected: Vec<String> = Vec::with_capacity(codes.len());
            for code in codes {
                if !usable.contains_key(code.as_str()) {
                    warn!("Currency {} not found in forex data, skipping", code);
                } else if !selected.contains(code) {
                    selected.push(code.clone());
                }
            }
            selected
        }
    };

    if currencies.is_empty() {
        warn!("None of the requested currencies were found in the forex data");
        return None;
    }

    let row_quotes: Vec<f64> = currencies.iter().map(|c| usable[c.as_str()]).collect();
    let matrix = row_quotes
        .iter()
        .flat_map(|base| row_quotes.iter().map(move |target| target / base))
        .collect();

    Some(CrossRates::new(currencies, matrix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    fn quotes(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(c, q)| (c.to_string(), *q)).collect()
    }

    #[test]
    fn test_latest_close_skips_trailing_nulls() {
        let raw = json!({
            "chart": {
                "result": [{
                    "timestamp": [1, 2, 3],
                    "indicators": { "quote": [{ "close": [4700.25, 4783.5, null] }] }
                }],
                "error": null
            }
        });
        assert_eq!(parse_latest_close(raw).unwrap(), Some(dec("4783.5")));
    }

    #[test]
    fn test_latest_close_empty_session() {
        // Yahoo returns a result without timestamps before the session opens
        let raw = json!({
            "chart": {
                "result": [{ "meta": {}, "indicators": { "quote": [{}] } }],
                "error": null
            }
        });
        assert_eq!(parse_latest_close(raw).unwrap(), None);

        let raw = json!({ "chart": { "result": [], "error": null } });
        assert_eq!(parse_latest_close(raw).unwrap(), None);
    }

    #[test]
    fn test_latest_close_source_error() {
        let raw = json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        });
        let err = parse_latest_close(raw).unwrap_err();
        assert!(err.to_string().contains("Not Found"));
    }

    #[test]
    fn test_latest_close_malformed() {
        assert!(parse_latest_close(json!({ "unexpected": true })).is_err());
    }

    #[test]
    fn test_latest_observation_skips_missing() {
        // sort_order=desc: newest first, holiday marked "."
        let raw = json!({
            "observations": [
                { "date": "2024-12-25", "value": "." },
                { "date": "2024-12-24", "value": "4.55" },
                { "date": "2024-12-23", "value": "4.59" }
            ]
        });
        assert_eq!(
            parse_latest_observation("DGS10", raw).unwrap(),
            Some(dec("4.55"))
        );
    }

    #[test]
    fn test_latest_observation_ascending_order() {
        let raw = json!({
            "observations": [
                { "date": "2024-12-23", "value": "5.31" },
                { "date": "2024-12-24", "value": "5.33" }
            ]
        });
        assert_eq!(
            parse_latest_observation("SOFR", raw).unwrap(),
            Some(dec("5.33"))
        );
    }

    #[test]
    fn test_latest_observation_empty() {
        assert_eq!(
            parse_latest_observation("SOFR", json!({ "observations": [] })).unwrap(),
            None
        );
        let all_missing = json!({ "observations": [{ "date": "2024-12-25", "value": "." }] });
        assert_eq!(parse_latest_observation("DGS20", all_missing).unwrap(), None);
    }

    #[test]
    fn test_latest_observation_bad_value() {
        let raw = json!({ "observations": [{ "date": "2024-12-24", "value": "n/a" }] });
        let err = parse_latest_observation("DGS2", raw).unwrap_err();
        assert!(err.to_string().contains("DGS2"));
    }

    #[test]
    fn test_latest_observation_bad_older_value_is_skipped() {
        let raw = json!({
            "observations": [
                { "date": "2024-12-24", "value": "4.55" },
                { "date": "2024-12-20", "value": "ND" }
            ]
        });
        assert_eq!(
            parse_latest_observation("DGS10", raw).unwrap(),
            Some(dec("4.55"))
        );

        // A bad newer value falls back to the latest good one
        let raw = json!({
            "observations": [
                { "date": "2024-12-24", "value": "ND" },
                { "date": "2024-12-23", "value": "4.59" }
            ]
        });
        assert_eq!(
            parse_latest_observation("DGS10", raw).unwrap(),
            Some(dec("4.59"))
        );
    }

    #[test]
    fn test_parse_quotes() {
        let raw = json!({ "base": "USD", "rates": { "USD": 1, "EUR": 0.9, "GBP": 0.8 } });
        let parsed = parse_quotes(raw).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed["USD"], 1.0);

        // Missing rates object is an empty snapshot, not an error
        assert!(parse_quotes(json!({ "result": "error" })).unwrap().is_empty());
    }

    #[test]
    fn test_parse_quotes_drops_null_and_non_numeric() {
        let raw = json!({
            "base": "USD",
            "rates": { "USD": 1, "EUR": 0.9, "XDR": null, "XAU": "n/a" }
        });
        let parsed = parse_quotes(raw).unwrap();
        assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["EUR", "USD"]);

        let rates = derive_cross_rates(&parsed, None).unwrap();
        assert_eq!(rates.len(), 4);
    }

    #[test]
    fn test_cross_rates_three_currencies() {
        let quotes = quotes(&[("USD", 1.0), ("EUR", 0.9), ("GBP", 0.8)]);
        let requested = codes(&["USD", "EUR", "GBP"]);

        let rates = derive_cross_rates(&quotes, Some(&requested)).unwrap();

        assert_eq!(rates.len(), 9);
        assert_eq!(rates.get("EUR", "GBP"), Some(0.8 / 0.9));
        assert_eq!(rates.get("USD", "EUR"), Some(0.9));
        assert_eq!(rates.currencies(), requested.as_slice());
    }

    #[test]
    fn test_cross_rates_identity_and_inverse() {
        let quotes = quotes(&[
            ("USD", 1.0),
            ("EUR", 0.9213),
            ("GBP", 0.7891),
            ("JPY", 151.37),
            ("CHF", 0.8812),
        ]);

        let rates = derive_cross_rates(&quotes, None).unwrap();
        let currencies = rates.currencies().to_vec();

        for i in &currencies {
            assert_eq!(rates.get(i, i), Some(1.0));
            for j in &currencies {
                let product = rates.get(i, j).unwrap() * rates.get(j, i).unwrap();
                assert!((product - 1.0).abs() < 1e-12, "{i}/{j}: {product}");
            }
        }
    }

    #[test]
    fn test_cross_rates_all_currencies_sorted() {
        let quotes = quotes(&[("USD", 1.0), ("JPY", 150.0), ("EUR", 0.9)]);
        let rates = derive_cross_rates(&quotes, None).unwrap();
        assert_eq!(rates.currencies(), codes(&["EUR", "JPY", "USD"]).as_slice());
        assert_eq!(rates.len(), 9);
    }

    #[test]
    fn test_cross_rates_drops_unknown_and_duplicates() {
        let quotes = quotes(&[("USD", 1.0), ("EUR", 0.9)]);
        let requested = codes(&["EUR", "XXX", "USD", "EUR"]);

        let rates = derive_cross_rates(&quotes, Some(&requested)).unwrap();
        assert_eq!(rates.currencies(), codes(&["EUR", "USD"]).as_slice());
        assert_eq!(rates.len(), 4);
    }

    #[test]
    fn test_cross_rates_none_found() {
        let quotes = quotes(&[("USD", 1.0), ("EUR", 0.9)]);
        assert!(derive_cross_rates(&quotes, Some(&codes(&["AUD", "NZD"]))).is_none());
        assert!(derive_cross_rates(&BTreeMap::new(), None).is_none());
    }

    #[test]
    fn test_cross_rates_drops_unusable_quotes() {
        let quotes = quotes(&[("USD", 1.0), ("ZZZ", 0.0), ("YYY", -2.0), ("EUR", 0.9)]);
        let rates = derive_cross_rates(&quotes, None).unwrap();
        assert_eq!(rates.currencies(), codes(&["EUR", "USD"]).as_slice());
        assert!(rates.iter().all(|(_, _, rate)| rate.is_finite()));
    }
}
