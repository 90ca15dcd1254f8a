//! Shared mock sources for integration tests

#![allow(dead_code)]

use market_data_collector::SourceConfig;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "test-fred-key";

/// Source config with every endpoint pointed at the mock server
pub fn sources_for(server: &MockServer) -> SourceConfig {
    SourceConfig {
        market_data_url: server.uri(),
        fred_url: server.uri(),
        forex_url: server.uri(),
        ..SourceConfig::new(API_KEY)
    }
}

pub fn chart_body(closes: &[Option<f64>]) -> Value {
    let timestamps: Vec<i64> = (0..closes.len() as i64)
        .map(|i| 1_700_000_000 + i * 86_400)
        .collect();
    json!({
        "chart": {
            "result": [{
                "meta": { "symbol": "^GSPC" },
                "timestamp": timestamps,
                "indicators": { "quote": [{ "close": closes }] }
            }],
            "error": null
        }
    })
}

pub fn empty_chart_body() -> Value {
    json!({
        "chart": {
            "result": [{ "meta": { "symbol": "^GSPC" }, "indicators": { "quote": [{}] } }],
            "error": null
        }
    })
}

pub fn observations_body(values: &[(&str, &str)]) -> Value {
    let observations: Vec<Value> = values
        .iter()
        .map(|(date, value)| json!({ "date": date, "value": value }))
        .collect();
    json!({ "observations": observations })
}

pub fn forex_body() -> Value {
    json!({
        "base": "USD",
        "rates": { "USD": 1, "EUR": 0.9, "GBP": 0.8, "JPY": 150.0 }
    })
}

pub async fn mount_index(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/v8/finance/chart/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_series(server: &MockServer, series_id: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path("/fred/series/observations"))
        .and(query_param("series_id", series_id))
        .and(query_param("api_key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_forex(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/v4/latest/USD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Every source answers with data; the index history is configurable
pub async fn mount_all_sources(server: &MockServer, index_body: Value) {
    mount_index(server, index_body).await;
    mount_series(
        server,
        "SOFR",
        observations_body(&[("2024-12-24", "4.31"), ("2024-12-23", "4.32")]),
    )
    .await;
    for series_id in [
        "DGS3MO", "DGS6MO", "DGS1", "DGS2", "DGS3", "DGS5", "DGS7", "DGS10", "DGS20", "DGS30",
    ] {
        mount_series(
            server,
            series_id,
            observations_body(&[("2024-12-25", "."), ("2024-12-24", "4.25")]),
        )
        .await;
    }
    mount_forex(server, forex_body()).await;
}
