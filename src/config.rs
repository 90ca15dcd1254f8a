//! Configuration loaded from environment variables

use anyhow::{Context, Result};
use sqlx::postgres::PgConnectOptions;
use std::str::FromStr;

pub const DEFAULT_REFERENCE_CURRENCY: &str = "USD";
pub const DEFAULT_INDEX_SYMBOL: &str = "^GSPC";
pub const DEFAULT_REFERENCE_RATE_SERIES: &str = "SOFR";
pub const DEFAULT_MARKET_DATA_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_FRED_URL: &str = "https://api.stlouisfed.org";
pub const DEFAULT_FOREX_URL: &str = "https://api.exchangerate-api.com";
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Where and what to fetch
#[derive(Clone)]
pub struct SourceConfig {
    pub fred_api_key: String,
    pub reference_currency: String,
    pub index_symbol: String,
    pub reference_rate_series: String,
    pub market_data_url: String,
    pub fred_url: String,
    pub forex_url: String,
}

impl SourceConfig {
    /// Public endpoints and default series for the given FRED key
    pub fn new(fred_api_key: impl Into<String>) -> Self {
        SourceConfig {
            fred_api_key: fred_api_key.into(),
            reference_currency: DEFAULT_REFERENCE_CURRENCY.to_string(),
            index_symbol: DEFAULT_INDEX_SYMBOL.to_string(),
            reference_rate_series: DEFAULT_REFERENCE_RATE_SERIES.to_string(),
            market_data_url: DEFAULT_MARKET_DATA_URL.to_string(),
            fred_url: DEFAULT_FRED_URL.to_string(),
            forex_url: DEFAULT_FOREX_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("fred_api_key", &"<redacted>")
            .field("reference_currency", &self.reference_currency)
            .field("index_symbol", &self.index_symbol)
            .field("reference_rate_series", &self.reference_rate_series)
            .field("market_data_url", &self.market_data_url)
            .field("fred_url", &self.fred_url)
            .field("forex_url", &self.forex_url)
            .finish()
    }
}

/// Destination store connection parameters
#[derive(Clone, PartialEq, Eq)]
pub enum DbConfig {
    Url(String),
    Params {
        host: String,
        port: u16,
        database: String,
        user: String,
        password: String,
    },
}

impl DbConfig {
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        match self {
            DbConfig::Url(url) => PgConnectOptions::from_str(url),
            DbConfig::Params {
                host,
                port,
                database,
                user,
                password,
            } => Ok(PgConnectOptions::new()
                .host(host)
                .port(*port)
                .database(database)
                .username(user)
                .password(password)),
        }
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbConfig::Url(_) => f.debug_tuple("Url").field(&"<redacted>").finish(),
            DbConfig::Params {
                host,
                port,
                database,
                user,
                ..
            } => f
                .debug_struct("Params")
                .field("host", host)
                .field("port", port)
                .field("database", database)
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Full collector configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub sources: SourceConfig,
    /// Currencies for the conversion matrix, None = all available
    pub forex_currencies: Option<Vec<String>>,
    /// None runs without a store (retrieval only)
    pub database: Option<DbConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests don't have to touch the process environment
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let var_or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let fred_api_key = var("FRED_API_KEY").context("FRED_API_KEY must be set")?;

        let sources = SourceConfig {
            fred_api_key,
            reference_currency: var_or("FOREX_REFERENCE_CURRENCY", DEFAULT_REFERENCE_CURRENCY)
                .trim()
                .to_uppercase(),
            index_symbol: var_or("INDEX_SYMBOL", DEFAULT_INDEX_SYMBOL),
            reference_rate_series: var_or("REFERENCE_RATE_SERIES", DEFAULT_REFERENCE_RATE_SERIES),
            market_data_url: var_or("MARKET_DATA_URL", DEFAULT_MARKET_DATA_URL),
            fred_url: var_or("FRED_URL", DEFAULT_FRED_URL),
            forex_url: var_or("FOREX_URL", DEFAULT_FOREX_URL),
        };

        let database = match (var("DATABASE_URL"), var("DB_HOST")) {
            (Some(url), _) => Some(DbConfig::Url(url)),
            (None, Some(host)) => Some(DbConfig::Params {
                host,
                port: match var("DB_PORT") {
                    Some(port) => port
                        .trim()
                        .parse()
                        .context("DB_PORT must be a valid port number")?,
                    None => DEFAULT_DB_PORT,
                },
                database: var_or("DB_NAME", "postgres"),
                user: var_or("DB_USER", "postgres"),
                password: lookup("DB_PASSWORD").unwrap_or_default(),
            }),
            (None, None) => None,
        };

        Ok(Config {
            sources,
            forex_currencies: var("FOREX_CURRENCIES").and_then(|list| parse_currency_list(&list)),
            database,
        })
    }
}

/// Parse a comma separated list of currency codes.
/// Returns None when no codes remain, meaning "all available".
pub fn parse_currency_list(list: &str) -> Option<Vec<String>> {
    let codes: Vec<String> = list
        .split(',')
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .collect();

    if codes.is_empty() {
        None
    } else {
        Some(codes)
    }
}
