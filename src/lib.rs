// Library module for the market data collector

pub mod config;
pub mod error;
pub mod fetcher;
pub mod ingestion;

pub use config::{Config, DbConfig, SourceConfig};
pub use error::{FetchError, StoreError};
pub use fetcher::DataFetcher;
pub use ingestion::session::ConnectionStatus;
