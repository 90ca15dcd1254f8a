//! Error types for source retrieval and store writes

use crate::ingestion::types::{Table, Term};
use thiserror::Error;

/// Failure to retrieve a single data point from an external source
#[derive(Debug, Error)]
pub enum FetchError {
    /// Caller asked for a maturity that is not on the curve. Raised before any I/O.
    #[error("unrecognized treasury term '{0}' (valid terms: 3M, 6M, 1Y, 2Y, 3Y, 5Y, 7Y, 10Y, 20Y, 30Y)")]
    UnknownTerm(String),

    /// Configured base URL cannot carry a path
    #[error("invalid {source_name} base URL '{url}'")]
    InvalidEndpoint {
        source_name: &'static str,
        url: String,
    },

    #[error("{source_name} request failed: {source}")]
    Request {
        source_name: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{source_name} returned HTTP {status}")]
    Status {
        source_name: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("unexpected {source_name} response: {detail}")]
    Malformed {
        source_name: &'static str,
        detail: String,
    },

    #[error("fetch task for {term} did not complete: {detail}")]
    TaskFailed { term: Term, detail: String },
}

impl FetchError {
    /// Usage and setup errors that never reach the network
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FetchError::UnknownTerm(_) | FetchError::InvalidEndpoint { .. }
        )
    }

    pub(crate) fn request(source_name: &'static str, source: reqwest::Error) -> Self {
        // reqwest embeds the full URL in its message, which carries the FRED api key
        FetchError::Request {
            source_name,
            source: source.without_url(),
        }
    }

    pub(crate) fn malformed(source_name: &'static str, detail: impl ToString) -> Self {
        FetchError::Malformed {
            source_name,
            detail: detail.to_string(),
        }
    }
}

/// Failure talking to the destination store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no database configuration supplied")]
    NotConfigured,

    #[error("database connection is not open")]
    NotConnected,

    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("failed to create schema: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("insert into {table} failed: {source}")]
    Insert {
        table: Table,
        #[source]
        source: sqlx::Error,
    },

    #[error("transaction {action} failed: {source}")]
    Transaction {
        action: &'static str,
        #[source]
        source: sqlx::Error,
    },
}
