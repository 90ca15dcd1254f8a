//! DataFetcher - one method per source plus the retrieve-then-persist cycle

use crate::config::{DbConfig, SourceConfig};
use crate::error::{FetchError, StoreError};
use crate::ingestion::batch::assemble_batch;
use crate::ingestion::session::{ConnectionStatus, StoreSession};
use crate::ingestion::types::{CrossRates, FetchOutcome, MarketSnapshot, Term, WriteStats, YieldCurve};
use crate::ingestion::{fetch, utils, write};
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

/// Owns the store session and the HTTP client used for every source
pub struct DataFetcher {
    client: Client,
    sources: SourceConfig,
    session: StoreSession,
}

impl DataFetcher {
    /// Build the fetcher. With a database config the connection is opened
    /// now; a failure there is logged and retried by `push_cycle`.
    pub async fn new(sources: SourceConfig, database: Option<DbConfig>) -> Result<Self, FetchError> {
        Ok(DataFetcher {
            client: utils::build_http_client()?,
            sources,
            session: StoreSession::connect(database).await,
        })
    }

    pub fn sources(&self) -> &SourceConfig {
        &self.sources
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.session.status()
    }

    pub async fn fetch_index_price(&self) -> FetchOutcome<Decimal> {
        fetch::fetch_index_price(&self.client, &self.sources).await
    }

    pub async fn fetch_reference_rate(&self) -> FetchOutcome<Decimal> {
        fetch::fetch_reference_rate(&self.client, &self.sources).await
    }

    /// Latest yield for a term label such as `"10Y"`.
    /// Unknown labels fail with [`FetchError::UnknownTerm`] before any request.
    pub async fn fetch_yield(&self, term: &str) -> FetchOutcome<Decimal> {
        let term: Term = term.parse()?;
        self.fetch_term(term).await
    }

    pub async fn fetch_term(&self, term: Term) -> FetchOutcome<Decimal> {
        fetch::fetch_treasury_yield(&self.client, &self.sources, term).await
    }

    pub async fn fetch_all_yields(&self) -> YieldCurve {
        fetch::fetch_yield_curve(&self.client, &self.sources).await
    }

    pub async fn fetch_conversion_rates(
        &self,
        currencies: Option<&[String]>,
    ) -> FetchOutcome<CrossRates> {
        fetch::fetch_conversion_rates(&self.client, &self.sources, currencies).await
    }

    /// Retrieve all four sources
    pub async fn snapshot(&self, currencies: Option<&[String]>) -> MarketSnapshot {
        MarketSnapshot {
            index_price: self.fetch_index_price().await,
            reference_rate: self.fetch_reference_rate().await,
            yields: self.fetch_all_yields().await,
            conversion_rates: self.fetch_conversion_rates(currencies).await,
        }
    }

    /// Create the destination tables if missing. Needs an open connection.
    pub async fn ensure_schema(&mut self) -> Result<(), StoreError> {
        let conn = self.session.connection()?;
        write::ensure_schema(conn).await
    }

    /// One full cycle: retrieve every source and insert what is present in a
    /// single transaction. Nothing from the cycle persists if any insert fails.
    #[tracing::instrument(skip_all, fields(cycle_id = %Uuid::new_v4()))]
    pub async fn push_cycle(&mut self, currencies: Option<&[String]>) -> Result<WriteStats, StoreError> {
        self.session.ensure_open().await?;

        let snapshot = self.snapshot(currencies).await;
        let batch = assemble_batch(&snapshot);

        let conn = self.session.connection()?;
        let stats = write::write_batch(conn, &batch).await?;
        info!("All data pushed successfully: {}", stats);

        Ok(stats)
    }

    pub async fn close(&mut self) {
        self.session.close().await;
    }
}
