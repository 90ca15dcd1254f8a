//! Persistent store connection with an explicit lifecycle

use crate::config::DbConfig;
use crate::error::StoreError;
use sqlx::{Connection, PgConnection};
use tracing::{error, info, warn};

/// Observable connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Uninitialized,
    Open,
    Closed,
}

enum ConnectionState {
    Uninitialized,
    Open(PgConnection),
    Closed,
}

/// Single connection owned by the orchestrator. Not shared across tasks.
pub struct StoreSession {
    config: Option<DbConfig>,
    state: ConnectionState,
}

impl StoreSession {
    /// Open the connection when configuration is supplied.
    /// A failed connect is logged and leaves the session uninitialized.
    pub async fn connect(config: Option<DbConfig>) -> Self {
        let state = match &config {
            Some(db) => match open_connection(db).await {
                Ok(conn) => ConnectionState::Open(conn),
                Err(e) => {
                    error!("Error establishing database connection: {}", e);
                    ConnectionState::Uninitialized
                }
            },
            None => ConnectionState::Uninitialized,
        };

        StoreSession { config, state }
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.state {
            ConnectionState::Uninitialized => ConnectionStatus::Uninitialized,
            ConnectionState::Open(_) => ConnectionStatus::Open,
            ConnectionState::Closed => ConnectionStatus::Closed,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// The open connection, without trying to reopen it
    pub fn connection(&mut self) -> Result<&mut PgConnection, StoreError> {
        match &mut self.state {
            ConnectionState::Open(conn) => Ok(conn),
            _ => Err(StoreError::NotConnected),
        }
    }

    /// The open connection, reopening it first if needed.
    /// An open connection the server has dropped counts as closed.
    pub async fn ensure_open(&mut self) -> Result<&mut PgConnection, StoreError> {
        if let ConnectionState::Open(conn) = &mut self.state {
            if let Err(e) = conn.ping().await {
                warn!("Database connection lost: {}", e);
                self.state = ConnectionState::Closed;
            }
        }

        if !matches!(self.state, ConnectionState::Open(_)) {
            let config = self.config.as_ref().ok_or(StoreError::NotConfigured)?;
            info!("Database connection is not open, reconnecting");
            self.state = ConnectionState::Open(open_connection(config).await?);
        }
        self.connection()
    }

    /// Release the connection. A session that was never opened stays as it is.
    pub async fn close(&mut self) {
        match std::mem::replace(&mut self.state, ConnectionState::Closed) {
            ConnectionState::Open(conn) => {
                if let Err(e) = conn.close().await {
                    warn!("Error closing database connection: {}", e);
                }
                info!("Persistent database connection closed");
            }
            previous => self.state = previous,
        }
    }
}

async fn open_connection(config: &DbConfig) -> Result<PgConnection, StoreError> {
    let options = config.connect_options().map_err(StoreError::Connect)?;
    let conn = PgConnection::connect_with(&options)
        .await
        .map_err(StoreError::Connect)?;
    info!("Persistent database connection established");
    Ok(conn)
}
