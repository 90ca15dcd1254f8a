//! Write functions - persist a cycle to PostgreSQL in a single transaction

use crate::error::StoreError;
use crate::ingestion::types::{
    ConversionRateRecord, CycleBatch, IndexPriceRecord, ReferenceRateRecord, Table, WriteStats,
    YieldRecord,
};
use sqlx::{Connection, PgConnection};
use tracing::{debug, error, info};

/// Destination tables, each with a generated key and a defaulted insertion timestamp
const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS sp500_prices (
        id SERIAL PRIMARY KEY,
        timestamp TIMESTAMP DEFAULT NOW(),
        price NUMERIC
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sofr_rates (
        id SERIAL PRIMARY KEY,
        timestamp TIMESTAMP DEFAULT NOW(),
        rate NUMERIC
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS treasury_rates (
        id SERIAL PRIMARY KEY,
        timestamp TIMESTAMP DEFAULT NOW(),
        term VARCHAR,
        rate NUMERIC
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS forex_rates (
        id SERIAL PRIMARY KEY,
        timestamp TIMESTAMP DEFAULT NOW(),
        base_currency VARCHAR,
        target_currency VARCHAR,
        conversion_rate NUMERIC
    )
    "#,
];

/// Create the destination tables if they don't exist. Safe to run on every start.
pub async fn ensure_schema(conn: &mut PgConnection) -> Result<(), StoreError> {
    let mut tx = conn.begin().await.map_err(|source| StoreError::Transaction {
        action: "begin",
        source,
    })?;

    for statement in SCHEMA {
        if let Err(e) = sqlx::query(statement).execute(&mut *tx).await {
            error!("Error creating schema: {}", e);
            rollback(tx).await;
            return Err(StoreError::Schema(e));
        }
    }

    tx.commit().await.map_err(|source| StoreError::Transaction {
        action: "commit",
        source,
    })?;
    info!("Database schema created (or verified) successfully");

    Ok(())
}

/// Insert every record of the batch in one transaction.
/// Any failed insert rolls back the whole cycle.
pub async fn write_batch(conn: &mut PgConnection, batch: &CycleBatch) -> Result<WriteStats, StoreError> {
    info!("Writing {} records to database", batch.len());

    let mut tx = conn.begin().await.map_err(|source| StoreError::Transaction {
        action: "begin",
        source,
    })?;

    let stats = match insert_all(&mut *tx, batch).await {
        Ok(stats) => stats,
        Err(e) => {
            error!("Error pushing data, rolling back cycle: {}", e);
            rollback(tx).await;
            return Err(e);
        }
    };

    tx.commit().await.map_err(|source| StoreError::Transaction {
        action: "commit",
        source,
    })?;
    info!("Write complete: {}", stats);

    Ok(stats)
}

async fn rollback(tx: sqlx::Transaction<'_, sqlx::Postgres>) {
    if let Err(e) = tx.rollback().await {
        error!("Rollback failed: {}", e);
    }
}

async fn insert_all(conn: &mut PgConnection, batch: &CycleBatch) -> Result<WriteStats, StoreError> {
    let mut stats = WriteStats {
        skipped: batch.skipped,
        ..WriteStats::default()
    };

    for record in &batch.index_prices {
        insert_index_price(conn, record).await?;
        stats.index_prices += 1;
    }

    for record in &batch.reference_rates {
        insert_reference_rate(conn, record).await?;
        stats.reference_rates += 1;
    }

    for record in &batch.yields {
        insert_yield(conn, record).await?;
        stats.yields += 1;
    }

    for record in &batch.conversion_rates {
        insert_conversion_rate(conn, record).await?;
        stats.conversion_rates += 1;
    }

    Ok(stats)
}

async fn insert_index_price(
    conn: &mut PgConnection,
    record: &IndexPriceRecord,
) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO sp500_prices (timestamp, price) VALUES (NOW(), $1)")
        .bind(record.price)
        .execute(&mut *conn)
        .await
        .map_err(|source| StoreError::Insert {
            table: Table::IndexPrices,
            source,
        })?;

    debug!("Inserted S&P 500 price: {}", record.price);
    Ok(())
}

async fn insert_reference_rate(
    conn: &mut PgConnection,
    record: &ReferenceRateRecord,
) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO sofr_rates (timestamp, rate) VALUES (NOW(), $1)")
        .bind(record.rate)
        .execute(&mut *conn)
        .await
        .map_err(|source| StoreError::Insert {
            table: Table::ReferenceRates,
            source,
        })?;

    debug!("Inserted SOFR rate: {}", record.rate);
    Ok(())
}

async fn insert_yield(conn: &mut PgConnection, record: &YieldRecord) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO treasury_rates (timestamp, term, rate) VALUES (NOW(), $1, $2)")
        .bind(record.term.label())
        .bind(record.rate)
        .execute(&mut *conn)
        .await
        .map_err(|source| StoreError::Insert {
            table: Table::TreasuryRates,
            source,
        })?;

    debug!("Inserted treasury rate for {}: {}", record.term, record.rate);
    Ok(())
}

async fn insert_conversion_rate(
    conn: &mut PgConnection,
    record: &ConversionRateRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO forex_rates (timestamp, base_currency, target_currency, conversion_rate)
        VALUES (NOW(), $1, $2, $3)
        "#,
    )
    .bind(&record.base_currency)
    .bind(&record.target_currency)
    .bind(record.rate)
    .execute(&mut *conn)
    .await
    .map_err(|source| StoreError::Insert {
        table: Table::ForexRates,
        source,
    })?;

    debug!(
        "Inserted forex rate {} to {}: {}",
        record.base_currency, record.target_currency, record.rate
    );
    Ok(())
}
