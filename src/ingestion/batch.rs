//! Batch assembly - turn a snapshot into insert-ready records
//! Pure function - no I/O

use crate::ingestion::types::{
    ConversionRateRecord, CycleBatch, IndexPriceRecord, MarketSnapshot, ReferenceRateRecord,
    YieldRecord,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// Build the records for one cycle. Absent fields are skipped and counted;
/// they never block the other fields.
pub fn assemble_batch(snapshot: &MarketSnapshot) -> CycleBatch {
    let mut batch = CycleBatch::default();

    match &snapshot.index_price {
        Ok(Some(price)) => batch.index_prices.push(IndexPriceRecord { price: *price }),
        _ => {
            info!("Skipping S&P 500 price insert due to missing data");
            batch.skipped += 1;
        }
    }

    match &snapshot.reference_rate {
        Ok(Some(rate)) => batch.reference_rates.push(ReferenceRateRecord { rate: *rate }),
        _ => {
            info!("Skipping SOFR rate insert due to missing data");
            batch.skipped += 1;
        }
    }

    for (term, outcome) in snapshot.yields.iter() {
        match outcome {
            Ok(Some(rate)) => batch.yields.push(YieldRecord { term, rate: *rate }),
            _ => {
                info!("Skipping treasury rate insert for {} due to missing data", term);
                batch.skipped += 1;
            }
        }
    }

    match &snapshot.conversion_rates {
        Ok(Some(rates)) => {
            for (base, target, rate) in rates.iter() {
                match Decimal::from_f64(rate) {
                    Some(rate) => batch.conversion_rates.push(ConversionRateRecord {
                        base_currency: base.to_string(),
                        target_currency: target.to_string(),
                        rate,
                    }),
                    None => {
                        warn!("Skipping forex rate {} to {}: {} is not representable", base, target, rate);
                        batch.skipped += 1;
                    }
                }
            }
        }
        _ => {
            info!("No forex rate data to insert");
            batch.skipped += 1;
        }
    }

    debug!(
        "Assembled batch: {} records, {} skipped",
        batch.len(),
        batch.skipped
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::ingestion::parse::derive_cross_rates;
    use crate::ingestion::types::{Term, TermMap};
    use std::collections::BTreeMap;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn mock_snapshot() -> MarketSnapshot {
        let quotes: BTreeMap<String, f64> = [("USD", 1.0), ("EUR", 0.9), ("GBP", 0.8)]
            .iter()
            .map(|(c, q)| (c.to_string(), *q))
            .collect();

        MarketSnapshot {
            index_price: Ok(Some(dec("5881.63"))),
            reference_rate: Ok(Some(dec("4.31"))),
            yields: TermMap::from_fn(|term| match term {
                Term::Y20 => Ok(None),
                Term::Y30 => Err(FetchError::malformed("FRED", "timeout")),
                _ => Ok(Some(dec("4.25"))),
            }),
            conversion_rates: Ok(derive_cross_rates(&quotes, None)),
        }
    }

    #[test]
    fn test_full_snapshot() {
        let batch = assemble_batch(&mock_snapshot());

        assert_eq!(batch.index_prices, vec![IndexPriceRecord { price: dec("5881.63") }]);
        assert_eq!(batch.reference_rates.len(), 1);
        // 20Y had no data, 30Y failed
        assert_eq!(batch.yields.len(), 8);
        assert_eq!(batch.conversion_rates.len(), 9);
        assert_eq!(batch.skipped, 2);
        assert_eq!(batch.len(), 19);
    }

    #[test]
    fn test_yields_keep_curve_order() {
        let batch = assemble_batch(&mock_snapshot());
        let terms: Vec<Term> = batch.yields.iter().map(|r| r.term).collect();
        assert_eq!(terms, Term::ALL[..8].to_vec());
    }

    #[test]
    fn test_empty_index_history_skips_only_index() {
        let mut snapshot = mock_snapshot();
        snapshot.index_price = Ok(None);

        let batch = assemble_batch(&snapshot);

        assert!(batch.index_prices.is_empty());
        assert_eq!(batch.reference_rates.len(), 1);
        assert_eq!(batch.yields.len(), 8);
        assert_eq!(batch.conversion_rates.len(), 9);
        assert_eq!(batch.skipped, 3);
    }

    #[test]
    fn test_failed_sources_are_absent() {
        let snapshot = MarketSnapshot {
            index_price: Err(FetchError::malformed("market data", "bad json")),
            reference_rate: Ok(None),
            yields: TermMap::from_fn(|_| Ok(None)),
            conversion_rates: Ok(None),
        };

        let batch = assemble_batch(&snapshot);

        assert!(batch.is_empty());
        assert_eq!(batch.skipped, 13);
    }

    #[test]
    fn test_conversion_records() {
        let batch = assemble_batch(&mock_snapshot());

        let eur_gbp = batch
            .conversion_rates
            .iter()
            .find(|r| r.base_currency == "EUR" && r.target_currency == "GBP")
            .unwrap();
        assert_eq!(eur_gbp.rate, Decimal::from_f64(0.8 / 0.9).unwrap());

        let identity = batch
            .conversion_rates
            .iter()
            .filter(|r| r.base_currency == r.target_currency);
        for record in identity {
            assert_eq!(record.rate, Decimal::ONE);
        }
    }
}
