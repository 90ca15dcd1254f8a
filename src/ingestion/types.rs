//! Core data types for the market data pipeline
//! Pure data structures with no I/O

use crate::error::FetchError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Outcome of one field retrieval.
///
/// `Ok(Some(_))` is a fetched value, `Ok(None)` means the source had no data,
/// and `Err(_)` means the source could not be reached or read. Persistence
/// treats both of the latter as absent.
pub type FetchOutcome<T> = Result<Option<T>, FetchError>;

/// Treasury maturities on the yield curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Term {
    #[serde(rename = "3M")]
    M3,
    #[serde(rename = "6M")]
    M6,
    #[serde(rename = "1Y")]
    Y1,
    #[serde(rename = "2Y")]
    Y2,
    #[serde(rename = "3Y")]
    Y3,
    #[serde(rename = "5Y")]
    Y5,
    #[serde(rename = "7Y")]
    Y7,
    #[serde(rename = "10Y")]
    Y10,
    #[serde(rename = "20Y")]
    Y20,
    #[serde(rename = "30Y")]
    Y30,
}

impl Term {
    pub const COUNT: usize = 10;

    /// Every term, shortest maturity first
    pub const ALL: [Term; Term::COUNT] = [
        Term::M3,
        Term::M6,
        Term::Y1,
        Term::Y2,
        Term::Y3,
        Term::Y5,
        Term::Y7,
        Term::Y10,
        Term::Y20,
        Term::Y30,
    ];

    /// Label stored in `treasury_rates.term`
    pub fn label(&self) -> &'static str {
        match self {
            Term::M3 => "3M",
            Term::M6 => "6M",
            Term::Y1 => "1Y",
            Term::Y2 => "2Y",
            Term::Y3 => "3Y",
            Term::Y5 => "5Y",
            Term::Y7 => "7Y",
            Term::Y10 => "10Y",
            Term::Y20 => "20Y",
            Term::Y30 => "30Y",
        }
    }

    /// FRED constant-maturity series for this term
    pub fn series_id(&self) -> &'static str {
        match self {
            Term::M3 => "DGS3MO",
            Term::M6 => "DGS6MO",
            Term::Y1 => "DGS1",
            Term::Y2 => "DGS2",
            Term::Y3 => "DGS3",
            Term::Y5 => "DGS5",
            Term::Y7 => "DGS7",
            Term::Y10 => "DGS10",
            Term::Y20 => "DGS20",
            Term::Y30 => "DGS30",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for Term {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Term::ALL
            .into_iter()
            .find(|term| term.label() == s)
            .ok_or_else(|| FetchError::UnknownTerm(s.to_string()))
    }
}

/// Fixed-size mapping with exactly one slot per term
#[derive(Debug)]
pub struct TermMap<T> {
    slots: [T; Term::COUNT],
}

impl<T> TermMap<T> {
    pub fn from_fn(mut f: impl FnMut(Term) -> T) -> Self {
        TermMap {
            slots: std::array::from_fn(|i| f(Term::ALL[i])),
        }
    }

    pub fn get(&self, term: Term) -> &T {
        &self.slots[term.index()]
    }

    pub fn set(&mut self, term: Term, value: T) {
        self.slots[term.index()] = value;
    }

    pub fn len(&self) -> usize {
        Term::COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = (Term, &T)> {
        Term::ALL.into_iter().zip(self.slots.iter())
    }

    pub fn map<U>(self, mut f: impl FnMut(Term, T) -> U) -> TermMap<U> {
        // array::map visits slots in order
        let mut idx = 0;
        TermMap {
            slots: self.slots.map(|value| {
                let term = Term::ALL[idx];
                idx += 1;
                f(term, value)
            }),
        }
    }
}

/// Latest yield per term, all ten keys always present
pub type YieldCurve = TermMap<FetchOutcome<Decimal>>;

/// Conversion matrix over a set of currencies.
///
/// `get(base, target)` is the price of one unit of `base` in `target`.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossRates {
    currencies: Vec<String>,
    // row-major, rows are base currencies
    matrix: Vec<f64>,
}

impl CrossRates {
    pub(crate) fn new(currencies: Vec<String>, matrix: Vec<f64>) -> Self {
        debug_assert_eq!(matrix.len(), currencies.len() * currencies.len());
        CrossRates {
            currencies,
            matrix,
        }
    }

    pub fn currencies(&self) -> &[String] {
        &self.currencies
    }

    pub fn get(&self, base: &str, target: &str) -> Option<f64> {
        let i = self.currencies.iter().position(|c| c == base)?;
        let j = self.currencies.iter().position(|c| c == target)?;
        Some(self.matrix[i * self.currencies.len() + j])
    }

    /// Number of ordered pairs
    pub fn len(&self) -> usize {
        self.matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }

    /// Pairs in base-major order, including base == target
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, f64)> + '_ {
        let n = self.currencies.len();
        self.matrix.iter().enumerate().map(move |(idx, rate)| {
            (
                self.currencies[idx / n].as_str(),
                self.currencies[idx % n].as_str(),
                *rate,
            )
        })
    }
}

/// Everything retrieved in one pass over the four sources
#[derive(Debug)]
pub struct MarketSnapshot {
    pub index_price: FetchOutcome<Decimal>,
    pub reference_rate: FetchOutcome<Decimal>,
    pub yields: YieldCurve,
    pub conversion_rates: FetchOutcome<CrossRates>,
}

// Records carry no timestamp: the store assigns it with NOW() at insert.

/// Row for `sp500_prices`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPriceRecord {
    pub price: Decimal,
}

/// Row for `sofr_rates`
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRateRecord {
    pub rate: Decimal,
}

/// Row for `treasury_rates`
#[derive(Debug, Clone, PartialEq)]
pub struct YieldRecord {
    pub term: Term,
    pub rate: Decimal,
}

/// Row for `forex_rates`
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRateRecord {
    pub base_currency: String,
    pub target_currency: String,
    pub rate: Decimal,
}

/// Insert-ready records for one cycle
#[derive(Debug, Default, Clone)]
pub struct CycleBatch {
    pub index_prices: Vec<IndexPriceRecord>,
    pub reference_rates: Vec<ReferenceRateRecord>,
    pub yields: Vec<YieldRecord>,
    pub conversion_rates: Vec<ConversionRateRecord>,
    /// Fields that came back absent or could not be converted
    pub skipped: usize,
}

impl CycleBatch {
    pub fn len(&self) -> usize {
        self.index_prices.len()
            + self.reference_rates.len()
            + self.yields.len()
            + self.conversion_rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Destination tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    IndexPrices,
    ReferenceRates,
    TreasuryRates,
    ForexRates,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::IndexPrices,
        Table::ReferenceRates,
        Table::TreasuryRates,
        Table::ForexRates,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::IndexPrices => "sp500_prices",
            Table::ReferenceRates => "sofr_rates",
            Table::TreasuryRates => "treasury_rates",
            Table::ForexRates => "forex_rates",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Write operation statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteStats {
    pub index_prices: usize,
    pub reference_rates: usize,
    pub yields: usize,
    pub conversion_rates: usize,
    pub skipped: usize,
}

impl WriteStats {
    pub fn inserted(&self) -> usize {
        self.index_prices + self.reference_rates + self.yields + self.conversion_rates
    }
}

impl std::fmt::Display for WriteStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sp500_prices: {}, sofr_rates: {}, treasury_rates: {}, forex_rates: {}, skipped: {}",
            self.index_prices,
            self.reference_rates,
            self.yields,
            self.conversion_rates,
            self.skipped
        )
    }
}
