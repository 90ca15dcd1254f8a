//! Data ingestion module - functional pipeline for market data snapshots

pub mod batch;
pub mod fetch;
pub mod parse;
pub mod session;
pub mod types;
pub mod utils;
pub mod write;

pub use types::*;
