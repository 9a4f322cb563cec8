//! Market data carried through the push pipeline
//!
//! These are data-only types; rendering to chat text or images is the
//! delivery gateway's concern.

use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest price snapshot for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockQuote {
    /// Exchange-prefixed symbol, e.g. "sh600519"
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    /// Absolute change against previous close
    pub change: Decimal,
    /// Percentage change against previous close
    pub change_pct: Decimal,
    pub high: Decimal,
    pub low: Decimal,
}

impl StockQuote {
    /// Whether the upstream answered with anything usable
    pub fn has_data(&self) -> bool {
        !self.name.is_empty() || self.price > Decimal::ZERO
    }
}

/// Labeled index benchmark entry
#[derive(Debug, Clone)]
pub struct IndexQuote {
    pub label: String,
    pub quote: StockQuote,
}

/// One outbound market summary: watched rows plus index benchmarks
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub title: String,
    pub indices: Vec<IndexQuote>,
    pub rows: Vec<StockQuote>,
    pub generated_at: DateTime<Local>,
}
