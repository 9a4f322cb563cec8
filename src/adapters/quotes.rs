//! Quote lookup seam and HTTP implementation
//!
//! The core only ever asks "given a symbol, return its latest snapshot or
//! fail"; everything upstream-specific stays behind this trait.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::StockQuote;
use crate::error::{Result, WatchError};

/// Latest-price lookup for a single symbol
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<StockQuote>;
}

/// Quote provider speaking a plain JSON endpoint
#[derive(Clone)]
pub struct HttpQuoteProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    symbol: String,
    #[serde(default)]
    name: String,
    price: Decimal,
    prev_close: Decimal,
    #[serde(default)]
    high: Decimal,
    #[serde(default)]
    low: Decimal,
}

impl HttpQuoteProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn into_quote(resp: QuoteResponse) -> StockQuote {
        let change = resp.price - resp.prev_close;
        let change_pct = if resp.prev_close > Decimal::ZERO {
            (change / resp.prev_close * Decimal::ONE_HUNDRED).round_dp(2)
        } else {
            Decimal::ZERO
        };
        StockQuote {
            symbol: resp.symbol,
            name: resp.name,
            price: resp.price,
            change,
            change_pct,
            high: resp.high,
            low: resp.low,
        }
    }
}

#[async_trait]
impl QuoteFetcher for HttpQuoteProvider {
    async fn fetch_quote(&self, symbol: &str) -> Result<StockQuote> {
        let url = format!("{}/quote", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(WatchError::QuoteUnavailable {
                symbol: symbol.to_string(),
            });
        }

        let body: QuoteResponse = resp.error_for_status()?.json().await?;
        let quote = Self::into_quote(body);
        if !quote.has_data() {
            return Err(WatchError::QuoteUnavailable {
                symbol: symbol.to_string(),
            });
        }

        debug!(symbol = %quote.symbol, price = %quote.price, "quote fetched");
        Ok(quote)
    }
}
