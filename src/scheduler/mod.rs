//! Background push loops
//!
//! Both schedulers share the same shape: a spawned task wakes on a fixed
//! interval while a running flag stays set, and the whole per-wake body
//! lives in `run_tick(now)` so tests can replay simulated clocks without
//! sleeping. Outbound calls are bounded by a timeout; a hung quote fetch
//! or delivery for one group must not stall the rest of the tick forever.

pub mod daily;
pub mod interval;

pub use daily::{DailyPushConfig, DailyPushScheduler};
pub use interval::{IntervalPushConfig, IntervalPushScheduler};

use std::time::Duration;
use tracing::warn;

use crate::adapters::{ChatGateway, ChatTarget, QuoteFetcher};
use crate::config::IndexBenchmark;
use crate::domain::{IndexQuote, Snapshot, StockQuote};
use crate::error::{Result, WatchError};

pub(crate) async fn fetch_quote_bounded(
    quotes: &dyn QuoteFetcher,
    symbol: &str,
    timeout: Duration,
) -> Result<StockQuote> {
    match tokio::time::timeout(timeout, quotes.fetch_quote(symbol)).await {
        Ok(result) => result,
        Err(_) => Err(WatchError::OutboundTimeout {
            elapsed_secs: timeout.as_secs(),
        }),
    }
}

pub(crate) async fn resolve_target_bounded(
    gateway: &dyn ChatGateway,
    group_id: &str,
    timeout: Duration,
) -> Result<ChatTarget> {
    match tokio::time::timeout(timeout, gateway.resolve_target(group_id)).await {
        Ok(result) => result,
        Err(_) => Err(WatchError::OutboundTimeout {
            elapsed_secs: timeout.as_secs(),
        }),
    }
}

pub(crate) async fn send_snapshot_bounded(
    gateway: &dyn ChatGateway,
    target: &ChatTarget,
    snapshot: &Snapshot,
    timeout: Duration,
) -> Result<()> {
    match tokio::time::timeout(timeout, gateway.send_snapshot(target, snapshot)).await {
        Ok(result) => result,
        Err(_) => Err(WatchError::OutboundTimeout {
            elapsed_secs: timeout.as_secs(),
        }),
    }
}

/// Fetch the configured index benchmarks, skipping any that fail
pub(crate) async fn fetch_index_quotes(
    quotes: &dyn QuoteFetcher,
    benchmarks: &[IndexBenchmark],
    timeout: Duration,
) -> Vec<IndexQuote> {
    let mut indices = Vec::with_capacity(benchmarks.len());
    for benchmark in benchmarks {
        match fetch_quote_bounded(quotes, &benchmark.symbol, timeout).await {
            Ok(quote) => indices.push(IndexQuote {
                label: benchmark.label.clone(),
                quote,
            }),
            Err(err) => warn!(symbol = %benchmark.symbol, %err, "index benchmark skipped"),
        }
    }
    indices
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Hand-rolled collaborator fakes for scheduler and handler tests

    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    use crate::adapters::{ChatGateway, ChatTarget, QuoteFetcher};
    use crate::domain::{Snapshot, StockQuote};
    use crate::error::{Result, WatchError};
    use crate::persistence::WatchlistFile;
    use crate::services::WatchlistService;

    pub fn quote_for(symbol: &str) -> StockQuote {
        StockQuote {
            symbol: symbol.to_string(),
            name: format!("{symbol} Co"),
            price: dec!(100.00),
            change: dec!(1.50),
            change_pct: dec!(1.52),
            high: dec!(101.00),
            low: dec!(98.00),
        }
    }

    /// Quote source that answers every symbol except a configured set
    pub struct StaticQuotes {
        pub failing: HashSet<String>,
    }

    impl StaticQuotes {
        pub fn all_good() -> Arc<Self> {
            Arc::new(Self {
                failing: HashSet::new(),
            })
        }
    }

    #[async_trait]
    impl QuoteFetcher for StaticQuotes {
        async fn fetch_quote(&self, symbol: &str) -> Result<StockQuote> {
            if self.failing.contains(symbol) {
                return Err(WatchError::QuoteUnavailable {
                    symbol: symbol.to_string(),
                });
            }
            Ok(quote_for(symbol))
        }
    }

    /// Gateway that records every delivered snapshot
    #[derive(Default)]
    pub struct RecordingGateway {
        pub unreachable_groups: Mutex<HashSet<String>>,
        pub sent: Mutex<Vec<(String, Snapshot)>>,
    }

    impl RecordingGateway {
        pub fn reaching_all() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn unreachable(groups: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                unreachable_groups: Mutex::new(
                    groups.iter().map(|g| g.to_string()).collect(),
                ),
                ..Self::default()
            })
        }

        pub async fn make_reachable(&self, group_id: &str) {
            self.unreachable_groups.lock().await.remove(group_id);
        }

        pub async fn sent_count(&self) -> usize {
            self.sent.lock().await.len()
        }

        pub async fn sent_to(&self, group_id: &str) -> usize {
            self.sent
                .lock()
                .await
                .iter()
                .filter(|(gid, _)| gid == group_id)
                .count()
        }
    }

    #[async_trait]
    impl ChatGateway for RecordingGateway {
        async fn resolve_target(&self, group_id: &str) -> Result<ChatTarget> {
            if self.unreachable_groups.lock().await.contains(group_id) {
                return Err(WatchError::TargetNotFound {
                    group_id: group_id.to_string(),
                });
            }
            Ok(ChatTarget {
                group_id: group_id.to_string(),
                endpoint: format!("test://{group_id}"),
            })
        }

        async fn send_snapshot(&self, target: &ChatTarget, snapshot: &Snapshot) -> Result<()> {
            self.sent
                .lock()
                .await
                .push((target.group_id.clone(), snapshot.clone()));
            Ok(())
        }
    }

    pub fn service_in(dir: &tempfile::TempDir) -> Arc<WatchlistService> {
        Arc::new(WatchlistService::new(WatchlistFile::new(
            dir.path().join("watchlist.json"),
        )))
    }
}
