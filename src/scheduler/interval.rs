//! Interval reminder loop
//!
//! Wakes once a minute regardless of wall-clock time. Each (group,
//! symbol) pair with a configured cadence is pushed when the elapsed
//! time since its last push reaches the cadence. This is a pure duration
//! comparison with no calendar alignment, deliberately unlike the daily
//! loop's date marker; the two must not be unified.

use chrono::{DateTime, Local, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::adapters::{ChatGateway, QuoteFetcher};
use crate::config::IndexBenchmark;
use crate::domain::Snapshot;
use crate::scheduler::{
    fetch_index_quotes, fetch_quote_bounded, resolve_target_bounded, send_snapshot_bounded,
};
use crate::services::WatchlistService;

/// Configuration for the interval reminder loop
#[derive(Debug, Clone)]
pub struct IntervalPushConfig {
    /// Seconds between wake-ups (default: 60)
    pub tick_secs: u64,
    /// Upper bound on one outbound call (default: 10s)
    pub outbound_timeout_secs: u64,
    /// Index benchmarks included in every reminder
    pub indices: Vec<IndexBenchmark>,
}

impl Default for IntervalPushConfig {
    fn default() -> Self {
        Self {
            tick_secs: 60,
            outbound_timeout_secs: 10,
            indices: Vec::new(),
        }
    }
}

/// Pushes single-symbol reminders on each group's configured cadence
pub struct IntervalPushScheduler {
    config: IntervalPushConfig,
    service: Arc<WatchlistService>,
    quotes: Arc<dyn QuoteFetcher>,
    gateway: Arc<dyn ChatGateway>,
    last_push: RwLock<HashMap<(String, String), DateTime<Utc>>>,
    running: Arc<AtomicBool>,
}

impl IntervalPushScheduler {
    pub fn new(
        config: IntervalPushConfig,
        service: Arc<WatchlistService>,
        quotes: Arc<dyn QuoteFetcher>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        Self {
            config,
            service,
            quotes,
            gateway,
            last_push: RwLock::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the background loop
    pub fn start(self: &Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        info!(
            "interval push scheduler started (tick {}s)",
            self.config.tick_secs
        );

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(scheduler.config.tick_secs));
            while scheduler.running.load(Ordering::SeqCst) {
                interval.tick().await;
                scheduler.run_tick(Local::now()).await;
            }
            info!("interval push scheduler stopped");
        });
    }

    /// Stop the background loop
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One wake-up of the loop at the given wall-clock time
    pub async fn run_tick(&self, now: DateTime<Local>) {
        let store = match self.service.snapshot().await {
            Ok(store) => store,
            Err(err) => {
                warn!(%err, "interval push skipped, store unreadable");
                return;
            }
        };

        let timeout = Duration::from_secs(self.config.outbound_timeout_secs);
        let now_utc = now.with_timezone(&Utc);

        for (group_id, group) in &store.groups {
            if !group.enabled {
                continue;
            }
            let reminders = group.active_intervals();
            if reminders.is_empty() {
                continue;
            }

            let target =
                match resolve_target_bounded(self.gateway.as_ref(), group_id, timeout).await {
                    Ok(target) => target,
                    Err(err) => {
                        warn!(group = %group_id, %err, "interval push target unresolved");
                        continue;
                    }
                };

            for (symbol, minutes) in reminders {
                if !self.is_due(group_id, &symbol, minutes, now_utc).await {
                    continue;
                }
                let quote =
                    match fetch_quote_bounded(self.quotes.as_ref(), &symbol, timeout).await {
                        Ok(quote) => quote,
                        Err(err) => {
                            warn!(%symbol, %err, "interval push quote skipped");
                            continue;
                        }
                    };

                let indices =
                    fetch_index_quotes(self.quotes.as_ref(), &self.config.indices, timeout).await;
                let snapshot = Snapshot {
                    title: format!("Interval reminder ({minutes} min)"),
                    indices,
                    rows: vec![quote],
                    generated_at: now,
                };

                if let Err(err) =
                    send_snapshot_bounded(self.gateway.as_ref(), &target, &snapshot, timeout).await
                {
                    warn!(group = %group_id, %symbol, %err, "interval reminder delivery failed");
                }
                self.mark_pushed(group_id, &symbol, now_utc).await;
            }
        }
    }

    /// Due when never pushed, or when the elapsed duration reaches the
    /// cadence
    async fn is_due(
        &self,
        group_id: &str,
        symbol: &str,
        minutes: u32,
        now: DateTime<Utc>,
    ) -> bool {
        let last_push = self.last_push.read().await;
        match last_push.get(&(group_id.to_string(), symbol.to_string())) {
            Some(last) => now.signed_duration_since(*last)
                >= chrono::Duration::minutes(i64::from(minutes)),
            None => true,
        }
    }

    async fn mark_pushed(&self, group_id: &str, symbol: &str, now: DateTime<Utc>) {
        self.last_push
            .write()
            .await
            .insert((group_id.to_string(), symbol.to_string()), now);
    }
}
