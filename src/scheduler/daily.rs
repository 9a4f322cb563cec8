//! Daily push loop
//!
//! Wakes once a minute and compares wall-clock HH:MM against the
//! configured push time. The cheap minute check gates the work; the
//! per-group calendar-date marker is what actually guarantees one push
//! per day when the loop fires more than once inside the match minute.

use chrono::{DateTime, Local, NaiveDate, Timelike};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::adapters::{ChatGateway, QuoteFetcher};
use crate::config::IndexBenchmark;
use crate::domain::{GroupWatchlist, Snapshot};
use crate::error::Result;
use crate::scheduler::{
    fetch_index_quotes, fetch_quote_bounded, resolve_target_bounded, send_snapshot_bounded,
};
use crate::services::WatchlistService;

/// Configuration for the daily push loop
#[derive(Debug, Clone)]
pub struct DailyPushConfig {
    /// Wall-clock hour of the push
    pub hour: u32,
    /// Wall-clock minute of the push
    pub minute: u32,
    /// Seconds between wake-ups (default: 60)
    pub tick_secs: u64,
    /// Upper bound on one outbound call (default: 10s)
    pub outbound_timeout_secs: u64,
    /// Index benchmarks included in every snapshot
    pub indices: Vec<IndexBenchmark>,
}

impl Default for DailyPushConfig {
    fn default() -> Self {
        Self {
            hour: 15,
            minute: 5,
            tick_secs: 60,
            outbound_timeout_secs: 10,
            indices: Vec::new(),
        }
    }
}

/// Sends each subscribed, enabled group its watchlist once per day
pub struct DailyPushScheduler {
    config: DailyPushConfig,
    service: Arc<WatchlistService>,
    quotes: Arc<dyn QuoteFetcher>,
    gateway: Arc<dyn ChatGateway>,
    pushed: RwLock<HashMap<String, NaiveDate>>,
    running: Arc<AtomicBool>,
}

impl DailyPushScheduler {
    pub fn new(
        config: DailyPushConfig,
        service: Arc<WatchlistService>,
        quotes: Arc<dyn QuoteFetcher>,
        gateway: Arc<dyn ChatGateway>,
    ) -> Self {
        Self {
            config,
            service,
            quotes,
            gateway,
            pushed: RwLock::new(HashMap::new()),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the background loop
    pub fn start(self: &Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        info!(
            "daily push scheduler started ({:02}:{:02}, tick {}s)",
            self.config.hour, self.config.minute, self.config.tick_secs
        );

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(scheduler.config.tick_secs));
            while scheduler.running.load(Ordering::SeqCst) {
                interval.tick().await;
                scheduler.run_tick(Local::now()).await;
            }
            info!("daily push scheduler stopped");
        });
    }

    /// Stop the background loop
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One wake-up of the loop at the given wall-clock time
    pub async fn run_tick(&self, now: DateTime<Local>) {
        if now.hour() != self.config.hour || now.minute() != self.config.minute {
            return;
        }

        let store = match self.service.snapshot().await {
            Ok(store) => store,
            Err(err) => {
                warn!(%err, "daily push skipped, store unreadable");
                return;
            }
        };

        let today = now.date_naive();
        for (group_id, group) in &store.groups {
            if !group.wants_daily_push() {
                continue;
            }
            if self.already_pushed(group_id, today).await {
                debug!(group = %group_id, "already pushed today");
                continue;
            }
            // Failures here are isolated: the next group still runs
            match self.push_group(group, now).await {
                Ok(()) => self.mark_pushed(group_id, today).await,
                Err(err) => warn!(group = %group_id, %err, "daily push failed"),
            }
        }
    }

    /// Resolve the target, build the full-watchlist snapshot, send it.
    /// The date marker is set by the caller after the send attempt, so a
    /// delivery error does not retry within the same day; failures before
    /// the send leave the group unmarked.
    async fn push_group(&self, group: &GroupWatchlist, now: DateTime<Local>) -> Result<()> {
        let timeout = Duration::from_secs(self.config.outbound_timeout_secs);
        let target =
            resolve_target_bounded(self.gateway.as_ref(), &group.group_id, timeout).await?;

        let mut rows = Vec::with_capacity(group.stocks.len());
        for symbol in &group.stocks {
            match fetch_quote_bounded(self.quotes.as_ref(), symbol, timeout).await {
                Ok(quote) => rows.push(quote),
                Err(err) => warn!(%symbol, %err, "quote skipped in daily snapshot"),
            }
        }
        let indices =
            fetch_index_quotes(self.quotes.as_ref(), &self.config.indices, timeout).await;

        let title = if group.group_name.is_empty() {
            "Daily close".to_string()
        } else {
            format!("Daily close: {}", group.group_name)
        };
        let snapshot = Snapshot {
            title,
            indices,
            rows,
            generated_at: now,
        };

        if let Err(err) =
            send_snapshot_bounded(self.gateway.as_ref(), &target, &snapshot, timeout).await
        {
            warn!(group = %group.group_id, %err, "daily snapshot delivery failed");
        }
        Ok(())
    }

    async fn already_pushed(&self, group_id: &str, date: NaiveDate) -> bool {
        self.pushed.read().await.get(group_id) == Some(&date)
    }

    async fn mark_pushed(&self, group_id: &str, date: NaiveDate) {
        self.pushed
            .write()
            .await
            .insert(group_id.to_string(), date);
        info!(group = %group_id, %date, "daily push recorded");
    }
}
