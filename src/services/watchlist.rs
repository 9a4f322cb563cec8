//! Watchlist mutation and query API
//!
//! Every operation is an atomic load-mutate-save over the persisted
//! document, serialized by one exclusive lock. Nothing is cached between
//! operations, so schedulers reading the store fresh each tick always see
//! the latest completed mutation. No network call ever runs under this
//! lock.

use chrono::Utc;
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::{GroupWatchlist, WatchlistStore};
use crate::error::{Result, WatchError};
use crate::persistence::WatchlistFile;

/// Result of an add operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub added: Vec<String>,
    pub already_present: Vec<String>,
}

/// Result of a remove operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub removed: Vec<String>,
    pub not_present: Vec<String>,
}

/// Serialized access to the watchlist document
pub struct WatchlistService {
    file: WatchlistFile,
    lock: Mutex<()>,
}

impl WatchlistService {
    pub fn new(file: WatchlistFile) -> Self {
        Self {
            file,
            lock: Mutex::new(()),
        }
    }

    /// Run one mutation against the named group: load, mutate, stamp,
    /// save. A failed save propagates and the mutated copy is dropped.
    async fn with_group<T>(
        &self,
        group_id: &str,
        group_name: &str,
        mutate: impl FnOnce(&mut GroupWatchlist) -> T,
    ) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut store = self.file.load().await?;
        let group = store.ensure_group(group_id, group_name);
        let out = mutate(group);
        group.updated_at = Utc::now().to_rfc3339();
        self.file.save(&store).await?;
        Ok(out)
    }

    async fn read(&self) -> Result<WatchlistStore> {
        let _guard = self.lock.lock().await;
        self.file.load().await
    }

    /// Append symbols the group does not already follow, preserving input
    /// order; duplicates are reported, never an error.
    pub async fn add_symbols(
        &self,
        group_id: &str,
        group_name: &str,
        symbols: &[String],
    ) -> Result<AddOutcome> {
        if symbols.is_empty() {
            return Err(WatchError::Validation("no symbols given".to_string()));
        }

        let outcome = self
            .with_group(group_id, group_name, |group| {
                let mut existing: HashSet<String> = group.stocks.iter().cloned().collect();
                let mut added = Vec::new();
                let mut already_present = Vec::new();
                for symbol in symbols {
                    if existing.insert(symbol.clone()) {
                        group.stocks.push(symbol.clone());
                        added.push(symbol.clone());
                    } else {
                        already_present.push(symbol.clone());
                    }
                }
                AddOutcome {
                    added,
                    already_present,
                }
            })
            .await?;

        info!(
            group = group_id,
            added = outcome.added.len(),
            existing = outcome.already_present.len(),
            "watchlist add"
        );
        Ok(outcome)
    }

    /// Remove symbols from the group's list; unknown ones are reported
    /// back as not present.
    pub async fn remove_symbols(
        &self,
        group_id: &str,
        group_name: &str,
        symbols: &[String],
    ) -> Result<RemoveOutcome> {
        if symbols.is_empty() {
            return Err(WatchError::Validation("no symbols given".to_string()));
        }

        let outcome = self
            .with_group(group_id, group_name, |group| {
                let requested: HashSet<&String> = symbols.iter().collect();
                let mut removed = Vec::new();
                let mut kept = Vec::new();
                for symbol in group.stocks.drain(..) {
                    if requested.contains(&symbol) {
                        removed.push(symbol);
                    } else {
                        kept.push(symbol);
                    }
                }
                group.stocks = kept;

                let removed_set: HashSet<&String> = removed.iter().collect();
                let not_present = symbols
                    .iter()
                    .filter(|symbol| !removed_set.contains(symbol))
                    .cloned()
                    .collect();
                RemoveOutcome {
                    removed,
                    not_present,
                }
            })
            .await?;

        info!(
            group = group_id,
            removed = outcome.removed.len(),
            missing = outcome.not_present.len(),
            "watchlist remove"
        );
        Ok(outcome)
    }

    pub async fn set_subscription(
        &self,
        group_id: &str,
        group_name: &str,
        subscribed: bool,
    ) -> Result<()> {
        self.with_group(group_id, group_name, |group| {
            group.subscribed = subscribed;
        })
        .await
    }

    pub async fn set_enabled(&self, group_id: &str, group_name: &str, enabled: bool) -> Result<()> {
        self.with_group(group_id, group_name, |group| {
            group.enabled = enabled;
        })
        .await
    }

    /// Set a per-symbol reminder cadence; zero minutes turns the reminder
    /// off. Reminders are independent of watchlist membership.
    pub async fn set_reminder_interval(
        &self,
        group_id: &str,
        group_name: &str,
        symbol: &str,
        minutes: u32,
    ) -> Result<()> {
        self.with_group(group_id, group_name, |group| {
            if minutes == 0 {
                group.stock_intervals.remove(symbol);
            } else {
                group.stock_intervals.insert(symbol.to_string(), minutes);
            }
        })
        .await
    }

    pub async fn set_default_limit(
        &self,
        group_id: &str,
        group_name: &str,
        limit: u32,
    ) -> Result<()> {
        self.with_group(group_id, group_name, |group| {
            group.default_limit = limit;
        })
        .await
    }

    pub async fn set_window_minutes(
        &self,
        group_id: &str,
        group_name: &str,
        minutes: u32,
    ) -> Result<()> {
        self.with_group(group_id, group_name, |group| {
            group.window_minutes = minutes;
        })
        .await
    }

    pub async fn set_user_limit(
        &self,
        group_id: &str,
        group_name: &str,
        user_id: &str,
        limit: u32,
    ) -> Result<()> {
        self.with_group(group_id, group_name, |group| {
            group.user_limits.insert(user_id.to_string(), limit);
        })
        .await
    }

    pub async fn clear_user_limit(
        &self,
        group_id: &str,
        group_name: &str,
        user_id: &str,
    ) -> Result<()> {
        self.with_group(group_id, group_name, |group| {
            group.user_limits.remove(user_id);
        })
        .await
    }

    /// Watched symbols in insertion order; empty for an unknown group
    pub async fn list_symbols(&self, group_id: &str) -> Result<Vec<String>> {
        let store = self.read().await?;
        Ok(store
            .groups
            .get(group_id)
            .map(|group| group.stocks.clone())
            .unwrap_or_default())
    }

    /// Active reminders (minutes > 0) for the group
    pub async fn list_reminders(&self, group_id: &str) -> Result<Vec<(String, u32)>> {
        let store = self.read().await?;
        Ok(store
            .groups
            .get(group_id)
            .map(|group| group.active_intervals())
            .unwrap_or_default())
    }

    /// Current record for one group, if it exists
    pub async fn group(&self, group_id: &str) -> Result<Option<GroupWatchlist>> {
        let store = self.read().await?;
        Ok(store.groups.get(group_id).cloned())
    }

    /// Fresh copy of the whole document, for scheduler ticks
    pub async fn snapshot(&self) -> Result<WatchlistStore> {
        self.read().await
    }
}
