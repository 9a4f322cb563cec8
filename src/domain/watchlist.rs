//! Persisted watchlist document
//!
//! One JSON document holds every group's watchlist and settings. The
//! document carries a schema version; migrations run on every load and
//! are cumulative and idempotent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, WatchError};

/// Schema version written by every save
pub const CURRENT_VERSION: u32 = 3;

/// Requests allowed per window when a group has no explicit limit
pub const DEFAULT_LIMIT: u32 = 5;

/// Sliding-window width in minutes when a group has no explicit window
pub const DEFAULT_WINDOW_MINUTES: u32 = 10;

/// Root document: per-group stock watchlists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistStore {
    /// Absent in the oldest documents, which deserialize as version 0
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupWatchlist>,
}

/// A group's watchlist and subscription settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupWatchlist {
    pub group_id: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub stocks: Vec<String>,
    #[serde(default)]
    pub subscribed: bool,
    #[serde(default)]
    pub stock_intervals: BTreeMap<String, u32>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub default_limit: u32,
    #[serde(default)]
    pub window_minutes: u32,
    #[serde(default)]
    pub user_limits: BTreeMap<String, u32>,
    #[serde(default)]
    pub updated_at: String,
}

impl GroupWatchlist {
    fn new(group_id: &str, group_name: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            group_name: group_name.to_string(),
            stocks: Vec::new(),
            subscribed: false,
            stock_intervals: BTreeMap::new(),
            enabled: true,
            default_limit: DEFAULT_LIMIT,
            window_minutes: DEFAULT_WINDOW_MINUTES,
            user_limits: BTreeMap::new(),
            updated_at: String::new(),
        }
    }

    /// Effective request limit for a user: per-user override if present,
    /// group default otherwise. Zero means unlimited.
    pub fn effective_limit(&self, user_id: &str) -> u32 {
        self.user_limits
            .get(user_id)
            .copied()
            .unwrap_or(self.default_limit)
    }

    /// Reminder intervals with minutes > 0, in stable symbol order
    pub fn active_intervals(&self) -> Vec<(String, u32)> {
        self.stock_intervals
            .iter()
            .filter(|(_, minutes)| **minutes > 0)
            .map(|(symbol, minutes)| (symbol.clone(), *minutes))
            .collect()
    }

    /// Whether the daily push should consider this group at all
    pub fn wants_daily_push(&self) -> bool {
        self.enabled && self.subscribed && !self.stocks.is_empty()
    }
}

impl WatchlistStore {
    /// Fresh store at the current schema version
    pub fn empty() -> Self {
        Self {
            version: CURRENT_VERSION,
            groups: BTreeMap::new(),
        }
    }

    /// Fetch or create the group record, refreshing a changed display name
    pub fn ensure_group(&mut self, group_id: &str, group_name: &str) -> &mut GroupWatchlist {
        let group = self
            .groups
            .entry(group_id.to_string())
            .or_insert_with(|| GroupWatchlist::new(group_id, group_name));
        if !group_name.is_empty() && group.group_name != group_name {
            group.group_name = group_name.to_string();
        }
        group
    }

    /// Apply the migration chain up to [`CURRENT_VERSION`].
    ///
    /// Versions are cumulative: 0 is a legacy marker for 1; 2 introduced
    /// the per-group kill-switch; 3 introduced rate-limit settings.
    /// Re-running on an already-current store is a no-op. A version newer
    /// than this build understands is a storage error.
    pub fn migrate(&mut self) -> Result<()> {
        if self.version > CURRENT_VERSION {
            return Err(WatchError::UnsupportedVersion(self.version));
        }
        if self.version == 0 {
            self.version = 1;
        }
        if self.version < 2 {
            for group in self.groups.values_mut() {
                group.enabled = true;
            }
            self.version = 2;
        }
        if self.version < 3 {
            for group in self.groups.values_mut() {
                if group.default_limit == 0 {
                    group.default_limit = DEFAULT_LIMIT;
                }
                if group.window_minutes == 0 {
                    group.window_minutes = DEFAULT_WINDOW_MINUTES;
                }
            }
            self.version = 3;
        }
        Ok(())
    }
}
