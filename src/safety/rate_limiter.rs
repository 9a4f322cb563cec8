//! Per-group, per-user sliding-window admission control
//!
//! The hit log is touched on every inbound command, far more often than
//! the store is saved, so it lives behind its own lock and never mixes
//! with store persistence. A denial records nothing and is a normal
//! control outcome, not an error.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// Classification of inbound commands for exemption rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Single-symbol price lookup
    Query,
    /// Whole-watchlist overview
    Overview,
    /// Watchlist membership changes
    Mutation,
    /// Subscription and enablement toggles
    Subscription,
    /// Reminder interval changes
    Reminder,
    /// Rate-limit administration
    LimitAdmin,
    /// Group status report
    Status,
    /// Usage help
    Help,
}

impl CommandKind {
    /// Kinds that never count against a user's window
    pub fn bypasses_limit(&self) -> bool {
        matches!(
            self,
            CommandKind::Help | CommandKind::Status | CommandKind::LimitAdmin
        )
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Granted,
    Denied {
        limit: u32,
        window_minutes: u32,
        retry_after: Duration,
    },
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

/// Sliding-window rate limiter keyed by (group, user)
pub struct RateLimiter {
    admins: HashSet<String>,
    hits: RwLock<HashMap<(String, String), Vec<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new(admin_users: impl IntoIterator<Item = String>) -> Self {
        Self {
            admins: admin_users.into_iter().collect(),
            hits: RwLock::new(HashMap::new()),
        }
    }

    /// Admission check with the side effect of recording the attempt when
    /// granted. `limit` is the already-resolved effective limit for the
    /// user (override or group default); zero limit or window means
    /// unlimited.
    pub async fn check(
        &self,
        limit: u32,
        window_minutes: u32,
        group_id: &str,
        user_id: &str,
        kind: CommandKind,
        now: DateTime<Utc>,
    ) -> Admission {
        if kind.bypasses_limit() {
            return Admission::Granted;
        }
        if self.admins.contains(user_id) {
            return Admission::Granted;
        }
        if limit == 0 || window_minutes == 0 {
            return Admission::Granted;
        }

        let window = Duration::minutes(i64::from(window_minutes));
        let cutoff = now - window;

        let mut hits = self.hits.write().await;
        let entry = hits
            .entry((group_id.to_string(), user_id.to_string()))
            .or_default();
        entry.retain(|ts| *ts > cutoff);

        if entry.len() >= limit as usize {
            let oldest = entry.iter().min().copied().unwrap_or(now);
            let retry_after = (oldest + window - now).max(Duration::zero());
            debug!(
                group = group_id,
                user = user_id,
                hits = entry.len(),
                limit,
                "admission denied"
            );
            return Admission::Denied {
                limit,
                window_minutes,
                retry_after,
            };
        }

        entry.push(now);
        Admission::Granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 8, 10, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_sixth_call_in_window_denied() {
        let limiter = RateLimiter::new([]);
        let now = t0();

        for i in 0..5 {
            let when = now + Duration::minutes(i);
            assert!(
                limiter
                    .check(5, 10, "g1", "u1", CommandKind::Query, when)
                    .await
                    .is_granted(),
                "call {i} should pass"
            );
        }

        let denied = limiter
            .check(5, 10, "g1", "u1", CommandKind::Query, now + Duration::minutes(5))
            .await;
        assert_eq!(
            denied,
            Admission::Denied {
                limit: 5,
                window_minutes: 10,
                retry_after: Duration::minutes(5),
            }
        );
    }

    #[tokio::test]
    async fn test_window_elapse_readmits() {
        let limiter = RateLimiter::new([]);
        let now = t0();

        for _ in 0..5 {
            limiter
                .check(5, 10, "g1", "u1", CommandKind::Query, now)
                .await;
        }
        assert!(!limiter
            .check(5, 10, "g1", "u1", CommandKind::Query, now + Duration::minutes(9))
            .await
            .is_granted());

        // Once the whole window has elapsed, a fresh call passes
        assert!(limiter
            .check(5, 10, "g1", "u1", CommandKind::Query, now + Duration::minutes(11))
            .await
            .is_granted());
    }

    #[tokio::test]
    async fn test_denied_attempts_are_not_recorded() {
        let limiter = RateLimiter::new([]);
        let now = t0();

        limiter.check(1, 10, "g1", "u1", CommandKind::Query, now).await;
        // Hammer the limiter while denied; nothing may be recorded
        for i in 1..=5 {
            assert!(!limiter
                .check(1, 10, "g1", "u1", CommandKind::Query, now + Duration::minutes(i))
                .await
                .is_granted());
        }

        // The single recorded hit expires ten minutes after t0
        assert!(limiter
            .check(1, 10, "g1", "u1", CommandKind::Query, now + Duration::minutes(10) + Duration::seconds(1))
            .await
            .is_granted());
    }

    #[tokio::test]
    async fn test_zero_limit_or_window_unlimited() {
        let limiter = RateLimiter::new([]);
        let now = t0();

        for _ in 0..100 {
            assert!(limiter
                .check(0, 10, "g1", "u1", CommandKind::Query, now)
                .await
                .is_granted());
            assert!(limiter
                .check(5, 0, "g1", "u2", CommandKind::Query, now)
                .await
                .is_granted());
        }
    }

    #[tokio::test]
    async fn test_admin_allow_list_bypasses() {
        let limiter = RateLimiter::new(["root".to_string()]);
        let now = t0();

        for _ in 0..20 {
            assert!(limiter
                .check(1, 10, "g1", "root", CommandKind::Query, now)
                .await
                .is_granted());
        }
    }

    #[tokio::test]
    async fn test_exempt_kinds_bypass_and_record_nothing() {
        let limiter = RateLimiter::new([]);
        let now = t0();

        for _ in 0..20 {
            assert!(limiter
                .check(1, 10, "g1", "u1", CommandKind::Help, now)
                .await
                .is_granted());
        }
        // The exempt traffic left the window empty
        assert!(limiter
            .check(1, 10, "g1", "u1", CommandKind::Query, now)
            .await
            .is_granted());
    }

    #[tokio::test]
    async fn test_keys_are_per_group_and_per_user() {
        let limiter = RateLimiter::new([]);
        let now = t0();

        limiter.check(1, 10, "g1", "u1", CommandKind::Query, now).await;
        assert!(!limiter
            .check(1, 10, "g1", "u1", CommandKind::Query, now)
            .await
            .is_granted());

        // Same user in another group, and another user in the same group,
        // are independent windows
        assert!(limiter
            .check(1, 10, "g2", "u1", CommandKind::Query, now)
            .await
            .is_granted());
        assert!(limiter
            .check(1, 10, "g1", "u2", CommandKind::Query, now)
            .await
            .is_granted());
    }
}
