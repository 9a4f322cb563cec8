//! Command execution
//!
//! One entry point per resolved command variant. The handler validates
//! input before taking any lock, reads the group's limit settings under
//! the store lock, then consults the rate limiter under its own lock;
//! the two locks are never held together.

use chrono::{DateTime, Local, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::adapters::QuoteFetcher;
use crate::commands::WatchCommand;
use crate::config::IndexBenchmark;
use crate::domain::{Snapshot, DEFAULT_LIMIT, DEFAULT_WINDOW_MINUTES};
use crate::error::Result;
use crate::safety::{Admission, CommandKind, RateLimiter};
use crate::scheduler::{fetch_index_quotes, fetch_quote_bounded};
use crate::services::{SymbolResolver, WatchlistService};

/// Where a command came from
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub group_id: String,
    pub group_name: String,
    pub user_id: String,
}

/// Executes resolved commands and renders plain-text replies
pub struct CommandHandler {
    service: Arc<WatchlistService>,
    limiter: Arc<RateLimiter>,
    quotes: Arc<dyn QuoteFetcher>,
    resolver: SymbolResolver,
    indices: Vec<IndexBenchmark>,
    daily_time: String,
    outbound_timeout_secs: u64,
}

impl CommandHandler {
    pub fn new(
        service: Arc<WatchlistService>,
        limiter: Arc<RateLimiter>,
        quotes: Arc<dyn QuoteFetcher>,
        indices: Vec<IndexBenchmark>,
        daily_time: String,
        outbound_timeout_secs: u64,
    ) -> Self {
        let resolver = SymbolResolver::new(quotes.clone());
        Self {
            service,
            limiter,
            quotes,
            resolver,
            indices,
            daily_time,
            outbound_timeout_secs,
        }
    }

    /// Execute a command now
    pub async fn handle(&self, ctx: &CommandContext, command: WatchCommand) -> Result<String> {
        self.handle_at(ctx, command, Utc::now()).await
    }

    /// Execute a command at an explicit instant (test seam)
    pub async fn handle_at(
        &self,
        ctx: &CommandContext,
        command: WatchCommand,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let kind = command.kind();
        let group = self.service.group(&ctx.group_id).await?;

        if !kind.bypasses_limit() {
            let (limit, window_minutes) = match &group {
                Some(group) => (group.effective_limit(&ctx.user_id), group.window_minutes),
                None => (DEFAULT_LIMIT, DEFAULT_WINDOW_MINUTES),
            };
            let admission = self
                .limiter
                .check(limit, window_minutes, &ctx.group_id, &ctx.user_id, kind, now)
                .await;
            if let Admission::Denied {
                limit,
                window_minutes,
                retry_after,
            } = admission
            {
                debug!(group = %ctx.group_id, user = %ctx.user_id, "command denied by limiter");
                return Ok(format!(
                    "Rate limit reached: {limit} requests per {window_minutes} min. Try again in {}s.",
                    retry_after.num_seconds().max(1)
                ));
            }
        }

        // A disabled group answers queries with a pointer to the switch
        let enabled = group.as_ref().map(|g| g.enabled).unwrap_or(true);
        if !enabled && matches!(kind, CommandKind::Query | CommandKind::Overview) {
            return Ok("Push and queries are switched off for this group. Use enable to switch them back on.".to_string());
        }

        match command {
            WatchCommand::Quote { code } => self.quote(&code).await,
            WatchCommand::Add { codes } => self.add(ctx, &codes).await,
            WatchCommand::Remove { codes } => self.remove(ctx, &codes).await,
            WatchCommand::List => self.list(ctx).await,
            WatchCommand::Overview => self.overview(ctx, now).await,
            WatchCommand::Subscribe => {
                self.service
                    .set_subscription(&ctx.group_id, &ctx.group_name, true)
                    .await?;
                Ok(format!("Daily push enabled ({})", self.daily_time))
            }
            WatchCommand::Unsubscribe => {
                self.service
                    .set_subscription(&ctx.group_id, &ctx.group_name, false)
                    .await?;
                Ok("Daily push disabled".to_string())
            }
            WatchCommand::Enable => {
                self.service
                    .set_enabled(&ctx.group_id, &ctx.group_name, true)
                    .await?;
                Ok("Stock push enabled for this group".to_string())
            }
            WatchCommand::Disable => {
                self.service
                    .set_enabled(&ctx.group_id, &ctx.group_name, false)
                    .await?;
                Ok("Stock push disabled for this group".to_string())
            }
            WatchCommand::SetReminder { code, minutes } => {
                self.set_reminder(ctx, &code, minutes).await
            }
            WatchCommand::ListReminders => self.list_reminders(ctx).await,
            WatchCommand::SetDefaultLimit { limit } => {
                self.service
                    .set_default_limit(&ctx.group_id, &ctx.group_name, limit)
                    .await?;
                if limit == 0 {
                    Ok("Request limit removed (unlimited)".to_string())
                } else {
                    Ok(format!("Request limit set to {limit} per window"))
                }
            }
            WatchCommand::SetWindow { minutes } => {
                self.service
                    .set_window_minutes(&ctx.group_id, &ctx.group_name, minutes)
                    .await?;
                Ok(format!("Rate-limit window set to {minutes} min"))
            }
            WatchCommand::SetUserLimit { user_id, limit } => {
                self.service
                    .set_user_limit(&ctx.group_id, &ctx.group_name, &user_id, limit)
                    .await?;
                if limit == 0 {
                    Ok(format!("User {user_id} is now unlimited"))
                } else {
                    Ok(format!("User {user_id} limited to {limit} per window"))
                }
            }
            WatchCommand::ClearUserLimit { user_id } => {
                self.service
                    .clear_user_limit(&ctx.group_id, &ctx.group_name, &user_id)
                    .await?;
                Ok(format!("Override for user {user_id} cleared"))
            }
            WatchCommand::Status => self.status(ctx).await,
            WatchCommand::Help => Ok(help_text()),
        }
    }

    async fn quote(&self, code: &str) -> Result<String> {
        let resolved = self.resolver.resolve(&[code.to_string()]).await;
        let Some(symbol) = resolved.into_iter().next() else {
            return Ok(format!("Unrecognized symbol: {code}"));
        };
        let timeout = Duration::from_secs(self.outbound_timeout_secs);
        match fetch_quote_bounded(self.quotes.as_ref(), &symbol, timeout).await {
            Ok(quote) => Ok(format!(
                "{} {}: {} ({}{}%) high {} low {}",
                quote.symbol,
                quote.name,
                quote.price,
                if quote.change_pct.is_sign_negative() {
                    ""
                } else {
                    "+"
                },
                quote.change_pct,
                quote.high,
                quote.low
            )),
            Err(err) => {
                debug!(%symbol, %err, "quote lookup failed");
                Ok(format!("No quote available for {symbol}"))
            }
        }
    }

    async fn add(&self, ctx: &CommandContext, codes: &[String]) -> Result<String> {
        if codes.is_empty() {
            return Ok(usage_add().to_string());
        }
        let resolved = self.resolver.resolve(codes).await;
        if resolved.is_empty() {
            return Ok("No valid stock codes recognized".to_string());
        }
        let outcome = self
            .service
            .add_symbols(&ctx.group_id, &ctx.group_name, &resolved)
            .await?;

        let mut parts = Vec::new();
        if !outcome.added.is_empty() {
            parts.push(format!("Added: {}", outcome.added.join(", ")));
        }
        if !outcome.already_present.is_empty() {
            parts.push(format!(
                "Already following: {}",
                outcome.already_present.join(", ")
            ));
        }
        info!(group = %ctx.group_id, user = %ctx.user_id, "watchlist add handled");
        Ok(parts.join("\n"))
    }

    async fn remove(&self, ctx: &CommandContext, codes: &[String]) -> Result<String> {
        if codes.is_empty() {
            return Ok(usage_remove().to_string());
        }
        let resolved = self.resolver.resolve(codes).await;
        if resolved.is_empty() {
            return Ok("No valid stock codes recognized".to_string());
        }
        let outcome = self
            .service
            .remove_symbols(&ctx.group_id, &ctx.group_name, &resolved)
            .await?;

        let mut parts = Vec::new();
        if !outcome.removed.is_empty() {
            parts.push(format!("Removed: {}", outcome.removed.join(", ")));
        }
        if !outcome.not_present.is_empty() {
            parts.push(format!("Not followed: {}", outcome.not_present.join(", ")));
        }
        Ok(parts.join("\n"))
    }

    async fn list(&self, ctx: &CommandContext) -> Result<String> {
        let symbols = self.service.list_symbols(&ctx.group_id).await?;
        if symbols.is_empty() {
            return Ok("No symbols followed yet. Try adding one, e.g. 600519.".to_string());
        }
        Ok(format!(
            "Following ({}): {}",
            symbols.len(),
            symbols.join(", ")
        ))
    }

    async fn overview(&self, ctx: &CommandContext, now: DateTime<Utc>) -> Result<String> {
        let symbols = self.service.list_symbols(&ctx.group_id).await?;
        if symbols.is_empty() {
            return Ok("No symbols followed yet. Try adding one, e.g. 600519.".to_string());
        }

        let timeout = Duration::from_secs(self.outbound_timeout_secs);
        let mut rows = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            match fetch_quote_bounded(self.quotes.as_ref(), symbol, timeout).await {
                Ok(quote) => rows.push(quote),
                Err(err) => debug!(%symbol, %err, "quote skipped in overview"),
            }
        }
        let indices = fetch_index_quotes(self.quotes.as_ref(), &self.indices, timeout).await;

        let title = if ctx.group_name.is_empty() {
            "Current watchlist".to_string()
        } else {
            format!("Current watchlist: {}", ctx.group_name)
        };
        let snapshot = Snapshot {
            title,
            indices,
            rows,
            generated_at: now.with_timezone(&Local),
        };
        Ok(crate::adapters::messenger::render_snapshot(&snapshot))
    }

    async fn set_reminder(&self, ctx: &CommandContext, code: &str, minutes: u32) -> Result<String> {
        let resolved = self.resolver.resolve(&[code.to_string()]).await;
        let Some(symbol) = resolved.into_iter().next() else {
            return Ok(format!("Unrecognized symbol: {code}"));
        };
        self.service
            .set_reminder_interval(&ctx.group_id, &ctx.group_name, &symbol, minutes)
            .await?;
        if minutes == 0 {
            Ok(format!("Reminder for {symbol} turned off"))
        } else {
            Ok(format!("Reminding about {symbol} every {minutes} min"))
        }
    }

    async fn list_reminders(&self, ctx: &CommandContext) -> Result<String> {
        let reminders = self.service.list_reminders(&ctx.group_id).await?;
        if reminders.is_empty() {
            return Ok("No reminders configured. Try: remind 600519 30.".to_string());
        }
        let lines: Vec<String> = reminders
            .iter()
            .map(|(symbol, minutes)| format!("{symbol} every {minutes} min"))
            .collect();
        Ok(format!("Reminders:\n{}", lines.join("\n")))
    }

    async fn status(&self, ctx: &CommandContext) -> Result<String> {
        let Some(group) = self.service.group(&ctx.group_id).await? else {
            return Ok("No watchlist for this group yet".to_string());
        };
        Ok(format!(
            "Group {}\npush {}, daily subscription {}\nfollowing {} symbols, {} reminders\nlimit {} per {} min, {} user overrides",
            if group.group_name.is_empty() {
                group.group_id.clone()
            } else {
                group.group_name.clone()
            },
            if group.enabled { "on" } else { "off" },
            if group.subscribed { "on" } else { "off" },
            group.stocks.len(),
            group.active_intervals().len(),
            group.default_limit,
            group.window_minutes,
            group.user_limits.len(),
        ))
    }
}

fn usage_add() -> &'static str {
    "Usage: add 600519, or add sh600519 sz000001"
}

fn usage_remove() -> &'static str {
    "Usage: remove 600519, or remove sh600519 sz000001"
}

fn help_text() -> String {
    [
        "Watchlist commands:",
        "1) quote CODE - latest price for one symbol",
        "2) add CODE... - follow symbols",
        "3) remove CODE... - unfollow symbols",
        "4) list - followed symbols",
        "5) overview - market snapshot of the watchlist",
        "6) subscribe / unsubscribe - daily push at the configured time",
        "7) remind CODE MINUTES - interval reminder (0 turns it off)",
        "8) reminders - active interval reminders",
        "9) enable / disable - master push switch",
        "10) limit N, window N, userlimit USER N, userlimit-clear USER",
        "11) status - group settings summary",
    ]
    .join("\n")
}
