//! Inbound command variants
//!
//! The chat platform parses its keyword grammar into these variants
//! before calling the handler; no text parsing happens in the core.

use crate::safety::CommandKind;

/// One resolved inbound command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    /// Price lookup for one symbol or bare code
    Quote { code: String },
    /// Follow symbols
    Add { codes: Vec<String> },
    /// Unfollow symbols
    Remove { codes: Vec<String> },
    /// Show followed symbols
    List,
    /// Show a full market snapshot of the watchlist
    Overview,
    /// Opt in to the daily push
    Subscribe,
    /// Opt out of the daily push
    Unsubscribe,
    /// Master push switch on
    Enable,
    /// Master push switch off
    Disable,
    /// Set a per-symbol reminder cadence; zero minutes turns it off
    SetReminder { code: String, minutes: u32 },
    /// Show active reminders
    ListReminders,
    /// Set the group's default request limit
    SetDefaultLimit { limit: u32 },
    /// Set the group's sliding-window width
    SetWindow { minutes: u32 },
    /// Override one user's request limit
    SetUserLimit { user_id: String, limit: u32 },
    /// Drop one user's override
    ClearUserLimit { user_id: String },
    /// Group settings summary
    Status,
    /// Usage help
    Help,
}

impl WatchCommand {
    /// Classification used by the rate limiter's exemption rules
    pub fn kind(&self) -> CommandKind {
        match self {
            WatchCommand::Quote { .. } | WatchCommand::List | WatchCommand::ListReminders => {
                CommandKind::Query
            }
            WatchCommand::Overview => CommandKind::Overview,
            WatchCommand::Add { .. } | WatchCommand::Remove { .. } => CommandKind::Mutation,
            WatchCommand::Subscribe
            | WatchCommand::Unsubscribe
            | WatchCommand::Enable
            | WatchCommand::Disable => CommandKind::Subscription,
            WatchCommand::SetReminder { .. } => CommandKind::Reminder,
            WatchCommand::SetDefaultLimit { .. }
            | WatchCommand::SetWindow { .. }
            | WatchCommand::SetUserLimit { .. }
            | WatchCommand::ClearUserLimit { .. } => CommandKind::LimitAdmin,
            WatchCommand::Status => CommandKind::Status,
            WatchCommand::Help => CommandKind::Help,
        }
    }
}
