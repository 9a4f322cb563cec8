pub mod adapters;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod safety;
pub mod scheduler;
pub mod services;

pub use adapters::{ChatGateway, ChatTarget, HttpQuoteProvider, QuoteFetcher, WebhookGateway};
pub use commands::{CommandContext, CommandHandler, WatchCommand};
pub use crate::config::AppConfig;
pub use domain::{GroupWatchlist, Snapshot, StockQuote, WatchlistStore};
pub use error::{Result, WatchError};
pub use persistence::WatchlistFile;
pub use safety::{Admission, CommandKind, RateLimiter};
pub use scheduler::{
    DailyPushConfig, DailyPushScheduler, IntervalPushConfig, IntervalPushScheduler,
};
pub use services::{SymbolResolver, WatchlistService};
