pub mod quote;
pub mod watchlist;

pub use quote::{IndexQuote, Snapshot, StockQuote};
pub use watchlist::{
    GroupWatchlist, WatchlistStore, CURRENT_VERSION, DEFAULT_LIMIT, DEFAULT_WINDOW_MINUTES,
};
