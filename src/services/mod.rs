pub mod resolver;
pub mod watchlist;

pub use resolver::SymbolResolver;
pub use watchlist::{AddOutcome, RemoveOutcome, WatchlistService};
