//! Symbol canonicalization
//!
//! The store only ever sees exchange-prefixed symbols. Bare six-digit
//! codes are disambiguated by probing both exchanges through the quote
//! seam and keeping whichever answers with data; anything unrecognizable
//! is dropped.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::adapters::QuoteFetcher;

const EXCHANGE_PREFIXES: [&str; 2] = ["sh", "sz"];

pub struct SymbolResolver {
    quotes: Arc<dyn QuoteFetcher>,
}

impl SymbolResolver {
    pub fn new(quotes: Arc<dyn QuoteFetcher>) -> Self {
        Self { quotes }
    }

    /// Canonicalize raw user input, deduplicated in first-seen order
    pub async fn resolve(&self, raw: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for code in raw {
            let code = code.trim();
            if code.is_empty() {
                continue;
            }
            let symbol = if code.starts_with("sh") || code.starts_with("sz") {
                Some(code.to_string())
            } else if is_bare_code(code) {
                self.probe(code).await
            } else {
                debug!(code, "unrecognized symbol input dropped");
                None
            };
            if let Some(symbol) = symbol {
                if seen.insert(symbol.clone()) {
                    resolved.push(symbol);
                }
            }
        }
        resolved
    }

    async fn probe(&self, code: &str) -> Option<String> {
        for prefix in EXCHANGE_PREFIXES {
            let candidate = format!("{prefix}{code}");
            match self.quotes.fetch_quote(&candidate).await {
                Ok(quote) if quote.has_data() => return Some(candidate),
                Ok(_) => {}
                Err(err) => debug!(candidate, %err, "exchange probe missed"),
            }
        }
        None
    }
}

fn is_bare_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}
