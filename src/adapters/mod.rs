pub mod messenger;
pub mod quotes;

pub use messenger::{ChatGateway, ChatTarget, WebhookGateway};
pub use quotes::{HttpQuoteProvider, QuoteFetcher};

#[cfg(test)]
pub use messenger::MockChatGateway;
#[cfg(test)]
pub use quotes::MockQuoteFetcher;
