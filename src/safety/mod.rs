pub mod rate_limiter;

pub use rate_limiter::{Admission, CommandKind, RateLimiter};
