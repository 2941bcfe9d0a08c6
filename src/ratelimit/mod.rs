//! Token-bucket rate limiting for the budget-constrained exchange API.

pub mod token_bucket;

pub use token_bucket::{Denied, RateLimitError, RateLimiter};
