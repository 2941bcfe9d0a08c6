use thiserror::Error;

/// A raw trade row or market symbol that cannot be interpreted.
///
/// Not retryable: the input has to be fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("market {market} does not end in a known quote asset")]
    UnknownQuoteAsset { market: String },
    #[error("market {market} has an empty base asset")]
    EmptyBase { market: String },
    #[error("trade amount must be positive, got {0}")]
    NonPositiveAmount(String),
    #[error("trade price must be positive, got {0}")]
    NonPositivePrice(String),
    #[error("quote rate for {market} must be positive, got {rate}")]
    NonPositiveQuoteRate { market: String, rate: String },
}
