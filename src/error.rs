use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the top-up saga
#[derive(Error, Debug)]
pub enum TopupError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid base increment '{increment}': {reason}")]
    InvalidIncrement { increment: String, reason: String },

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Exchange API error: status={status} body={body}")]
    Exchange { status: u16, body: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid decimal '{value}' in {field}")]
    InvalidDecimal { field: String, value: String },

    // Market data errors
    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),

    // Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),

    // Business rules
    #[error("Insufficient funds: available {available} must exceed {required}")]
    InsufficientFunds { available: Decimal, required: Decimal },

    #[error("Order size {size} is below the minimum tradable size {minimum}")]
    OrderTooSmall { size: Decimal, minimum: Decimal },

    // Observability
    #[error("Metrics publish failed: {0}")]
    Metrics(String),

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for TopupError
pub type Result<T> = std::result::Result<T, TopupError>;

/// Coarse classification used by the saga to decide how an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing configuration, raised before any external call
    Configuration,
    /// An external call failed or returned something unusable
    Transport,
    /// The exchange state does not allow the workflow to continue
    BusinessRule,
    /// Metrics side channel, never escalated
    Observability,
    Internal,
}

impl TopupError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TopupError::Config(_)
            | TopupError::InvalidConfig(_)
            | TopupError::InvalidIncrement { .. } => ErrorKind::Configuration,
            TopupError::Http(_)
            | TopupError::Exchange { .. }
            | TopupError::RateLimited(_)
            | TopupError::Json(_)
            | TopupError::InvalidDecimal { .. }
            | TopupError::InvalidMarketData(_)
            | TopupError::Auth(_) => ErrorKind::Transport,
            TopupError::InsufficientFunds { .. } | TopupError::OrderTooSmall { .. } => {
                ErrorKind::BusinessRule
            }
            TopupError::Metrics(_) => ErrorKind::Observability,
            TopupError::InvalidStateTransition { .. }
            | TopupError::Validation(_)
            | TopupError::Io(_)
            | TopupError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether a failed side-effecting call may still have taken effect on the exchange.
    ///
    /// Errors raised before a request leaves the process (credentials, request
    /// validation) cannot have moved money.
    pub fn may_have_taken_effect(&self) -> bool {
        matches!(
            self,
            TopupError::Http(_)
                | TopupError::Exchange { .. }
                | TopupError::RateLimited(_)
                | TopupError::Json(_)
                | TopupError::InvalidDecimal { .. }
        )
    }

    pub fn is_business_rule(&self) -> bool {
        self.kind() == ErrorKind::BusinessRule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn business_rule_errors_are_classified() {
        let err = TopupError::OrderTooSmall {
            size: dec!(0.0005),
            minimum: dec!(0.001),
        };
        assert_eq!(err.kind(), ErrorKind::BusinessRule);
        assert!(err.is_business_rule());
        assert!(err.to_string().contains("0.0005"));
    }

    #[test]
    fn auth_errors_never_take_effect() {
        let err = TopupError::Auth("COINBASE_PRO_KEY is required".to_string());
        assert!(!err.may_have_taken_effect());
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn exchange_errors_may_have_taken_effect() {
        let err = TopupError::Exchange {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert!(err.may_have_taken_effect());
    }
}
