//! Broker error types.

/// Errors that can occur during broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("order error: {0}")]
    Order(String),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("failed to parse broker response: {0}")]
    Parse(String),

    #[error("invalid TOTP seed: {0}")]
    TotpSeed(String),

    #[error("{0}")]
    Other(String),
}
