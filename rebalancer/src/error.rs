//! Error types for the rebalancer.

use std::path::PathBuf;

use allocbot::ValidationError;
use allocbot_broker::BrokerError;

use crate::session::SessionOwner;

/// All errors that can occur during rebalancer operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid target weights: {0}")]
    Validation(#[from] ValidationError),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("broker error: {0}")]
    Broker(BrokerError),

    #[error("no open brokerage session")]
    NotLoggedIn,

    #[error("session is owned by {owner}, not {requested}")]
    SessionOwner {
        owner: SessionOwner,
        requested: SessionOwner,
    },

    #[error("failed to start scheduler: {0}")]
    Scheduler(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BrokerError> for Error {
    fn from(e: BrokerError) -> Self {
        match e {
            BrokerError::Auth(msg) => Error::Authentication(msg),
            BrokerError::NotLoggedIn => Error::NotLoggedIn,
            other => Error::Broker(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
