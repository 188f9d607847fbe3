//! allocbot-rebalancer: keeps a brokerage account at its target weights.
//!
//! Logs in with email, password and a TOTP code, reads holdings, computes
//! dollar deltas against the target weights with the `allocbot` engine and
//! places fractional market orders. Runs once from the CLI, or as an
//! interactive command loop with a daily scheduler on a background thread.

pub mod audit;
pub mod bot;
pub mod config;
pub mod credentials;
pub mod error;
pub mod repl;
pub mod report;
pub mod scheduler;
pub mod session;

pub use bot::{BotSettings, Rebalancer, SessionScope};
pub use error::{Error, Result};
pub use report::{RebalancePlan, RebalanceReport, RebalanceStatus};
pub use session::SessionOwner;
