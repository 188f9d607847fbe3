//! Brokerage trait and implementations for allocbot.
//!
//! Provides a generic `Brokerage` trait that abstracts over the three
//! capabilities the rebalancer consumes: authentication, holdings reads, and
//! dollar-denominated order placement. Implementations:
//!
//! - **Mock** (always available): in-memory broker for tests and dry runs
//! - **Robinhood** (feature `robinhood`): Robinhood REST API, blocking

pub mod error;
pub mod mock;
pub mod totp;
pub mod types;

#[cfg(feature = "robinhood")]
pub mod robinhood;

pub use error::BrokerError;
pub use types::*;

/// A brokerage account the bot can log into, read, and trade.
///
/// Implementations are blocking. Callers serialize access; `&mut self` is
/// only needed to change session state.
pub trait Brokerage {
    /// Exchange credentials (with a fresh one-time code) for a session.
    fn login(&mut self, credentials: &Credentials) -> Result<(), BrokerError>;

    /// End the session. Calling this without a session is not an error.
    fn logout(&mut self) -> Result<(), BrokerError>;

    /// True while a session is open.
    fn is_logged_in(&self) -> bool;

    /// Get all current non-zero positions.
    fn positions(&self) -> Result<Vec<Position>, BrokerError>;

    /// Get account totals (equity, cash).
    fn account(&self) -> Result<Account, BrokerError>;

    /// Place a market order for a dollar notional. Fire-and-forget: the
    /// receipt reflects acceptance, not execution.
    fn submit_dollar_order(&self, order: &DollarOrder) -> Result<OrderReceipt, BrokerError>;
}

impl<B: Brokerage + ?Sized> Brokerage for Box<B> {
    fn login(&mut self, credentials: &Credentials) -> Result<(), BrokerError> {
        (**self).login(credentials)
    }

    fn logout(&mut self) -> Result<(), BrokerError> {
        (**self).logout()
    }

    fn is_logged_in(&self) -> bool {
        (**self).is_logged_in()
    }

    fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        (**self).positions()
    }

    fn account(&self) -> Result<Account, BrokerError> {
        (**self).account()
    }

    fn submit_dollar_order(&self, order: &DollarOrder) -> Result<OrderReceipt, BrokerError> {
        (**self).submit_dollar_order(order)
    }
}
