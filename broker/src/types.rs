//! Shared broker types: credentials, positions, accounts, dollar orders.

use std::fmt;

use allocbot::{Side, Symbol};
use zeroize::Zeroizing;

/// Login material for one authentication attempt.
///
/// `mfa_code` is a one-time code, valid for a single 30 second window.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Zeroizing<String>,
    pub mfa_code: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("mfa_code", &"******")
            .finish()
    }
}

/// Broker-level position. Dollar values, fractional quantities.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: f64,
    pub average_buy_price: f64,
    /// Last trade price.
    pub price: f64,
}

/// Account summary from the broker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Account {
    /// Positions plus cash.
    pub equity: f64,
    pub cash: f64,
    pub buying_power: f64,
}

/// How long a submitted order stays working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeInForce {
    /// Good for the trading day.
    #[default]
    Gfd,
    /// Good till cancelled.
    Gtc,
}

impl TimeInForce {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeInForce::Gfd => "gfd",
            TimeInForce::Gtc => "gtc",
        }
    }
}

impl std::str::FromStr for TimeInForce {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gfd" => Ok(TimeInForce::Gfd),
            "gtc" => Ok(TimeInForce::Gtc),
            other => Err(format!("unknown time in force: {other}")),
        }
    }
}

/// Market order for a dollar notional ("fractional by price").
#[derive(Debug, Clone, PartialEq)]
pub struct DollarOrder {
    pub symbol: Symbol,
    pub side: Side,
    /// Positive dollar amount, whole cents.
    pub amount: f64,
    pub time_in_force: TimeInForce,
    pub extended_hours: bool,
}

/// Opaque order ID returned by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of an order as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Queued,
    Confirmed,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Unknown,
}

impl OrderState {
    /// Map a broker status string (`"queued"`, `"filled"`, ...) to a state.
    pub fn parse(s: &str) -> Self {
        match s {
            "queued" | "unconfirmed" => OrderState::Queued,
            "confirmed" => OrderState::Confirmed,
            "partially_filled" => OrderState::PartiallyFilled,
            "filled" => OrderState::Filled,
            "cancelled" | "canceled" => OrderState::Cancelled,
            "rejected" | "failed" => OrderState::Rejected,
            _ => OrderState::Unknown,
        }
    }
}

/// What the broker said when an order was accepted.
///
/// Placement is fire-and-forget: this is the state at submission, not the fill.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderReceipt {
    pub id: OrderId,
    pub state: OrderState,
}
