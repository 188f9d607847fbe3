//! Robinhood-specific API response types.
//!
//! Robinhood returns decimals as JSON strings; these are kept as strings
//! here and parsed by the caller.

use serde::{Deserialize, Serialize};

/// OAuth token response (POST /oauth2/token/).
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub mfa_required: Option<bool>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// A page of results with an optional link to the next page.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Position entry (GET /positions/).
#[derive(Debug, Deserialize)]
pub struct PositionInfo {
    /// URL of the instrument resource.
    pub instrument: String,
    pub quantity: String,
    pub average_buy_price: String,
}

/// Instrument resource.
#[derive(Debug, Deserialize)]
pub struct Instrument {
    pub url: String,
    pub symbol: String,
    #[serde(default)]
    pub tradeable: bool,
}

/// Quote entry (GET /quotes/?symbols=...).
#[derive(Debug, Deserialize)]
pub struct QuoteInfo {
    pub symbol: String,
    pub last_trade_price: String,
    #[serde(default)]
    pub last_extended_hours_trade_price: Option<String>,
}

/// Account entry (GET /accounts/).
#[derive(Debug, Deserialize)]
pub struct AccountInfo {
    pub url: String,
    pub cash: String,
    pub buying_power: String,
}

/// Portfolio entry (GET /portfolios/).
#[derive(Debug, Deserialize)]
pub struct PortfolioInfo {
    pub equity: String,
    #[serde(default)]
    pub extended_hours_equity: Option<String>,
}

/// Dollar amount block of a fractional order.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DollarAmount {
    pub amount: String,
    pub currency_code: String,
}

/// Fractional market order payload (POST /orders/).
#[derive(Debug, Serialize, PartialEq)]
pub struct OrderRequest {
    pub account: String,
    pub instrument: String,
    pub symbol: String,
    pub side: &'static str,
    #[serde(rename = "type")]
    pub order_type: &'static str,
    pub trigger: &'static str,
    pub time_in_force: &'static str,
    pub extended_hours: bool,
    pub market_hours: &'static str,
    /// Reference price the quantity was computed from.
    pub price: String,
    pub quantity: String,
    pub dollar_based_amount: DollarAmount,
    pub ref_id: String,
}

/// Order response.
#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub state: String,
    #[serde(default)]
    pub reject_reason: Option<String>,
}
