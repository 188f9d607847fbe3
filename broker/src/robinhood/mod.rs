//! Robinhood broker implementation.

pub mod client;
pub mod types;

use std::sync::Mutex;
use std::time::Duration;

use allocbot::{Side, Symbol, round6};
use log::debug;
use rustc_hash::FxHashMap;

use crate::Brokerage;
use crate::error::BrokerError;
use crate::types::*;
use client::RobinhoodClient;
use types::{DollarAmount, OrderRequest, PositionInfo, QuoteInfo};

/// Connection settings for [`RobinhoodBroker`].
#[derive(Debug, Clone)]
pub struct RobinhoodConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Stable per-install device id; a random one is generated when `None`.
    pub device_token: Option<String>,
}

impl Default for RobinhoodConfig {
    fn default() -> Self {
        Self {
            base_url: client::DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            device_token: None,
        }
    }
}

/// Robinhood account implementing the generic Brokerage trait.
///
/// Uses the REST API for all operations. Blocking (sync) via reqwest::blocking.
pub struct RobinhoodBroker {
    client: RobinhoodClient,
    /// Instrument URL → symbol, filled lazily.
    instruments: Mutex<FxHashMap<String, Symbol>>,
}

impl RobinhoodBroker {
    /// Create a broker handle (not yet logged in).
    pub fn new(config: &RobinhoodConfig) -> Result<Self, BrokerError> {
        let device_token = config
            .device_token
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Ok(Self {
            client: RobinhoodClient::new(&config.base_url, config.timeout, &device_token)?,
            instruments: Mutex::new(FxHashMap::default()),
        })
    }

    fn require_session(&self) -> Result<&RobinhoodClient, BrokerError> {
        if self.client.has_token() {
            Ok(&self.client)
        } else {
            Err(BrokerError::NotLoggedIn)
        }
    }

    fn symbol_for(&self, instrument_url: &str) -> Result<Symbol, BrokerError> {
        let mut cache = self.instruments.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sym) = cache.get(instrument_url) {
            return Ok(sym.clone());
        }
        let instrument = self.require_session()?.instrument(instrument_url)?;
        let sym = Symbol::try_new(&instrument.symbol)
            .ok_or_else(|| BrokerError::Parse(format!("blank symbol for {instrument_url}")))?;
        cache.insert(instrument_url.to_string(), sym.clone());
        Ok(sym)
    }
}

impl Brokerage for RobinhoodBroker {
    fn login(&mut self, credentials: &Credentials) -> Result<(), BrokerError> {
        self.client.login(
            &credentials.username,
            credentials.password.as_str(),
            &credentials.mfa_code,
        )
    }

    fn logout(&mut self) -> Result<(), BrokerError> {
        self.client.logout()
    }

    fn is_logged_in(&self) -> bool {
        self.client.has_token()
    }

    fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        let client = self.require_session()?;
        let raw = client.positions()?;

        let mut symbols = Vec::with_capacity(raw.len());
        for info in &raw {
            symbols.push(self.symbol_for(&info.instrument)?);
        }

        let tickers: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
        let quotes = client.quotes(&tickers)?;
        let prices = quote_prices(&quotes)?;

        raw.iter()
            .zip(symbols)
            .map(|(info, symbol)| {
                let price = quoted_price(&prices, &symbol)?;
                to_position(info, symbol, price)
            })
            .collect()
    }

    fn account(&self) -> Result<Account, BrokerError> {
        let client = self.require_session()?;
        let account = client.account()?;
        let portfolio = client.portfolio()?;

        let equity = match portfolio.extended_hours_equity.as_deref() {
            Some(s) if !s.is_empty() => parse_decimal(s, "extended_hours_equity")?,
            _ => parse_decimal(&portfolio.equity, "equity")?,
        };

        Ok(Account {
            equity,
            cash: parse_decimal(&account.cash, "cash")?,
            buying_power: parse_decimal(&account.buying_power, "buying_power")?,
        })
    }

    fn submit_dollar_order(&self, order: &DollarOrder) -> Result<OrderReceipt, BrokerError> {
        let client = self.require_session()?;
        let account = client.account()?;
        let instrument = client.instrument_by_symbol(order.symbol.as_str())?;
        let quotes = client.quotes(&[order.symbol.as_str()])?;
        let price = quote_prices(&quotes)?
            .get(order.symbol.as_str())
            .copied()
            .filter(|p| *p > 0.0)
            .ok_or_else(|| BrokerError::InvalidSymbol(order.symbol.to_string()))?;

        let request = build_order_request(
            order,
            &account.url,
            &instrument.url,
            price,
            uuid::Uuid::new_v4().to_string(),
        );
        let resp = client.submit_order(&request)?;
        debug!("Robinhood order {} is {}", resp.id, resp.state);

        let state = OrderState::parse(&resp.state);
        if state == OrderState::Rejected {
            let reason = resp.reject_reason.unwrap_or_else(|| "no reason given".into());
            return Err(BrokerError::Order(format!(
                "order for {} rejected: {reason}",
                order.symbol
            )));
        }

        Ok(OrderReceipt {
            id: OrderId(resp.id),
            state,
        })
    }
}

/// Parse a decimal string field (e.g., `"185.5000"` → 185.5).
pub fn parse_decimal(s: &str, field: &str) -> Result<f64, BrokerError> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| BrokerError::Parse(format!("{field}: not a number: {s:?}")))
}

/// Symbol → price map, preferring the extended-hours print when present.
pub fn quote_prices(quotes: &[QuoteInfo]) -> Result<FxHashMap<String, f64>, BrokerError> {
    quotes
        .iter()
        .map(|q| {
            let raw = match q.last_extended_hours_trade_price.as_deref() {
                Some(s) if !s.is_empty() => s,
                _ => q.last_trade_price.as_str(),
            };
            Ok((q.symbol.to_ascii_uppercase(), parse_decimal(raw, "last_trade_price")?))
        })
        .collect()
}

/// Price of a held symbol. A holding without a quote cannot be valued, so
/// the whole snapshot is rejected.
pub fn quoted_price(prices: &FxHashMap<String, f64>, symbol: &Symbol) -> Result<f64, BrokerError> {
    prices
        .get(symbol.as_str())
        .copied()
        .ok_or_else(|| BrokerError::Parse(format!("no quote returned for held symbol {symbol}")))
}

/// Convert a raw position entry into the broker-level type.
pub fn to_position(info: &PositionInfo, symbol: Symbol, price: f64) -> Result<Position, BrokerError> {
    Ok(Position {
        symbol,
        quantity: parse_decimal(&info.quantity, "quantity")?,
        average_buy_price: parse_decimal(&info.average_buy_price, "average_buy_price")?,
        price,
    })
}

/// Build the fractional market order payload for a dollar order.
pub fn build_order_request(
    order: &DollarOrder,
    account_url: &str,
    instrument_url: &str,
    price: f64,
    ref_id: String,
) -> OrderRequest {
    OrderRequest {
        account: account_url.to_string(),
        instrument: instrument_url.to_string(),
        symbol: order.symbol.as_str().to_string(),
        side: match order.side {
            Side::Buy => "buy",
            Side::Sell => "sell",
        },
        order_type: "market",
        trigger: "immediate",
        time_in_force: order.time_in_force.as_str(),
        extended_hours: order.extended_hours,
        market_hours: if order.extended_hours {
            "extended_hours"
        } else {
            "regular_hours"
        },
        price: format!("{price:.2}"),
        quantity: format!("{:.6}", round6(order.amount / price)),
        dollar_based_amount: DollarAmount {
            amount: format!("{:.2}", order.amount),
            currency_code: "USD".to_string(),
        },
        ref_id,
    }
}
