//! Mock broker for testing. Implements the `Brokerage` trait with configurable behavior.
//!
//! Clones share state, so a test can hand one clone to the bot and keep
//! another to assert on what happened.
//!
//! ```
//! use allocbot::Symbol;
//! use allocbot_broker::mock::{FillMode, MockBroker};
//!
//! let broker = MockBroker::builder()
//!     .fill_mode(FillMode::Immediate)
//!     .with_position(Symbol::new("QQQ"), 2.0, 380.0, 400.0)
//!     .with_cash(1_000.0)
//!     .build();
//! let observer = broker.clone();
//! assert_eq!(observer.login_count(), 0);
//! ```

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use allocbot::{Side, Symbol};

use crate::error::BrokerError;
use crate::types::*;
use crate::Brokerage;

/// How the mock broker handles submitted orders.
#[derive(Clone, Debug, PartialEq)]
pub enum FillMode {
    /// Orders fill at once at the position's price; positions and cash move.
    Immediate,
    /// Orders are accepted and left queued; nothing moves.
    Queued,
    /// All orders are rejected.
    Reject,
}

/// Every call the mock received, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum MockEvent {
    Login,
    Logout,
    Positions,
    Account,
    Order(Symbol),
}

/// Builder for `MockBroker`.
pub struct MockBrokerBuilder {
    fill_mode: FillMode,
    positions: Vec<Position>,
    prices: Vec<(Symbol, f64)>,
    cash: f64,
    fail_login: bool,
    rejected: Vec<Symbol>,
    order_delay: Duration,
}

impl MockBrokerBuilder {
    pub fn fill_mode(mut self, mode: FillMode) -> Self {
        self.fill_mode = mode;
        self
    }

    pub fn with_position(
        mut self,
        symbol: Symbol,
        quantity: f64,
        average_buy_price: f64,
        price: f64,
    ) -> Self {
        self.positions.push(Position {
            symbol,
            quantity,
            average_buy_price,
            price,
        });
        self
    }

    /// Quote for a symbol not currently held (used to fill buys).
    pub fn with_price(mut self, symbol: Symbol, price: f64) -> Self {
        self.prices.push((symbol, price));
        self
    }

    pub fn with_cash(mut self, cash: f64) -> Self {
        self.cash = cash;
        self
    }

    /// Every login attempt fails with `BrokerError::Auth`.
    pub fn fail_login(mut self) -> Self {
        self.fail_login = true;
        self
    }

    /// Orders for `symbol` fail with `BrokerError::Order`.
    pub fn reject_symbol(mut self, symbol: Symbol) -> Self {
        self.rejected.push(symbol);
        self
    }

    /// Sleep this long inside every order submission.
    pub fn order_delay(mut self, delay: Duration) -> Self {
        self.order_delay = delay;
        self
    }

    pub fn build(self) -> MockBroker {
        MockBroker {
            state: Arc::new(Mutex::new(MockState {
                logged_in: false,
                fill_mode: self.fill_mode,
                positions: self.positions,
                prices: self.prices,
                cash: self.cash,
                fail_login: self.fail_login,
                rejected: self.rejected,
                order_delay: self.order_delay,
                next_order_id: 1,
                submitted: Vec::new(),
                events: Vec::new(),
                logins: 0,
                logouts: 0,
                last_credentials: None,
            })),
        }
    }
}

struct MockState {
    logged_in: bool,
    fill_mode: FillMode,
    positions: Vec<Position>,
    prices: Vec<(Symbol, f64)>,
    cash: f64,
    fail_login: bool,
    rejected: Vec<Symbol>,
    order_delay: Duration,
    next_order_id: u64,
    submitted: Vec<DollarOrder>,
    events: Vec<MockEvent>,
    logins: usize,
    logouts: usize,
    last_credentials: Option<(String, String)>,
}

impl MockState {
    fn price_of(&self, symbol: &Symbol) -> Option<f64> {
        self.positions
            .iter()
            .find(|p| &p.symbol == symbol)
            .map(|p| p.price)
            .or_else(|| {
                self.prices
                    .iter()
                    .find(|(s, _)| s == symbol)
                    .map(|(_, p)| *p)
            })
    }

    fn apply_fill(&mut self, order: &DollarOrder) -> Result<(), BrokerError> {
        let price = self
            .price_of(&order.symbol)
            .filter(|p| *p > 0.0)
            .ok_or_else(|| BrokerError::InvalidSymbol(order.symbol.to_string()))?;
        let qty = order.amount / price;
        let signed = match order.side {
            Side::Buy => qty,
            Side::Sell => -qty,
        };

        match self.positions.iter().position(|p| p.symbol == order.symbol) {
            Some(i) => {
                let pos = &mut self.positions[i];
                if order.side == Side::Sell && qty > pos.quantity + 1e-9 {
                    return Err(BrokerError::Order(format!(
                        "mock: cannot sell {qty:.6} {}, holding {:.6}",
                        order.symbol, pos.quantity
                    )));
                }
                if order.side == Side::Buy {
                    let cost = pos.average_buy_price * pos.quantity + order.amount;
                    pos.average_buy_price = cost / (pos.quantity + qty);
                }
                pos.quantity += signed;
            }
            None if order.side == Side::Buy => self.positions.push(Position {
                symbol: order.symbol.clone(),
                quantity: qty,
                average_buy_price: price,
                price,
            }),
            None => {
                return Err(BrokerError::Order(format!(
                    "mock: no position in {} to sell",
                    order.symbol
                )));
            }
        }
        self.positions.retain(|p| p.quantity > 1e-9);
        self.cash -= match order.side {
            Side::Buy => order.amount,
            Side::Sell => -order.amount,
        };
        Ok(())
    }
}

/// A mock broker that records calls and returns configurable responses.
#[derive(Clone)]
pub struct MockBroker {
    state: Arc<Mutex<MockState>>,
}

impl MockBroker {
    pub fn builder() -> MockBrokerBuilder {
        MockBrokerBuilder {
            fill_mode: FillMode::Immediate,
            positions: Vec::new(),
            prices: Vec::new(),
            cash: 0.0,
            fail_login: false,
            rejected: Vec::new(),
            order_delay: Duration::ZERO,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All orders that were submitted, accepted or not.
    pub fn submitted_orders(&self) -> Vec<DollarOrder> {
        self.lock().submitted.clone()
    }

    /// Every call received so far.
    pub fn events(&self) -> Vec<MockEvent> {
        self.lock().events.clone()
    }

    pub fn login_count(&self) -> usize {
        self.lock().logins
    }

    pub fn logout_count(&self) -> usize {
        self.lock().logouts
    }

    /// `(username, mfa_code)` from the most recent login attempt.
    pub fn last_credentials(&self) -> Option<(String, String)> {
        self.lock().last_credentials.clone()
    }

    pub fn cash(&self) -> f64 {
        self.lock().cash
    }

    /// Invalidate the current login as if its token had lapsed. Later calls
    /// fail with `NotLoggedIn` until the next login.
    pub fn expire_session(&self) {
        self.lock().logged_in = false;
    }
}

impl Brokerage for MockBroker {
    fn login(&mut self, credentials: &Credentials) -> Result<(), BrokerError> {
        let mut s = self.lock();
        s.events.push(MockEvent::Login);
        s.last_credentials = Some((credentials.username.clone(), credentials.mfa_code.clone()));
        if s.fail_login {
            return Err(BrokerError::Auth("mock: invalid credentials".into()));
        }
        s.logins += 1;
        s.logged_in = true;
        Ok(())
    }

    fn logout(&mut self) -> Result<(), BrokerError> {
        let mut s = self.lock();
        s.events.push(MockEvent::Logout);
        if s.logged_in {
            s.logouts += 1;
            s.logged_in = false;
        }
        Ok(())
    }

    fn is_logged_in(&self) -> bool {
        self.lock().logged_in
    }

    fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        let mut s = self.lock();
        s.events.push(MockEvent::Positions);
        if !s.logged_in {
            return Err(BrokerError::NotLoggedIn);
        }
        Ok(s.positions.clone())
    }

    fn account(&self) -> Result<Account, BrokerError> {
        let mut s = self.lock();
        s.events.push(MockEvent::Account);
        if !s.logged_in {
            return Err(BrokerError::NotLoggedIn);
        }
        let invested: f64 = s.positions.iter().map(|p| p.quantity * p.price).sum();
        Ok(Account {
            equity: invested + s.cash,
            cash: s.cash,
            buying_power: s.cash,
        })
    }

    fn submit_dollar_order(&self, order: &DollarOrder) -> Result<OrderReceipt, BrokerError> {
        let delay = {
            let mut s = self.lock();
            s.events.push(MockEvent::Order(order.symbol.clone()));
            if !s.logged_in {
                return Err(BrokerError::NotLoggedIn);
            }
            s.submitted.push(order.clone());
            s.order_delay
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut s = self.lock();
        if s.rejected.contains(&order.symbol) {
            return Err(BrokerError::Order(format!(
                "mock: order for {} rejected",
                order.symbol
            )));
        }

        let mode = s.fill_mode.clone();
        let state = match mode {
            FillMode::Reject => return Err(BrokerError::Order("mock: order rejected".into())),
            FillMode::Queued => OrderState::Queued,
            FillMode::Immediate => {
                s.apply_fill(order)?;
                OrderState::Filled
            }
        };

        let id = OrderId(format!("mock-{}", s.next_order_id));
        s.next_order_id += 1;
        Ok(OrderReceipt { id, state })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeroize::Zeroizing;

    fn qqq() -> Symbol {
        Symbol::new("QQQ")
    }

    fn creds() -> Credentials {
        Credentials {
            username: "me@example.com".into(),
            password: Zeroizing::new("pw".into()),
            mfa_code: "123456".into(),
        }
    }

    fn buy(symbol: Symbol, amount: f64) -> DollarOrder {
        DollarOrder {
            symbol,
            side: Side::Buy,
            amount,
            time_in_force: TimeInForce::Gfd,
            extended_hours: true,
        }
    }

    #[test]
    fn builder_basic() {
        let mut broker = MockBroker::builder()
            .with_position(qqq(), 2.0, 380.0, 400.0)
            .with_cash(200.0)
            .build();

        broker.login(&creds()).unwrap();

        let positions = broker.positions().unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].symbol, qqq());

        let account = broker.account().unwrap();
        assert_eq!(account.equity, 1000.0);
        assert_eq!(account.cash, 200.0);
    }

    #[test]
    fn not_logged_in_errors() {
        let broker = MockBroker::builder().build();
        assert!(matches!(broker.positions(), Err(BrokerError::NotLoggedIn)));
        assert!(broker.account().is_err());
        assert!(broker.submit_dollar_order(&buy(qqq(), 10.0)).is_err());
    }

    #[test]
    fn login_failure() {
        let mut broker = MockBroker::builder().fail_login().build();
        assert!(matches!(broker.login(&creds()), Err(BrokerError::Auth(_))));
        assert!(!broker.is_logged_in());
        assert_eq!(broker.login_count(), 0);
        assert_eq!(
            broker.last_credentials(),
            Some(("me@example.com".into(), "123456".into()))
        );
    }

    #[test]
    fn clones_share_state() {
        let mut broker = MockBroker::builder().build();
        let observer = broker.clone();
        broker.login(&creds()).unwrap();
        broker.logout().unwrap();
        broker.logout().unwrap();
        assert_eq!(observer.login_count(), 1);
        assert_eq!(observer.logout_count(), 1);
        assert_eq!(
            observer.events(),
            vec![MockEvent::Login, MockEvent::Logout, MockEvent::Logout]
        );
    }

    #[test]
    fn immediate_fill_moves_position_and_cash() {
        let mut broker = MockBroker::builder()
            .with_position(qqq(), 1.0, 400.0, 400.0)
            .with_cash(1000.0)
            .build();
        broker.login(&creds()).unwrap();

        let receipt = broker.submit_dollar_order(&buy(qqq(), 200.0)).unwrap();
        assert_eq!(receipt.state, OrderState::Filled);
        assert_eq!(receipt.id, OrderId("mock-1".into()));

        let pos = &broker.positions().unwrap()[0];
        assert!((pos.quantity - 1.5).abs() < 1e-12);
        assert_eq!(broker.cash(), 800.0);
        assert_eq!(broker.account().unwrap().equity, 1400.0);
    }

    #[test]
    fn buy_new_symbol_needs_price() {
        let agg = Symbol::new("AGG");
        let mut broker = MockBroker::builder()
            .with_price(agg.clone(), 100.0)
            .with_cash(500.0)
            .build();
        broker.login(&creds()).unwrap();

        broker.submit_dollar_order(&buy(agg.clone(), 250.0)).unwrap();
        let positions = broker.positions().unwrap();
        assert_eq!(positions[0].symbol, agg);
        assert_eq!(positions[0].quantity, 2.5);

        assert!(matches!(
            broker.submit_dollar_order(&buy(Symbol::new("ZZZ"), 10.0)),
            Err(BrokerError::InvalidSymbol(_))
        ));
    }

    #[test]
    fn sell_closes_position() {
        let mut broker = MockBroker::builder()
            .with_position(qqq(), 1.0, 400.0, 400.0)
            .build();
        broker.login(&creds()).unwrap();

        let sell = DollarOrder {
            side: Side::Sell,
            ..buy(qqq(), 400.0)
        };
        broker.submit_dollar_order(&sell).unwrap();
        assert!(broker.positions().unwrap().is_empty());
        assert_eq!(broker.cash(), 400.0);
    }

    #[test]
    fn reject_mode_and_rejected_symbol() {
        let mut broker = MockBroker::builder()
            .fill_mode(FillMode::Reject)
            .build();
        broker.login(&creds()).unwrap();
        assert!(broker.submit_dollar_order(&buy(qqq(), 10.0)).is_err());
        assert_eq!(broker.submitted_orders().len(), 1);

        let mut broker = MockBroker::builder()
            .fill_mode(FillMode::Queued)
            .reject_symbol(qqq())
            .build();
        broker.login(&creds()).unwrap();
        assert!(broker.submit_dollar_order(&buy(qqq(), 10.0)).is_err());
        let agg = broker
            .submit_dollar_order(&buy(Symbol::new("AGG"), 10.0))
            .unwrap();
        assert_eq!(agg.state, OrderState::Queued);
    }
}
