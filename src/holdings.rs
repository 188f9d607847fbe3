//! Holdings snapshot, account summary, and the basis weights are applied to.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::types::{Symbol, Usd};

/// One held position as reported by the brokerage. All money values are dollars.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Holding {
    pub price: f64,
    /// Shares held; fractional shares allowed.
    pub quantity: f64,
    pub average_buy_price: f64,
    /// Current market value of the position.
    pub equity: f64,
    /// Unrealized gain/loss in dollars.
    pub equity_change: f64,
    /// Unrealized gain/loss in percent of cost.
    pub percent_change: f64,
}

impl Holding {
    /// Build a holding from price, quantity and cost; the derived fields are
    /// computed from those.
    pub fn new(price: f64, quantity: f64, average_buy_price: f64) -> Self {
        let equity = price * quantity;
        let cost = average_buy_price * quantity;
        let equity_change = equity - cost;
        let percent_change = if cost > 0.0 {
            equity_change / cost * 100.0
        } else {
            0.0
        };
        Self {
            price,
            quantity,
            average_buy_price,
            equity,
            equity_change,
            percent_change,
        }
    }
}

/// Read-only snapshot of current positions, keyed by symbol.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Holdings {
    positions: FxHashMap<Symbol, Holding>,
}

impl Holdings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the holding for `symbol`.
    pub fn insert(&mut self, symbol: Symbol, holding: Holding) {
        self.positions.insert(symbol, holding);
    }

    pub fn get(&self, symbol: &str) -> Option<&Holding> {
        self.positions.get(symbol)
    }

    /// Current equity for `symbol`; exactly `0.0` when the symbol is not held.
    pub fn equity_of(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |h| h.equity)
    }

    /// Sum of equity over all positions.
    pub fn invested_equity(&self) -> f64 {
        self.positions.values().map(|h| h.equity).sum()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions sorted by symbol, for stable display.
    pub fn sorted(&self) -> Vec<(&Symbol, &Holding)> {
        let mut rows: Vec<_> = self.positions.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }
}

impl FromIterator<(Symbol, Holding)> for Holdings {
    fn from_iter<T: IntoIterator<Item = (Symbol, Holding)>>(iter: T) -> Self {
        Self {
            positions: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Holdings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "No positions.");
        }
        writeln!(
            f,
            "  {:8} {:>12} {:>12} {:>12} {:>14} {:>9}",
            "Symbol", "Quantity", "Price", "Avg Cost", "Equity", "Return"
        )?;
        for (symbol, h) in self.sorted() {
            writeln!(
                f,
                "  {:8} {:>12.6} {:>12} {:>12} {:>14} {:>+8.2}%",
                symbol,
                h.quantity,
                Usd(h.price),
                Usd(h.average_buy_price),
                Usd(h.equity),
                h.percent_change,
            )?;
        }
        writeln!(f, "  {:8} {:>66}", "Total", Usd(self.invested_equity()))
    }
}

/// Account-level totals.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccountSummary {
    /// Total account value: positions plus cash.
    pub equity: f64,
    /// Uninvested cash.
    pub cash: f64,
}

/// Denominator the target weights are applied to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Basis {
    /// Total account equity, as reported in the account summary.
    #[default]
    AccountEquity,
    /// Sum of equity over current holdings (cash excluded).
    InvestedEquity,
}

impl Basis {
    /// Dollar value of this basis for the given snapshot.
    pub fn value(self, account: &AccountSummary, holdings: &Holdings) -> f64 {
        match self {
            Basis::AccountEquity => account.equity,
            Basis::InvestedEquity => holdings.invested_equity(),
        }
    }
}

impl fmt::Display for Basis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Basis::AccountEquity => write!(f, "account equity"),
            Basis::InvestedEquity => write!(f, "invested equity"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Holdings {
        [
            (Symbol::new("QQQ"), Holding::new(400.0, 2.5, 380.0)),
            (Symbol::new("AGG"), Holding::new(100.0, 10.0, 100.0)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn holding_derives_equity_and_returns() {
        let h = Holding::new(110.0, 2.0, 100.0);
        assert_eq!(h.equity, 220.0);
        assert_eq!(h.equity_change, 20.0);
        assert!((h.percent_change - 10.0).abs() < 1e-9);
    }

    #[test]
    fn zero_cost_has_zero_percent() {
        let h = Holding::new(10.0, 1.0, 0.0);
        assert_eq!(h.percent_change, 0.0);
    }

    #[test]
    fn absent_symbol_has_zero_equity() {
        let holdings = sample();
        assert_eq!(holdings.equity_of("BBIN"), 0.0);
        assert_eq!(holdings.equity_of("QQQ"), 1000.0);
    }

    #[test]
    fn invested_equity_sums_positions() {
        assert_eq!(sample().invested_equity(), 2000.0);
        assert_eq!(Holdings::new().invested_equity(), 0.0);
    }

    #[test]
    fn basis_values() {
        let account = AccountSummary {
            equity: 2500.0,
            cash: 500.0,
        };
        let holdings = sample();
        assert_eq!(Basis::AccountEquity.value(&account, &holdings), 2500.0);
        assert_eq!(Basis::InvestedEquity.value(&account, &holdings), 2000.0);
    }

    #[test]
    fn sorted_is_alphabetical() {
        let holdings = sample();
        let syms: Vec<&str> = holdings.sorted().iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(syms, vec!["AGG", "QQQ"]);
    }

    #[test]
    fn display_lists_positions() {
        let s = format!("{}", sample());
        assert!(s.contains("QQQ"));
        assert!(s.contains("$1,000.00"));
        assert!(s.contains("Total"));
        assert_eq!(format!("{}", Holdings::new()), "No positions.\n");
    }
}
