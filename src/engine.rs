//! CURRENT→TARGET delta engine.
//!
//! Computes, for every target symbol, how far its current dollar value is
//! from the ideal `weight × basis`, and turns those deltas into
//! dollar-denominated buy/sell instructions.

use std::fmt;

use crate::holdings::Holdings;
use crate::side::Side;
use crate::types::{Symbol, Usd, round_cents, round6};
use crate::weights::TargetWeights;

/// Cash placeholder used when none is configured.
pub const DEFAULT_CASH_SYMBOL: &str = "$$$";

/// How far one target symbol is from its ideal allocation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionDelta {
    pub symbol: Symbol,
    pub weight: f64,
    /// Current equity (0 when not held).
    pub current: f64,
    /// `weight × basis`.
    pub ideal: f64,
    /// `round(current − ideal, 6)`. Negative = underweight.
    pub delta: f64,
}

impl PositionDelta {
    /// Side that closes the gap, or `None` when already on target.
    pub fn side(&self) -> Option<Side> {
        Side::for_delta(self.delta)
    }
}

/// A dollar-denominated order the bot intends to place.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    pub symbol: Symbol,
    pub side: Side,
    /// Positive notional in dollars, rounded to cents.
    pub amount: f64,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} of {}", self.side, Usd(self.amount), self.symbol)
    }
}

/// Compute deltas for every target symbol in weight order.
///
/// `cash_symbol` is skipped entirely; it is normalized the same way
/// [`Symbol`] is, so `"cash"` matches a `CASH` weight. Symbols absent from `holdings` count
/// as exactly zero current equity.
///
/// ```
/// use allocbot::{compute_deltas, Holding, Holdings, Symbol, TargetWeights};
///
/// let weights = TargetWeights::new([("A", 0.6), ("B", 0.4)]).unwrap();
/// let holdings: Holdings = [(Symbol::new("A"), Holding::new(50.0, 10.0, 50.0))]
///     .into_iter()
///     .collect();
///
/// let deltas = compute_deltas(&weights, &holdings, 1000.0, "$$$");
/// assert_eq!(deltas[0].delta, -100.0);
/// assert_eq!(deltas[1].delta, -400.0);
/// ```
pub fn compute_deltas(
    weights: &TargetWeights,
    holdings: &Holdings,
    basis: f64,
    cash_symbol: &str,
) -> Vec<PositionDelta> {
    let cash = Symbol::try_new(cash_symbol);
    weights
        .iter()
        .filter(|(symbol, _)| Some(*symbol) != cash.as_ref())
        .map(|(symbol, weight)| {
            let current = holdings.equity_of(symbol.as_str());
            let ideal = weight * basis;
            PositionDelta {
                symbol: symbol.clone(),
                weight,
                current,
                ideal,
                delta: round6(current - ideal),
            }
        })
        .collect()
}

/// Turn deltas into instructions.
///
/// Deltas whose magnitude is below `min_order` (the brokerage's fractional
/// order minimum) produce nothing, as does an exact zero delta.
pub fn plan(deltas: &[PositionDelta], min_order: f64) -> Vec<Instruction> {
    deltas
        .iter()
        .filter_map(|d| {
            let side = d.side()?;
            let amount = d.delta.abs();
            if amount < min_order {
                return None;
            }
            Some(Instruction {
                symbol: d.symbol.clone(),
                side,
                amount: round_cents(amount),
            })
        })
        .collect()
}

/// Dollar totals of a plan: (bought, sold).
pub fn plan_totals(instructions: &[Instruction]) -> (f64, f64) {
    instructions
        .iter()
        .fold((0.0, 0.0), |(buy, sell), i| match i.side {
            Side::Buy => (buy + i.amount, sell),
            Side::Sell => (buy, sell + i.amount),
        })
}

/// Printable delta table.
pub struct DeltaTable<'a>(pub &'a [PositionDelta]);

impl fmt::Display for DeltaTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {:8} {:>8} {:>14} {:>14} {:>14}",
            "Symbol", "Weight", "Current", "Ideal", "Delta"
        )?;
        for d in self.0 {
            writeln!(
                f,
                "  {:8} {:>7.2}% {:>14} {:>14} {:>14}",
                d.symbol,
                d.weight * 100.0,
                Usd(d.current),
                Usd(d.ideal),
                Usd(d.delta),
            )?;
        }
        Ok(())
    }
}
