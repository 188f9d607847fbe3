//! Rebalance plans and per-symbol outcome reports.

use std::fmt;

use allocbot::{Basis, DeltaTable, Instruction, PositionDelta, Symbol, Usd, plan_totals};
use allocbot_broker::OrderReceipt;

/// What a rebalance would do, computed from one holdings snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalancePlan {
    pub basis: Basis,
    pub basis_value: f64,
    pub deltas: Vec<PositionDelta>,
    pub instructions: Vec<Instruction>,
}

impl RebalancePlan {
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Dollar totals (bought, sold).
    pub fn totals(&self) -> (f64, f64) {
        plan_totals(&self.instructions)
    }
}

impl fmt::Display for RebalancePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Basis: {} ({})", Usd(self.basis_value), self.basis)?;
        write!(f, "{}", DeltaTable(&self.deltas))?;
        if self.instructions.is_empty() {
            return writeln!(f, "\nNo orders needed.");
        }
        writeln!(f, "\nORDERS:")?;
        for (i, ins) in self.instructions.iter().enumerate() {
            writeln!(f, "  {:>3}  {ins}", i + 1)?;
        }
        let (buy, sell) = self.totals();
        writeln!(f, "\nBuy {} / Sell {}", Usd(buy), Usd(sell))
    }
}

/// How one order submission went.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    /// Accepted by the broker. Execution is not tracked.
    Placed(OrderReceipt),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolOutcome {
    pub instruction: Instruction,
    pub outcome: OrderOutcome,
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &Symbol {
        &self.instruction.symbol
    }

    pub fn is_placed(&self) -> bool {
        matches!(self.outcome, OrderOutcome::Placed(_))
    }
}

/// Overall result of a rebalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceStatus {
    /// Nothing to trade.
    NoChange,
    /// Every order was accepted.
    Success,
    /// Some orders failed, some were accepted.
    Partial,
    /// Every order failed.
    Failure,
}

impl fmt::Display for RebalanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceStatus::NoChange => write!(f, "no change"),
            RebalanceStatus::Success => write!(f, "success"),
            RebalanceStatus::Partial => write!(f, "partial"),
            RebalanceStatus::Failure => write!(f, "failure"),
        }
    }
}

/// Result of a rebalance: the plan plus one outcome per instruction, in plan order.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceReport {
    pub plan: RebalancePlan,
    pub outcomes: Vec<SymbolOutcome>,
}

impl RebalanceReport {
    pub fn status(&self) -> RebalanceStatus {
        let placed = self.placed().count();
        match (self.outcomes.len(), placed) {
            (0, _) => RebalanceStatus::NoChange,
            (n, p) if p == n => RebalanceStatus::Success,
            (_, 0) => RebalanceStatus::Failure,
            _ => RebalanceStatus::Partial,
        }
    }

    pub fn placed(&self) -> impl Iterator<Item = &SymbolOutcome> {
        self.outcomes.iter().filter(|o| o.is_placed())
    }

    pub fn failed(&self) -> impl Iterator<Item = &SymbolOutcome> {
        self.outcomes.iter().filter(|o| !o.is_placed())
    }

    pub fn outcome_for(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.outcomes.iter().find(|o| o.symbol().as_str() == symbol)
    }

    /// `true` for `NoChange` and `Success`.
    pub fn is_ok(&self) -> bool {
        matches!(
            self.status(),
            RebalanceStatus::NoChange | RebalanceStatus::Success
        )
    }
}

impl fmt::Display for RebalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Basis: {} ({})", Usd(self.plan.basis_value), self.plan.basis)?;
        if self.outcomes.is_empty() {
            return writeln!(f, "Portfolio is on target, no orders placed.");
        }
        for o in &self.outcomes {
            match &o.outcome {
                OrderOutcome::Placed(receipt) => {
                    writeln!(f, "  OK    {}  (order {}, {:?})", o.instruction, receipt.id, receipt.state)?
                }
                OrderOutcome::Failed(e) => writeln!(f, "  FAIL  {}  ({e})", o.instruction)?,
            }
        }
        writeln!(
            f,
            "{} placed, {} failed: {}",
            self.placed().count(),
            self.failed().count(),
            self.status()
        )
    }
}
