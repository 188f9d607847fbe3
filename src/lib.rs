//! # allocbot
//!
//! Target-weight portfolio model and the rebalance delta engine used by the
//! `allocbot-rebalancer` bot.
//!
//! ## Features
//!
//! - **Validated target weights**: non-negative, no duplicates, total ≤ 1.0
//! - **Holdings snapshot**: per-symbol price, quantity, cost and equity
//! - **Delta engine**: `current − weight × basis`, rounded to 6 places
//! - **Dollar-denominated plans**: fractional buy/sell instructions gated by a
//!   minimum order size
//!
//! ## Quick Start
//!
//! ```
//! use allocbot::{compute_deltas, plan, Holding, Holdings, Side, Symbol, TargetWeights};
//!
//! let weights = TargetWeights::new([("QQQ", 0.6), ("AGG", 0.35), ("$$$", 0.05)]).unwrap();
//!
//! let holdings: Holdings = [(Symbol::new("QQQ"), Holding::new(500.0, 1.5, 450.0))]
//!     .into_iter()
//!     .collect();
//!
//! // $1,000 account: QQQ ideal $600 (holding $750), AGG ideal $350 (holding $0).
//! let deltas = compute_deltas(&weights, &holdings, 1000.0, "$$$");
//! let orders = plan(&deltas, 1.0);
//!
//! assert_eq!(orders.len(), 2);
//! assert_eq!(orders[0].side, Side::Sell);
//! assert_eq!(orders[0].amount, 150.0);
//! assert_eq!(orders[1].side, Side::Buy);
//! assert_eq!(orders[1].amount, 350.0);
//! ```
//!
//! ## Cash Placeholder
//!
//! A weight entry for a synthetic symbol (by default `$$$`) reserves part of
//! the account as cash. It counts toward the 1.0 total but never produces a
//! delta or an order.
//!
//! ## Basis
//!
//! | Basis | Denominator |
//! |-------|-------------|
//! | **AccountEquity** | Total account value (positions + cash) |
//! | **InvestedEquity** | Sum of equity over current holdings |

pub mod engine;
mod error;
pub mod holdings;
mod side;
mod types;
pub mod weights;

// Re-export public API
pub use engine::{
    DEFAULT_CASH_SYMBOL, DeltaTable, Instruction, PositionDelta, compute_deltas, plan, plan_totals,
};
pub use error::ValidationError;
pub use holdings::{AccountSummary, Basis, Holding, Holdings};
pub use side::Side;
pub use types::{Symbol, Usd, round_cents, round6};
pub use weights::{TargetWeights, WEIGHT_SUM_TOLERANCE};
