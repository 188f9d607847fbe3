//! Validation errors for target weight construction.

use crate::types::Symbol;

/// Errors returned when building [`TargetWeights`](crate::TargetWeights).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A weight was below zero.
    #[error("symbol ({symbol}) weight cannot be negative: {weight}")]
    NegativeWeight { symbol: Symbol, weight: f64 },

    /// A weight was NaN or infinite.
    #[error("symbol ({symbol}) weight is not a finite number")]
    NonFiniteWeight { symbol: Symbol },

    /// The same symbol appeared twice.
    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(Symbol),

    /// A blank symbol string.
    #[error("symbol must not be empty")]
    EmptySymbol,

    /// Weights add up to more than 1.0. `symbol` is the first symbol at
    /// which the running total passed 1.0.
    #[error("total portfolio weight cannot exceed 1.0: {total:.6} (exceeded at {symbol})")]
    WeightSumExceeded { symbol: Symbol, total: f64 },
}
