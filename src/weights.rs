//! Target allocation weights and their validation.

use rustc_hash::FxHashSet;

use crate::error::ValidationError;
use crate::types::Symbol;

/// Float slack allowed on the weight total, so that e.g. six weights written
/// to four decimals still add up to "1.0".
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Validated mapping of symbol → target weight.
///
/// Insertion order is preserved; deltas and orders are produced in this
/// order. Invariants:
/// - every weight is finite and `>= 0.0`
/// - no symbol appears twice
/// - the weights sum to at most `1.0` (± [`WEIGHT_SUM_TOLERANCE`])
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TargetWeights {
    entries: Vec<(Symbol, f64)>,
}

impl TargetWeights {
    /// Validate and build target weights from `(symbol, weight)` pairs.
    ///
    /// Negative weights are reported before the total is considered, so a
    /// mapping with a negative entry always fails with
    /// [`ValidationError::NegativeWeight`]. The total is checked once over
    /// the whole set: whether it is accepted does not depend on input order.
    ///
    /// ```
    /// use allocbot::{TargetWeights, ValidationError};
    ///
    /// let weights = TargetWeights::new([("QQQ", 0.6), ("AGG", 0.35), ("$$$", 0.05)]).unwrap();
    /// assert_eq!(weights.len(), 3);
    ///
    /// let err = TargetWeights::new([("A", 0.5), ("B", 0.6)]).unwrap_err();
    /// assert!(matches!(err, ValidationError::WeightSumExceeded { .. }));
    /// ```
    pub fn new<I, S>(weights: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        let mut seen = FxHashSet::default();

        for (raw, weight) in weights {
            let symbol = Symbol::try_new(raw.as_ref()).ok_or(ValidationError::EmptySymbol)?;
            if !weight.is_finite() {
                return Err(ValidationError::NonFiniteWeight { symbol });
            }
            if !seen.insert(symbol.clone()) {
                return Err(ValidationError::DuplicateSymbol(symbol));
            }
            entries.push((symbol, weight));
        }

        if let Some((symbol, weight)) = entries.iter().find(|(_, w)| *w < 0.0) {
            return Err(ValidationError::NegativeWeight {
                symbol: symbol.clone(),
                weight: *weight,
            });
        }

        let total: f64 = entries.iter().map(|(_, w)| w).sum();
        if total > 1.0 + WEIGHT_SUM_TOLERANCE {
            let mut running = 0.0;
            let culprit = entries
                .iter()
                .find(|(_, w)| {
                    running += w;
                    running > 1.0 + WEIGHT_SUM_TOLERANCE
                })
                .or(entries.last())
                .map(|(s, _)| s.clone())
                .ok_or(ValidationError::EmptySymbol)?;
            return Err(ValidationError::WeightSumExceeded {
                symbol: culprit,
                total,
            });
        }

        Ok(Self { entries })
    }

    /// Weight for `symbol`, if it is a target.
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(s, _)| s.as_str() == symbol)
            .map(|(_, w)| *w)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.get(symbol).is_some()
    }

    /// `(symbol, weight)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, f64)> {
        self.entries.iter().map(|(s, w)| (s, *w))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter().map(|(s, _)| s)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all weights, cash placeholder included.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Copy of these weights with `symbol` removed (no-op if absent).
    pub fn without(&self, symbol: &str) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(s, _)| s.as_str() != symbol)
                .cloned()
                .collect(),
        }
    }

    /// Consume into the underlying ordered pairs.
    pub fn into_inner(self) -> Vec<(Symbol, f64)> {
        self.entries
    }
}
