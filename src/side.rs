//! Trade direction: Buy or Sell

use std::fmt;

/// Direction of a rebalance instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Side that moves a position with the given delta back toward its ideal.
    ///
    /// Returns `None` for a zero delta. Negative delta means underweight.
    #[inline]
    pub fn for_delta(delta: f64) -> Option<Self> {
        if delta < 0.0 {
            Some(Side::Buy)
        } else if delta > 0.0 {
            Some(Side::Sell)
        } else {
            None
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}
