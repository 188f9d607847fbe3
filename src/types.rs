//! Core types: Symbol, dollar formatting and rounding helpers

use std::borrow::Borrow;
use std::fmt;

/// Ticker symbol, trimmed and upper-cased.
///
/// The cash placeholder (e.g. `$$$`) is an ordinary symbol as far as this
/// type is concerned.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol.
    ///
    /// # Panics
    ///
    /// Panics if `s` is empty after trimming. Use [`Symbol::try_new`] for
    /// untrusted input.
    #[track_caller]
    pub fn new(s: &str) -> Self {
        match Self::try_new(s) {
            Some(sym) => sym,
            None => panic!("symbol must not be empty"),
        }
    }

    /// Create a symbol, returning `None` if `s` is blank.
    pub fn try_new(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Symbol(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Symbol::try_new(&s).ok_or_else(|| "symbol must not be empty".to_string())
    }
}

impl From<Symbol> for String {
    fn from(sym: Symbol) -> Self {
        sym.0
    }
}

/// Round to 6 decimal places, the precision deltas are compared at.
#[inline]
pub fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Round a dollar amount to whole cents for order submission.
#[inline]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Dollar amount wrapper used only for display (`$1,234.50`, `-$2.50`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Usd(pub f64);

impl fmt::Display for Usd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cents = (self.0.abs() * 100.0).round() as u64;
        let dollars = cents / 100;
        let mut grouped = String::new();
        let digits = dollars.to_string();
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0.0 && cents > 0 { "-" } else { "" };
        f.pad(&format!("{sign}${grouped}.{:02}", cents % 100))
    }
}
