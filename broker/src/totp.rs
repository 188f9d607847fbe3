//! Time-based one-time codes (RFC 6238) for brokerage MFA.
//!
//! HMAC-SHA1, 30 second step, 6 digits: what authenticator apps produce
//! from the base32 seed shown when 2FA is enabled.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::Zeroizing;

use crate::error::BrokerError;

type HmacSha1 = Hmac<Sha1>;

/// Seconds per code window.
pub const STEP_SECS: u64 = 30;
/// Code length.
pub const DIGITS: u32 = 6;

/// A decoded TOTP shared secret.
pub struct Totp {
    key: Zeroizing<Vec<u8>>,
}

impl Totp {
    /// Decode a base32 seed. Spaces, `-`, `=` padding and lowercase are accepted.
    pub fn from_base32(seed: &str) -> Result<Self, BrokerError> {
        let cleaned: String = seed
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '=')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if cleaned.is_empty() {
            return Err(BrokerError::TotpSeed("seed is empty".into()));
        }
        let key = BASE32_NOPAD
            .decode(cleaned.as_bytes())
            .map_err(|e| BrokerError::TotpSeed(e.to_string()))?;
        Ok(Self {
            key: Zeroizing::new(key),
        })
    }

    /// Code for the window containing `unix_secs`.
    pub fn code_at(&self, unix_secs: u64) -> String {
        hotp(&self.key, unix_secs / STEP_SECS, DIGITS)
    }

    /// Code for the current window.
    pub fn now(&self) -> String {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        self.code_at(secs)
    }
}

/// HOTP (RFC 4226) with dynamic truncation, zero-padded to `digits`.
fn hotp(key: &[u8], counter: u64, digits: u32) -> String {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();

    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(hash[offset] & 0x7f) << 24)
        | (u32::from(hash[offset + 1]) << 16)
        | (u32::from(hash[offset + 2]) << 8)
        | u32::from(hash[offset + 3]);

    let code = binary % 10u32.pow(digits);
    format!("{code:0width$}", width = digits as usize)
}
