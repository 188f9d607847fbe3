//! Login secrets from the environment.
//!
//! Email, password and the TOTP seed are read once at startup (after
//! `dotenvy` has loaded any `.env` file). A fresh one-time code is minted
//! for every login, since a code is only valid for its 30 second window.

use std::fmt;

use allocbot_broker::Credentials;
use allocbot_broker::totp::Totp;
use zeroize::Zeroizing;

use crate::config::CredentialsConfig;
use crate::error::{Error, Result};

/// Long-lived login material.
pub struct Secrets {
    username: String,
    password: Zeroizing<String>,
    totp: Totp,
}

impl Secrets {
    pub fn new(username: &str, password: &str, totp_seed: &str) -> Result<Self> {
        if username.trim().is_empty() {
            return Err(Error::Credentials("username must not be empty".into()));
        }
        let totp = Totp::from_base32(totp_seed).map_err(|e| Error::Credentials(e.to_string()))?;
        Ok(Self {
            username: username.trim().to_string(),
            password: Zeroizing::new(password.to_string()),
            totp,
        })
    }

    /// Read the variables named in `[credentials]`.
    pub fn from_env(names: &CredentialsConfig) -> Result<Self> {
        let username = env_var(&names.email_var)?;
        let password = Zeroizing::new(env_var(&names.password_var)?);
        let seed = Zeroizing::new(env_var(&names.totp_seed_var)?);
        Self::new(&username, &password, &seed)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Credentials carrying the code for the current window.
    pub fn credentials(&self) -> Credentials {
        self.with_code(self.totp.now())
    }

    /// Credentials carrying the code for the window containing `unix_secs`.
    pub fn credentials_at(&self, unix_secs: u64) -> Credentials {
        self.with_code(self.totp.code_at(unix_secs))
    }

    fn with_code(&self, mfa_code: String) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
            mfa_code,
        }
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn env_var(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        Ok(_) => Err(Error::Credentials(format!("{name} is set but empty"))),
        Err(_) => Err(Error::Credentials(format!("{name} is not set"))),
    }
}
