//! Session ownership.
//!
//! Three actors can open a brokerage session: a one-shot CLI run, the
//! interactive command loop and the daily scheduler. Whoever opens a session
//! is the only one allowed to close it, and it is closed exactly once.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// The logical actor that opened a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionOwner {
    OneShot,
    Interactive,
    Scheduler,
}

impl fmt::Display for SessionOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOwner::OneShot => write!(f, "one-shot run"),
            SessionOwner::Interactive => write!(f, "command loop"),
            SessionOwner::Scheduler => write!(f, "scheduler"),
        }
    }
}

/// An open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub owner: SessionOwner,
    pub opened_at: DateTime<Utc>,
}

/// Holds at most one open session.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Option<Session>,
}

impl SessionSlot {
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn owner(&self) -> Option<SessionOwner> {
        self.current.map(|s| s.owner)
    }

    /// Record a newly opened session. Fails if one is already open.
    pub fn begin(&mut self, owner: SessionOwner) -> Result<&Session> {
        if let Some(open) = self.current {
            return Err(Error::SessionOwner {
                owner: open.owner,
                requested: owner,
            });
        }
        Ok(&*self.current.insert(Session {
            owner,
            opened_at: Utc::now(),
        }))
    }

    /// Check that `owner` may close the current session.
    ///
    /// `Ok(None)` means nothing is open and closing is a no-op.
    pub fn check_close(&self, owner: SessionOwner) -> Result<Option<Session>> {
        match self.current {
            None => Ok(None),
            Some(s) if s.owner == owner => Ok(Some(s)),
            Some(s) => Err(Error::SessionOwner {
                owner: s.owner,
                requested: owner,
            }),
        }
    }

    /// Close the current session on behalf of `owner`.
    pub fn end(&mut self, owner: SessionOwner) -> Result<Option<Session>> {
        let closed = self.check_close(owner)?;
        self.current = None;
        Ok(closed)
    }

    /// Forget the session regardless of owner (used when tearing down).
    pub fn clear(&mut self) -> Option<Session> {
        self.current.take()
    }
}
