//! Interactive command loop.
//!
//! ```text
//! l, logout      stop the scheduler, log out and exit
//! r, rebalance   refresh holdings and trade towards the targets
//! p, positions   show holdings (cached after the first fetch)
//! h, help        list commands
//! ```

use std::io::{BufRead, Write};
use std::sync::Arc;

use allocbot::Usd;
use log::{error, info};

use crate::bot::Rebalancer;
use crate::error::Result;
use crate::scheduler::SchedulerHandle;
use crate::session::SessionOwner;

const HELP: &str = "\
Commands:
  l, logout      log out and exit
  r, rebalance   rebalance now
  p, positions   show current positions
  h, help        show this help";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Logout,
    Rebalance,
    Positions,
    Help,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let word = line.trim();
        match word.to_ascii_lowercase().as_str() {
            "l" | "logout" => Command::Logout,
            "r" | "rebalance" => Command::Rebalance,
            "p" | "positions" => Command::Positions,
            "h" | "help" => Command::Help,
            _ => Command::Invalid(word.to_string()),
        }
    }
}

/// Command loop over a shared bot, optionally owning the scheduler.
pub struct Repl {
    bot: Arc<Rebalancer>,
    scheduler: Option<SchedulerHandle>,
}

impl Repl {
    pub fn new(bot: Arc<Rebalancer>) -> Self {
        Self {
            bot,
            scheduler: None,
        }
    }

    /// Stop this scheduler when the user logs out.
    pub fn with_scheduler(mut self, handle: SchedulerHandle) -> Self {
        self.scheduler = Some(handle);
        self
    }

    /// Read commands until logout or end of input.
    ///
    /// Only I/O errors on `output` end the loop early; command failures are
    /// reported and the loop carries on.
    pub fn run<R: BufRead, W: Write>(mut self, input: R, mut output: W) -> Result<()> {
        writeln!(output, "{HELP}")?;
        let mut lines = input.lines();

        loop {
            write!(output, "> ")?;
            output.flush()?;

            let command = match lines.next() {
                Some(Ok(line)) => Command::parse(&line),
                Some(Err(e)) => {
                    error!("Failed to read command: {e}");
                    Command::Logout
                }
                None => Command::Logout,
            };

            match command {
                Command::Logout => break,
                Command::Rebalance => self.rebalance(&mut output)?,
                Command::Positions => self.positions(&mut output)?,
                Command::Help => writeln!(output, "{HELP}")?,
                Command::Invalid(word) => {
                    writeln!(output, "Invalid command {word:?}. Type h for help.")?
                }
            }
        }

        self.shutdown(&mut output)
    }

    fn rebalance<W: Write>(&self, output: &mut W) -> Result<()> {
        match self
            .bot
            .with_session(SessionOwner::Interactive, |s| s.rebalance())
        {
            Ok(report) => write!(output, "{report}")?,
            Err(e) => writeln!(output, "Rebalance failed: {e}")?,
        }
        Ok(())
    }

    fn positions<W: Write>(&self, output: &mut W) -> Result<()> {
        let shown = self.bot.with_session(SessionOwner::Interactive, |s| {
            let account = s.account()?;
            let table = s.holdings()?.to_string();
            Ok((account, table))
        });
        match shown {
            Ok((account, table)) => {
                writeln!(
                    output,
                    "Equity {}, cash {}",
                    Usd(account.equity),
                    Usd(account.cash)
                )?;
                write!(output, "{table}")?;
            }
            Err(e) => writeln!(output, "Could not fetch positions: {e}")?,
        }
        Ok(())
    }

    fn shutdown<W: Write>(&mut self, output: &mut W) -> Result<()> {
        if let Some(handle) = self.scheduler.take() {
            handle.stop();
        }
        match self.bot.logout(SessionOwner::Interactive) {
            Ok(()) => writeln!(output, "Logged out.")?,
            Err(e) => {
                error!("Logout failed: {e}");
                writeln!(output, "Logout failed: {e}")?;
            }
        }
        info!("Command loop finished");
        Ok(())
    }
}
