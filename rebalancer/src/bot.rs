//! The rebalancing bot.
//!
//! All mutable state (broker handle, session, cached holdings, audit log)
//! sits behind one mutex, so the command loop and the scheduler can share a
//! `Rebalancer` through an `Arc` and never interleave broker calls. Work that
//! needs a session goes through [`Rebalancer::with_session`], which holds the
//! lock from login to logout.

use std::sync::{Mutex, MutexGuard, PoisonError};

use allocbot::{
    AccountSummary, Basis, DEFAULT_CASH_SYMBOL, Holding, Holdings, Symbol, TargetWeights,
    compute_deltas, plan,
};
use allocbot_broker::{Brokerage, DollarOrder, TimeInForce};
use log::{debug, error, info, warn};

use crate::audit::{self, AuditLog};
use crate::config::Config;
use crate::credentials::Secrets;
use crate::error::{Error, Result};
use crate::report::{OrderOutcome, RebalancePlan, RebalanceReport, SymbolOutcome};
use crate::session::{Session, SessionOwner, SessionSlot};

/// What to rebalance towards and how to place orders.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub weights: TargetWeights,
    /// Weight entry that reserves cash; never traded.
    pub cash_symbol: Symbol,
    pub basis: Basis,
    /// Smallest order the broker accepts, in dollars.
    pub min_order_usd: f64,
    pub time_in_force: TimeInForce,
    pub extended_hours: bool,
}

impl BotSettings {
    pub fn new(weights: TargetWeights) -> Self {
        Self {
            weights,
            cash_symbol: Symbol::new(DEFAULT_CASH_SYMBOL),
            basis: Basis::AccountEquity,
            min_order_usd: 1.0,
            time_in_force: TimeInForce::Gfd,
            extended_hours: true,
        }
    }

    /// Validates the target weights; nothing touches the network.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cash_symbol = Symbol::try_new(&config.portfolio.cash_symbol)
            .ok_or_else(|| Error::Config("cash_symbol must not be empty".into()))?;
        Ok(Self {
            weights: config.target_weights()?,
            cash_symbol,
            basis: config.portfolio.basis,
            min_order_usd: config.portfolio.min_order_usd,
            time_in_force: config.orders.time_in_force,
            extended_hours: config.orders.extended_hours,
        })
    }
}

struct BotState {
    broker: Box<dyn Brokerage + Send>,
    session: SessionSlot,
    holdings: Option<Holdings>,
    account: Option<AccountSummary>,
    audit: Option<AuditLog>,
}

impl BotState {
    fn audit(&mut self, write: impl FnOnce(&mut AuditLog) -> Result<()>) {
        if let Some(log) = self.audit.as_mut() {
            if let Err(e) = write(log) {
                warn!("Failed to write audit event: {e}");
            }
        }
    }

    fn open(&mut self, owner: SessionOwner, secrets: &Secrets) -> Result<()> {
        if let Some(current) = self.session.owner() {
            return Err(Error::SessionOwner {
                owner: current,
                requested: owner,
            });
        }

        // The one-time code is only good for its window; mint one per login.
        let credentials = secrets.credentials();
        self.broker.login(&credentials).map_err(|e| {
            error!("Login as {} failed: {e}", secrets.username());
            Error::from(e)
        })?;

        let session = *self.session.begin(owner)?;
        info!("Logged in as {} ({owner})", secrets.username());
        self.audit(|log| audit::log_session_opened(log, &session, secrets.username()));
        Ok(())
    }

    fn close(&mut self, owner: SessionOwner) -> Result<()> {
        let Some(session) = self.session.check_close(owner)? else {
            debug!("Logout requested by {owner} with no open session");
            return Ok(());
        };

        let result = self.broker.logout();
        self.session.clear();
        info!("Logged out ({owner})");
        self.audit(|log| audit::log_session_closed(log, &session));
        Ok(result?)
    }

    /// Log the open session out and back in with a fresh one-time code,
    /// keeping its owner. The old token may already be dead, so a failed
    /// logout is only warned about.
    fn renew(&mut self, secrets: &Secrets) -> Result<()> {
        let Some(session) = self.drop_session() else {
            return Ok(());
        };
        info!("Renewing {} session", session.owner);
        self.open(session.owner, secrets)
    }

    /// Forget the open session and whatever was read through it.
    fn drop_session(&mut self) -> Option<Session> {
        let session = self.session.clear()?;
        if let Err(e) = self.broker.logout() {
            warn!("Logout of {} session failed: {e}", session.owner);
        }
        self.holdings = None;
        self.account = None;
        self.audit(|log| audit::log_session_closed(log, &session));
        Some(session)
    }

    fn refresh(&mut self) -> Result<(&Holdings, AccountSummary)> {
        let positions = self.broker.positions()?;
        let account = self.broker.account()?;

        let holdings: Holdings = positions
            .into_iter()
            .map(|p| {
                let holding = Holding::new(p.price, p.quantity, p.average_buy_price);
                (p.symbol, holding)
            })
            .collect();
        let summary = AccountSummary {
            equity: account.equity,
            cash: account.cash,
        };

        info!(
            "Refreshed holdings: {} positions, equity ${:.2}, cash ${:.2}",
            holdings.len(),
            summary.equity,
            summary.cash
        );
        self.audit(|log| audit::log_holdings(log, &holdings, &summary));

        self.account = Some(summary);
        Ok((&*self.holdings.insert(holdings), summary))
    }
}

/// Operations available while a session is open.
pub struct SessionScope<'a> {
    owner: SessionOwner,
    settings: &'a BotSettings,
    state: &'a mut BotState,
}

impl SessionScope<'_> {
    /// Owner of the session this scope runs in.
    pub fn owner(&self) -> SessionOwner {
        self.owner
    }

    /// Fetch a fresh holdings snapshot and account summary.
    pub fn refresh(&mut self) -> Result<(&Holdings, AccountSummary)> {
        self.state.refresh()
    }

    /// Cached holdings, fetched only if nothing is cached yet.
    pub fn holdings(&mut self) -> Result<&Holdings> {
        if self.state.holdings.is_none() || self.state.account.is_none() {
            self.state.refresh()?;
        }
        self.state.holdings.as_ref().ok_or(Error::NotLoggedIn)
    }

    /// Cached account summary, fetched only if nothing is cached yet.
    pub fn account(&mut self) -> Result<AccountSummary> {
        if self.state.account.is_none() {
            self.state.refresh()?;
        }
        self.state.account.ok_or(Error::NotLoggedIn)
    }

    /// Refresh and compute what a rebalance would do, without placing orders.
    pub fn plan(&mut self) -> Result<RebalancePlan> {
        let settings = self.settings;
        let (holdings, account) = self.state.refresh()?;

        let basis_value = settings.basis.value(&account, holdings);
        let deltas = compute_deltas(
            &settings.weights,
            holdings,
            basis_value,
            settings.cash_symbol.as_str(),
        );
        let instructions = plan(&deltas, settings.min_order_usd);

        let plan = RebalancePlan {
            basis: settings.basis,
            basis_value,
            deltas,
            instructions,
        };
        debug!("Computed plan with {} orders", plan.instructions.len());
        self.state.audit(|log| audit::log_plan(log, &plan));
        Ok(plan)
    }

    /// Refresh, plan, and submit every order.
    ///
    /// A failed order does not stop the rest; each symbol's outcome is in
    /// the report.
    pub fn rebalance(&mut self) -> Result<RebalanceReport> {
        let plan = self.plan()?;
        if plan.is_empty() {
            info!("Portfolio is on target, nothing to trade");
        }

        let mut outcomes = Vec::with_capacity(plan.instructions.len());
        for ins in &plan.instructions {
            let order = DollarOrder {
                symbol: ins.symbol.clone(),
                side: ins.side,
                amount: ins.amount,
                time_in_force: self.settings.time_in_force,
                extended_hours: self.settings.extended_hours,
            };

            let outcome = match self.state.broker.submit_dollar_order(&order) {
                Ok(receipt) => {
                    info!("Placed {ins} (order {})", receipt.id);
                    self.state
                        .audit(|log| audit::log_order_submitted(log, ins, &receipt));
                    OrderOutcome::Placed(receipt)
                }
                Err(e) => {
                    error!("Order failed: {ins}: {e}");
                    let msg = e.to_string();
                    self.state.audit(|log| audit::log_order_failed(log, ins, &msg));
                    OrderOutcome::Failed(msg)
                }
            };
            outcomes.push(SymbolOutcome {
                instruction: ins.clone(),
                outcome,
            });
        }

        if !outcomes.is_empty() {
            // Orders change holdings; the next read must refetch.
            self.state.holdings = None;
            self.state.account = None;
        }

        let report = RebalanceReport { plan, outcomes };
        info!(
            "Rebalance {}: {} placed, {} failed",
            report.status(),
            report.placed().count(),
            report.failed().count()
        );
        self.state
            .audit(|log| audit::log_rebalance_completed(log, &report));
        Ok(report)
    }
}

/// A portfolio bot bound to one brokerage account.
pub struct Rebalancer {
    settings: BotSettings,
    secrets: Secrets,
    state: Mutex<BotState>,
}

impl Rebalancer {
    pub fn new<B>(settings: BotSettings, secrets: Secrets, broker: B) -> Self
    where
        B: Brokerage + Send + 'static,
    {
        Self {
            settings,
            secrets,
            state: Mutex::new(BotState {
                broker: Box::new(broker),
                session: SessionSlot::default(),
                holdings: None,
                account: None,
                audit: None,
            }),
        }
    }

    /// Record session, refresh and order events to `audit`.
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .audit = Some(audit);
        self
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, BotState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Bot state lock was poisoned by a panic; continuing");
            poisoned.into_inner()
        })
    }

    /// Open a session for `owner`. Fails if any session is already open.
    pub fn login(&self, owner: SessionOwner) -> Result<()> {
        self.lock().open(owner, &self.secrets)
    }

    /// Close the session if `owner` opened it. No-op when nothing is open.
    pub fn logout(&self, owner: SessionOwner) -> Result<()> {
        self.lock().close(owner)
    }

    pub fn session_owner(&self) -> Option<SessionOwner> {
        self.lock().session.owner()
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock().session.is_open()
    }

    /// Holdings from the last refresh, if still valid.
    pub fn cached_holdings(&self) -> Option<Holdings> {
        self.lock().holdings.clone()
    }

    /// Run `f` inside a session.
    ///
    /// If no session is open, one is opened for `owner` and closed again
    /// afterwards whether `f` succeeds or not. If one is already open, `f`
    /// runs inside it and it stays open, unless the broker reports it has
    /// expired, in which case it is dropped so the next call logs in again.
    /// The lock is held throughout.
    pub fn with_session<T>(
        &self,
        owner: SessionOwner,
        f: impl FnOnce(&mut SessionScope<'_>) -> Result<T>,
    ) -> Result<T> {
        self.run_in_session(owner, false, f)
    }

    /// Like [`with_session`](Self::with_session), but always logs in first.
    ///
    /// An open session is logged out and back in under its owner, so a
    /// long-lived command loop session never outlives its token.
    pub fn with_fresh_session<T>(
        &self,
        owner: SessionOwner,
        f: impl FnOnce(&mut SessionScope<'_>) -> Result<T>,
    ) -> Result<T> {
        self.run_in_session(owner, true, f)
    }

    fn run_in_session<T>(
        &self,
        owner: SessionOwner,
        renew: bool,
        f: impl FnOnce(&mut SessionScope<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.lock();

        let opened = match state.session.owner() {
            Some(current) => {
                debug!("{owner} running inside the {current} session");
                if renew {
                    state.renew(&self.secrets)?;
                }
                false
            }
            None => {
                state.open(owner, &self.secrets)?;
                true
            }
        };

        let scope_owner = state.session.owner().unwrap_or(owner);
        let result = f(&mut SessionScope {
            owner: scope_owner,
            settings: &self.settings,
            state: &mut *state,
        });

        if opened {
            if let Err(e) = state.close(owner) {
                warn!("Logout after {owner} work failed: {e}");
            }
        } else if matches!(result, Err(Error::NotLoggedIn)) {
            warn!("Broker no longer accepts the {scope_owner} session; dropping it");
            state.drop_session();
        }
        result
    }
}

impl Drop for Rebalancer {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(owner) = state.session.owner() {
            info!("Closing open {owner} session on shutdown");
            if let Err(e) = state.close(owner) {
                warn!("Logout on shutdown failed: {e}");
            }
        }
    }
}
