//! Once-a-day scheduled rebalancing on a background thread.
//!
//! The thread wakes every poll interval and runs one job when a scheduled
//! wall-clock time has passed since the previous check. Times that pass
//! while a job is running are skipped, not replayed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime};
use log::{debug, error, info};

use crate::bot::Rebalancer;
use crate::error::{Error, Result};
use crate::report::RebalanceReport;
use crate::session::SessionOwner;

/// Sorted, de-duplicated local times of day.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DailySchedule {
    times: Vec<NaiveTime>,
}

impl DailySchedule {
    pub fn new(times: impl IntoIterator<Item = NaiveTime>) -> Self {
        let mut times: Vec<NaiveTime> = times.into_iter().collect();
        times.sort();
        times.dedup();
        Self { times }
    }

    /// Parse `HH:MM` or `HH:MM:SS` strings.
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let times = specs
            .iter()
            .map(|s| {
                let s = s.as_ref().trim();
                NaiveTime::parse_from_str(s, "%H:%M")
                    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
                    .map_err(|_| Error::Config(format!("invalid schedule time {s:?}, expected HH:MM")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(times))
    }

    pub fn times(&self) -> &[NaiveTime] {
        &self.times
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// First scheduled instant strictly after `now`.
    pub fn next_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let today = now.date();
        if let Some(t) = self.times.iter().find(|t| **t > now.time()) {
            return Some(today.and_time(*t));
        }
        let first = self.times.first()?;
        Some(today.succ_opt()?.and_time(*first))
    }

    /// Whether any scheduled instant falls in `(last, now]`.
    pub fn due_between(&self, last: NaiveDateTime, now: NaiveDateTime) -> bool {
        if now <= last {
            return false;
        }
        self.next_after(last).is_some_and(|next| next <= now)
    }
}

/// Handle to a running scheduler thread.
pub struct SchedulerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the thread and wait for it. A job in progress finishes first.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stop.store(true, Ordering::SeqCst);
        thread.thread().unpark();
        if thread.join().is_err() {
            error!("Scheduler thread panicked");
        }
        info!("Scheduler stopped");
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn a schedule loop with an injectable clock and job.
pub fn spawn_with<C, J>(
    schedule: DailySchedule,
    poll_interval: Duration,
    clock: C,
    mut job: J,
) -> Result<SchedulerHandle>
where
    C: Fn() -> NaiveDateTime + Send + 'static,
    J: FnMut() + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);

    let thread = thread::Builder::new()
        .name("allocbot-scheduler".into())
        .spawn(move || {
            let mut last = clock();
            if let Some(next) = schedule.next_after(last) {
                info!("Scheduler started, next run at {next}");
            }
            while !flag.load(Ordering::SeqCst) {
                thread::park_timeout(poll_interval);
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                let now = clock();
                if schedule.due_between(last, now) {
                    debug!("Scheduled time reached at {now}");
                    job();
                    last = clock();
                    if let Some(next) = schedule.next_after(last) {
                        info!("Next scheduled run at {next}");
                    }
                } else {
                    last = now;
                }
            }
        })
        .map_err(|e| Error::Scheduler(e.to_string()))?;

    Ok(SchedulerHandle {
        stop,
        thread: Some(thread),
    })
}

/// Run the bot on `schedule` using the local wall clock.
pub fn spawn(
    bot: Arc<Rebalancer>,
    schedule: DailySchedule,
    poll_interval: Duration,
) -> Result<SchedulerHandle> {
    spawn_with(
        schedule,
        poll_interval,
        || Local::now().naive_local(),
        move || {
            run_scheduled_job(&bot);
        },
    )
}

/// One scheduled job: log in, refresh, rebalance, log out. Errors are logged
/// and swallowed so the loop keeps going.
///
/// Login always happens. If the command loop holds a session, that session
/// is renewed and left open for it.
pub fn run_scheduled_job(bot: &Rebalancer) -> Option<RebalanceReport> {
    info!("Running scheduled rebalance");
    match bot.with_fresh_session(SessionOwner::Scheduler, |s| s.rebalance()) {
        Ok(report) => {
            info!("Scheduled rebalance finished: {}", report.status());
            Some(report)
        }
        Err(e) => {
            error!("Scheduled rebalance failed: {e}");
            None
        }
    }
}
