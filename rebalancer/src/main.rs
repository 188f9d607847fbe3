//! CLI entry point for the allocbot rebalancer.

use std::io;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{error, warn};

use allocbot::Usd;
use allocbot_broker::robinhood::RobinhoodBroker;
use allocbot_rebalancer::audit::AuditLog;
use allocbot_rebalancer::config::Config;
use allocbot_rebalancer::credentials::Secrets;
use allocbot_rebalancer::repl::Repl;
use allocbot_rebalancer::{
    BotSettings, Error, RebalanceStatus, Rebalancer, SessionOwner, scheduler,
};

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Keep a Robinhood account at its target weights")]
#[command(version)]
struct Cli {
    /// Path to the config file [default: allocbot.toml if present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in, rebalance once, log out
    Run {
        /// Show the plan without placing orders
        #[arg(long)]
        dry_run: bool,
    },

    /// Show current positions
    Positions,

    /// Check login and show account equity and cash
    Status,

    /// Command loop with the daily scheduler in the background
    Interactive {
        /// Do not start the daily scheduler
        #[arg(long)]
        no_schedule: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Ignoring .env file: {e}");
        }
    }

    let cli = Cli::parse();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code(&e)
        }
    };
    process::exit(code);
}

/// Validation 2, authentication 3, anything else 1.
fn exit_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<Error>() {
        Some(Error::Validation(_)) => 2,
        Some(Error::Authentication(_)) => 3,
        _ => 1,
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = Config::load_or_default(cli.config.as_deref())?;
    // Weights are checked before any credentials are read or network used.
    let settings = BotSettings::from_config(&config)?;
    let bot = build_bot(&config, settings)?;

    match cli.command {
        Command::Run { dry_run } => run_once(&bot, dry_run),
        Command::Positions => show_positions(&bot),
        Command::Status => show_status(&bot),
        Command::Interactive { no_schedule } => interactive(bot, &config, no_schedule),
    }
}

fn build_bot(config: &Config, settings: BotSettings) -> anyhow::Result<Rebalancer> {
    let secrets = Secrets::from_env(&config.credentials)?;
    let broker =
        RobinhoodBroker::new(&config.robinhood()).context("failed to create Robinhood client")?;

    let mut bot = Rebalancer::new(settings, secrets, broker);
    if let Some(path) = config.audit_path() {
        let audit = AuditLog::open(path)
            .with_context(|| format!("failed to open audit log {}", path.display()))?;
        bot = bot.with_audit(audit);
    }
    Ok(bot)
}

fn run_once(bot: &Rebalancer, dry_run: bool) -> anyhow::Result<i32> {
    let report = bot.with_session(SessionOwner::OneShot, |s| {
        if dry_run {
            let plan = s.plan()?;
            print!("{plan}");
            println!("\n[DRY RUN] No orders submitted.");
            Ok(None)
        } else {
            s.rebalance().map(Some)
        }
    })?;

    let Some(report) = report else {
        return Ok(0);
    };
    print!("{report}");
    match report.status() {
        RebalanceStatus::NoChange | RebalanceStatus::Success => Ok(0),
        status => {
            error!("Rebalance finished with status {status}");
            Ok(1)
        }
    }
}

fn show_positions(bot: &Rebalancer) -> anyhow::Result<i32> {
    let (account, table) = bot.with_session(SessionOwner::OneShot, |s| {
        let account = s.account()?;
        Ok((account, s.holdings()?.to_string()))
    })?;

    println!(
        "Equity {}, cash {}\n",
        Usd(account.equity),
        Usd(account.cash)
    );
    print!("{table}");
    Ok(0)
}

fn show_status(bot: &Rebalancer) -> anyhow::Result<i32> {
    let account = bot.with_session(SessionOwner::OneShot, |s| s.account())?;
    println!("Login OK");
    println!(
        "Equity {}, cash {}",
        Usd(account.equity),
        Usd(account.cash)
    );
    Ok(0)
}

fn interactive(bot: Rebalancer, config: &Config, no_schedule: bool) -> anyhow::Result<i32> {
    let bot = Arc::new(bot);
    bot.login(SessionOwner::Interactive)?;

    let mut repl = Repl::new(Arc::clone(&bot));
    if !no_schedule {
        let schedule = config.daily_schedule()?;
        if schedule.is_empty() {
            warn!("No schedule times configured, scheduler not started");
        } else {
            let handle = scheduler::spawn(Arc::clone(&bot), schedule, config.poll_interval())?;
            repl = repl.with_scheduler(handle);
        }
    }

    repl.run(io::stdin().lock(), io::stdout())
        .context("command loop failed")?;
    Ok(0)
}
