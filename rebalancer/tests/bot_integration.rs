//! End-to-end bot behavior against the mock broker.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use allocbot::{Basis, Side, Symbol, TargetWeights};
use allocbot_broker::{Brokerage, TimeInForce};
use allocbot_broker::mock::{FillMode, MockBroker, MockEvent};
use allocbot_rebalancer::audit::AuditLog;
use allocbot_rebalancer::config::Config;
use allocbot_rebalancer::credentials::Secrets;
use allocbot_rebalancer::report::OrderOutcome;
use allocbot_rebalancer::scheduler::run_scheduled_job;
use allocbot_rebalancer::{BotSettings, Error, RebalanceStatus, Rebalancer, SessionOwner};

const SEED: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

fn sym(s: &str) -> Symbol {
    Symbol::new(s)
}

fn secrets() -> Secrets {
    Secrets::new("me@example.com", "pw", SEED).unwrap()
}

fn settings(weights: &[(&str, f64)]) -> BotSettings {
    BotSettings::new(TargetWeights::new(weights.iter().copied()).unwrap())
}

fn bot_with(settings: BotSettings, broker: &MockBroker) -> Rebalancer {
    Rebalancer::new(settings, secrets(), broker.clone())
}

/// $1,000 account: $500 of A held, $500 cash, B priced but not held.
fn half_in_a() -> MockBroker {
    MockBroker::builder()
        .with_position(sym("A"), 50.0, 9.0, 10.0)
        .with_price(sym("B"), 20.0)
        .with_cash(500.0)
        .build()
}

// ============================================================================
// Delta and order semantics
// ============================================================================

#[test]
fn underweight_symbols_are_bought() {
    let broker = half_in_a();
    let bot = bot_with(settings(&[("A", 0.6), ("B", 0.4)]), &broker);

    let report = bot
        .with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap();

    assert_eq!(report.status(), RebalanceStatus::Success);
    assert_eq!(report.plan.basis_value, 1000.0);
    assert_eq!(report.plan.deltas[0].delta, -100.0);
    assert_eq!(report.plan.deltas[1].delta, -400.0);

    let orders = broker.submitted_orders();
    assert_eq!(orders.len(), 2);
    assert_eq!((orders[0].symbol.as_str(), orders[0].side), ("A", Side::Buy));
    assert_eq!(orders[0].amount, 100.0);
    assert_eq!((orders[1].symbol.as_str(), orders[1].side), ("B", Side::Buy));
    assert_eq!(orders[1].amount, 400.0);
}

#[test]
fn overweight_symbol_is_sold() {
    let broker = MockBroker::builder()
        .with_position(sym("A"), 80.0, 10.0, 10.0)
        .with_price(sym("B"), 20.0)
        .with_cash(200.0)
        .build();
    let bot = bot_with(settings(&[("A", 0.5), ("B", 0.5)]), &broker);

    bot.with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap();

    let orders = broker.submitted_orders();
    assert_eq!((orders[0].side, orders[0].amount), (Side::Sell, 300.0));
    assert_eq!((orders[1].side, orders[1].amount), (Side::Buy, 500.0));
}

#[test]
fn cash_placeholder_never_traded() {
    let broker = MockBroker::builder()
        .with_price(sym("QQQ"), 400.0)
        .with_price(sym("AGG"), 100.0)
        .with_cash(2000.0)
        .build();
    let bot = bot_with(
        settings(&[("QQQ", 0.5), ("AGG", 0.45), ("$$$", 0.05)]),
        &broker,
    );

    let report = bot
        .with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap();

    assert!(report.plan.deltas.iter().all(|d| d.symbol.as_str() != "$$$"));
    assert!(broker.submitted_orders().iter().all(|o| o.symbol.as_str() != "$$$"));
    assert_eq!(report.plan.totals(), (1900.0, 0.0));
    // The reserved 5% stays in cash.
    assert!((broker.cash() - 100.0).abs() < 1e-6);
}

#[test]
fn custom_cash_symbol() {
    let broker = MockBroker::builder()
        .with_price(sym("A"), 10.0)
        .with_cash(100.0)
        .build();
    let mut s = settings(&[("A", 0.9), ("CASH", 0.1)]);
    s.cash_symbol = sym("CASH");
    let bot = bot_with(s, &broker);

    bot.with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap();
    let orders = broker.submitted_orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].amount, 90.0);
}

#[test]
fn lowercase_cash_symbol_from_config_is_never_traded() {
    let config = Config::from_toml(
        r#"
[portfolio]
cash_symbol = "cash"

[[portfolio.targets]]
symbol = "A"
weight = 0.9

[[portfolio.targets]]
symbol = "cash"
weight = 0.1
"#,
    )
    .unwrap();
    let settings = BotSettings::from_config(&config).unwrap();
    assert_eq!(settings.cash_symbol, sym("CASH"));

    let broker = MockBroker::builder()
        .with_price(sym("A"), 10.0)
        .with_cash(100.0)
        .build();
    let bot = bot_with(settings, &broker);

    let report = bot
        .with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap();
    assert!(report.plan.deltas.iter().all(|d| d.symbol != sym("CASH")));
    let orders = broker.submitted_orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].symbol, sym("A"));
    assert_eq!(orders[0].amount, 90.0);
}

#[test]
fn deltas_below_minimum_are_skipped() {
    let broker = MockBroker::builder()
        .with_position(sym("A"), 60.2, 10.0, 10.0)
        .with_position(sym("B"), 19.99, 20.0, 20.0)
        .with_cash(0.0)
        .build();
    let mut s = settings(&[("A", 0.6), ("B", 0.4)]);
    s.min_order_usd = 5.0;
    let bot = bot_with(s, &broker);

    let report = bot
        .with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap();
    assert_eq!(report.status(), RebalanceStatus::NoChange);
    assert!(broker.submitted_orders().is_empty());
    assert!(report.is_ok());
}

#[test]
fn second_rebalance_is_no_change() {
    let broker = half_in_a();
    let bot = bot_with(settings(&[("A", 0.6), ("B", 0.4)]), &broker);

    bot.with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap();
    let again = bot
        .with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap();
    assert_eq!(again.status(), RebalanceStatus::NoChange);
    assert_eq!(broker.submitted_orders().len(), 2);
}

#[test]
fn invested_basis_ignores_cash() {
    let broker = MockBroker::builder()
        .with_position(sym("A"), 30.0, 10.0, 10.0)
        .with_position(sym("B"), 5.0, 20.0, 20.0)
        .with_cash(10_000.0)
        .build();
    let mut s = settings(&[("A", 0.5), ("B", 0.5)]);
    s.basis = Basis::InvestedEquity;
    let bot = bot_with(s, &broker);

    let plan = bot.with_session(SessionOwner::OneShot, |s| s.plan()).unwrap();
    assert_eq!(plan.basis_value, 400.0);
    assert_eq!(plan.instructions[0].side, Side::Sell);
    assert_eq!(plan.instructions[0].amount, 100.0);
    assert_eq!(plan.instructions[1].side, Side::Buy);
    assert_eq!(plan.instructions[1].amount, 100.0);
}

#[test]
fn order_settings_are_forwarded() {
    let broker = half_in_a();
    let mut s = settings(&[("A", 0.6), ("B", 0.4)]);
    s.time_in_force = TimeInForce::Gtc;
    s.extended_hours = false;
    let bot = bot_with(s, &broker);

    bot.with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap();
    for order in broker.submitted_orders() {
        assert_eq!(order.time_in_force, TimeInForce::Gtc);
        assert!(!order.extended_hours);
    }
}

#[test]
fn dry_run_plan_places_nothing() {
    let broker = half_in_a();
    let bot = bot_with(settings(&[("A", 0.6), ("B", 0.4)]), &broker);

    let plan = bot.with_session(SessionOwner::OneShot, |s| s.plan()).unwrap();
    assert_eq!(plan.instructions.len(), 2);
    assert!(broker.submitted_orders().is_empty());
    assert_eq!(broker.logout_count(), 1);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn rejected_order_does_not_stop_the_rest() {
    let broker = MockBroker::builder()
        .with_price(sym("A"), 10.0)
        .with_price(sym("B"), 20.0)
        .with_price(sym("C"), 30.0)
        .with_cash(900.0)
        .reject_symbol(sym("B"))
        .build();
    let bot = bot_with(settings(&[("A", 0.3), ("B", 0.3), ("C", 0.3)]), &broker);

    let report = bot
        .with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap();

    assert_eq!(report.status(), RebalanceStatus::Partial);
    assert_eq!(broker.submitted_orders().len(), 3);
    assert!(report.outcome_for("A").unwrap().is_placed());
    assert!(matches!(
        report.outcome_for("B").unwrap().outcome,
        OrderOutcome::Failed(_)
    ));
    assert!(report.outcome_for("C").unwrap().is_placed());
    assert_eq!(broker.logout_count(), 1);
}

#[test]
fn all_orders_rejected_is_failure() {
    let broker = MockBroker::builder()
        .fill_mode(FillMode::Reject)
        .with_price(sym("A"), 10.0)
        .with_cash(100.0)
        .build();
    let bot = bot_with(settings(&[("A", 1.0)]), &broker);

    let report = bot
        .with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap();
    assert_eq!(report.status(), RebalanceStatus::Failure);
    assert!(!report.is_ok());
}

#[test]
fn invalid_weights_fail_before_login() {
    let toml = r#"
[[portfolio.targets]]
symbol = "A"
weight = 0.5

[[portfolio.targets]]
symbol = "B"
weight = -0.1
"#;
    let config = Config::from_toml(toml).unwrap();
    assert!(matches!(
        BotSettings::from_config(&config),
        Err(Error::Validation(_))
    ));
}

#[test]
fn weight_sum_checked_independent_of_order() {
    for pairs in [[("A", 0.5), ("B", 0.6)], [("B", 0.6), ("A", 0.5)]] {
        assert!(TargetWeights::new(pairs).is_err());
    }
}

#[test]
fn failed_login_places_no_orders() {
    let broker = MockBroker::builder()
        .with_price(sym("A"), 10.0)
        .with_cash(100.0)
        .fail_login()
        .build();
    let bot = bot_with(settings(&[("A", 1.0)]), &broker);

    let err = bot
        .with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap_err();
    assert!(matches!(err, Error::Authentication(_)));
    assert!(broker.submitted_orders().is_empty());
    assert!(!bot.is_logged_in());
}

// ============================================================================
// Sessions and concurrency
// ============================================================================

#[test]
fn each_rebalance_gets_its_own_session() {
    let broker = half_in_a();
    let bot = bot_with(settings(&[("A", 0.6), ("B", 0.4)]), &broker);

    for _ in 0..3 {
        bot.with_session(SessionOwner::OneShot, |s| s.rebalance())
            .unwrap();
    }
    assert_eq!(broker.login_count(), 3);
    assert_eq!(broker.logout_count(), 3);
    assert!(!bot.is_logged_in());
}

#[test]
fn scheduled_job_renews_interactive_session() {
    let broker = half_in_a();
    let bot = bot_with(settings(&[("A", 0.6), ("B", 0.4)]), &broker);
    bot.login(SessionOwner::Interactive).unwrap();

    let report = run_scheduled_job(&bot).unwrap();
    assert_eq!(report.status(), RebalanceStatus::Success);
    assert_eq!(broker.login_count(), 2);
    assert_eq!(broker.logout_count(), 1);
    assert_eq!(bot.session_owner(), Some(SessionOwner::Interactive));

    bot.logout(SessionOwner::Interactive).unwrap();
    assert_eq!(broker.logout_count(), 2);
    assert!(!bot.is_logged_in());
}

#[test]
fn every_scheduled_job_logs_in() {
    let broker = half_in_a();
    let bot = bot_with(settings(&[("A", 0.6), ("B", 0.4)]), &broker);
    bot.login(SessionOwner::Interactive).unwrap();

    run_scheduled_job(&bot);
    run_scheduled_job(&bot);
    assert_eq!(broker.login_count(), 3);
    assert!(broker.is_logged_in());
}

#[test]
fn expired_session_is_dropped_and_next_call_logs_in() {
    let broker = half_in_a();
    let bot = bot_with(settings(&[("A", 0.6), ("B", 0.4)]), &broker);
    bot.login(SessionOwner::Interactive).unwrap();
    broker.expire_session();

    let err = bot
        .with_session(SessionOwner::Interactive, |s| s.refresh().map(|_| ()))
        .unwrap_err();
    assert!(matches!(err, Error::NotLoggedIn));
    assert!(!bot.is_logged_in());

    bot.with_session(SessionOwner::Interactive, |s| s.rebalance())
        .unwrap();
    assert_eq!(broker.login_count(), 2);
    assert_eq!(broker.submitted_orders().len(), 2);
}

#[test]
fn scheduled_job_recovers_expired_interactive_session() {
    let broker = half_in_a();
    let bot = bot_with(settings(&[("A", 0.6), ("B", 0.4)]), &broker);
    bot.login(SessionOwner::Interactive).unwrap();
    broker.expire_session();

    let report = run_scheduled_job(&bot).unwrap();
    assert_eq!(report.status(), RebalanceStatus::Success);
    assert_eq!(bot.session_owner(), Some(SessionOwner::Interactive));
}

#[test]
fn scheduled_job_swallows_errors() {
    let broker = MockBroker::builder().fail_login().build();
    let bot = bot_with(settings(&[("A", 1.0)]), &broker);
    assert!(run_scheduled_job(&bot).is_none());
}

#[test]
fn concurrent_rebalances_never_interleave() {
    let broker = MockBroker::builder()
        .with_price(sym("A"), 10.0)
        .with_price(sym("B"), 20.0)
        .with_cash(1000.0)
        .order_delay(Duration::from_millis(10))
        .build();
    let bot = Arc::new(bot_with(settings(&[("A", 0.6), ("B", 0.4)]), &broker));

    let handles: Vec<_> = [SessionOwner::OneShot, SessionOwner::Scheduler]
        .into_iter()
        .map(|owner| {
            let bot = Arc::clone(&bot);
            thread::spawn(move || {
                for _ in 0..3 {
                    bot.with_session(owner, |s| s.rebalance()).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // Every Login is followed by its own Logout before the next Login.
    let mut open = false;
    for event in broker.events() {
        match event {
            MockEvent::Login => {
                assert!(!open, "login while another session was open");
                open = true;
            }
            MockEvent::Logout => {
                assert!(open, "logout without a session");
                open = false;
            }
            _ => assert!(open, "broker call outside a session: {event:?}"),
        }
    }
    assert_eq!(broker.login_count(), 6);
    assert_eq!(broker.logout_count(), 6);
    // Only the first rebalance had anything to do.
    assert_eq!(broker.submitted_orders().len(), 2);
}

// ============================================================================
// Audit trail
// ============================================================================

#[test]
fn audit_trail_records_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("audit.jsonl");

    let broker = MockBroker::builder()
        .with_price(sym("A"), 10.0)
        .with_price(sym("B"), 20.0)
        .with_cash(1000.0)
        .reject_symbol(sym("B"))
        .build();
    let bot = bot_with(settings(&[("A", 0.6), ("B", 0.4)]), &broker)
        .with_audit(AuditLog::open(&path).unwrap());

    bot.with_session(SessionOwner::OneShot, |s| s.rebalance())
        .unwrap();

    let events: Vec<String> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(l).unwrap();
            v["event"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        events,
        [
            "session_opened",
            "holdings_refreshed",
            "plan_computed",
            "order_submitted",
            "order_failed",
            "rebalance_completed",
            "session_closed",
        ]
    );
}
