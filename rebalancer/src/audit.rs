//! JSONL audit trail logging.
//!
//! When `[logging] audit_file` is set, session changes, refreshes, plans and
//! every order attempt are appended to it, one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use allocbot::{AccountSummary, Holdings, Instruction};
use allocbot_broker::OrderReceipt;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::report::{RebalancePlan, RebalanceReport};
use crate::session::Session;

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: BufWriter<std::fs::File>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }
}

pub fn log_session_opened(audit: &mut AuditLog, session: &Session, username: &str) -> Result<()> {
    audit.log(
        "session_opened",
        serde_json::json!({
            "owner": session.owner.to_string(),
            "user": username,
        }),
    )
}

pub fn log_session_closed(audit: &mut AuditLog, session: &Session) -> Result<()> {
    audit.log(
        "session_closed",
        serde_json::json!({
            "owner": session.owner.to_string(),
            "opened_at": session.opened_at,
        }),
    )
}

pub fn log_holdings(
    audit: &mut AuditLog,
    holdings: &Holdings,
    account: &AccountSummary,
) -> Result<()> {
    let positions: Vec<_> = holdings
        .sorted()
        .into_iter()
        .map(|(symbol, h)| {
            serde_json::json!({
                "symbol": symbol.as_str(),
                "qty": h.quantity,
                "price": h.price,
                "equity": h.equity,
            })
        })
        .collect();

    audit.log(
        "holdings_refreshed",
        serde_json::json!({
            "positions": positions,
            "equity": account.equity,
            "cash": account.cash,
        }),
    )
}

pub fn log_plan(audit: &mut AuditLog, plan: &RebalancePlan) -> Result<()> {
    let deltas: Vec<_> = plan
        .deltas
        .iter()
        .map(|d| {
            serde_json::json!({
                "symbol": d.symbol.as_str(),
                "weight": d.weight,
                "current": d.current,
                "ideal": d.ideal,
                "delta": d.delta,
            })
        })
        .collect();

    audit.log(
        "plan_computed",
        serde_json::json!({
            "basis": plan.basis.to_string(),
            "basis_value": plan.basis_value,
            "deltas": deltas,
            "orders": plan.instructions.len(),
        }),
    )
}

pub fn log_order_submitted(
    audit: &mut AuditLog,
    instruction: &Instruction,
    receipt: &OrderReceipt,
) -> Result<()> {
    audit.log(
        "order_submitted",
        serde_json::json!({
            "symbol": instruction.symbol.as_str(),
            "side": instruction.side.to_string(),
            "amount": instruction.amount,
            "order_id": receipt.id.to_string(),
            "state": format!("{:?}", receipt.state),
        }),
    )
}

pub fn log_order_failed(audit: &mut AuditLog, instruction: &Instruction, error: &str) -> Result<()> {
    audit.log(
        "order_failed",
        serde_json::json!({
            "symbol": instruction.symbol.as_str(),
            "side": instruction.side.to_string(),
            "amount": instruction.amount,
            "error": error,
        }),
    )
}

pub fn log_rebalance_completed(audit: &mut AuditLog, report: &RebalanceReport) -> Result<()> {
    audit.log(
        "rebalance_completed",
        serde_json::json!({
            "status": report.status().to_string(),
            "placed": report.placed().count(),
            "failed": report.failed().count(),
        }),
    )
}
