//! Audit logging for policy decisions.
//!
//! Every evaluation outcome — including denials and approval holds — is
//! recorded as a [`DecisionRecord`]. Audit is fire-and-forget: a failing
//! sink is logged and never affects the decision path.

pub mod logger;

use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::{PolicyDecision, RiskLevel};

/// A single audit entry for one policy evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// When the evaluation happened.
    pub timestamp: DateTime<Utc>,
    /// Tool the agent requested.
    pub tool_name: String,
    /// Target domain, empty for non-navigating tools.
    pub domain: String,
    /// User mode the request carried.
    pub user_mode: String,
    /// Whether the session was in observe-only mode.
    pub observe_only: bool,
    /// The decision reached.
    pub decision: PolicyDecision,
    /// Effective risk used for the decision.
    pub risk_level: RiskLevel,
    /// Identifier of the evaluator that decided.
    pub matched_rule: String,
    /// Human-readable explanation.
    pub reason: String,
    /// Version of the remote bundle in force, if any was consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_version: Option<u64>,
}

/// Trait for audit sinks.
pub trait AuditSink: Send + Sync {
    /// Append a single record. Errors are reported to the caller, which
    /// must treat them as non-fatal.
    fn log(&self, record: &DecisionRecord) -> Result<()>;
}

/// Sink that discards all records.
pub struct NoopAudit;

impl AuditSink for NoopAudit {
    fn log(&self, _record: &DecisionRecord) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink for tests and inspection.
#[derive(Default)]
pub struct MemoryAudit {
    records: Mutex<Vec<DecisionRecord>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records captured so far.
    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl AuditSink for MemoryAudit {
    fn log(&self, record: &DecisionRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}
