//! Decision telemetry: counters by decision kind.
//!
//! The transport that ships aggregates off-process lives behind the
//! [`TelemetrySink`] trait; this module provides the in-process aggregator.
//! Like audit, telemetry is fire-and-forget and never affects a decision.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::PolicyDecision;

/// One telemetry event per evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub timestamp: DateTime<Utc>,
    pub decision: PolicyDecision,
    pub matched_rule: String,
}

/// Trait for telemetry sinks.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: &TelemetryEvent) -> Result<()>;
}

/// Sink that discards all events.
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn emit(&self, _event: &TelemetryEvent) -> Result<()> {
        Ok(())
    }
}

/// Aggregate decision counts, queryable as a snapshot.
#[derive(Default)]
pub struct DecisionCounters {
    allowed: AtomicU64,
    denied: AtomicU64,
    needs_approval: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionCountSnapshot {
    pub allowed: u64,
    pub denied: u64,
    pub needs_approval: u64,
}

impl DecisionCountSnapshot {
    pub fn total(&self) -> u64 {
        self.allowed + self.denied + self.needs_approval
    }
}

impl DecisionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DecisionCountSnapshot {
        DecisionCountSnapshot {
            allowed: self.allowed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            needs_approval: self.needs_approval.load(Ordering::Relaxed),
        }
    }
}

impl TelemetrySink for DecisionCounters {
    fn emit(&self, event: &TelemetryEvent) -> Result<()> {
        let counter = match event.decision {
            PolicyDecision::Allow => &self.allowed,
            PolicyDecision::Deny => &self.denied,
            PolicyDecision::NeedsApproval => &self.needs_approval,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(decision: PolicyDecision) -> TelemetryEvent {
        TelemetryEvent {
            timestamp: Utc::now(),
            decision,
            matched_rule: "risk-default".to_string(),
        }
    }

    #[test]
    fn counters_track_by_decision_kind() {
        let counters = DecisionCounters::new();
        counters.emit(&event(PolicyDecision::Allow)).unwrap();
        counters.emit(&event(PolicyDecision::Allow)).unwrap();
        counters.emit(&event(PolicyDecision::Deny)).unwrap();
        counters.emit(&event(PolicyDecision::NeedsApproval)).unwrap();

        let snap = counters.snapshot();
        assert_eq!(snap.allowed, 2);
        assert_eq!(snap.denied, 1);
        assert_eq!(snap.needs_approval, 1);
        assert_eq!(snap.total(), 4);
    }

    #[test]
    fn fresh_counters_are_zero() {
        assert_eq!(DecisionCounters::new().snapshot().total(), 0);
    }
}
