//! Policy evaluation engine.
//!
//! [`PolicyEngine::evaluate`] gates every tool invocation. It runs the
//! gating rules in precedence order, falls back to the risk-based default,
//! and records the outcome in the audit and telemetry sinks. Evaluation is
//! synchronous, does no I/O beyond the sinks, and never fails for
//! well-formed input: a malformed request resolves to deny, because failing
//! open is never acceptable for a security gate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::rules::{risk_default, RuleContext, RuleKind, RuleOutcome};
use super::store::PolicyStore;
use super::{EvaluationRequest, EvaluationResult, PolicyDecision, RiskLevel};
use crate::audit::{AuditSink, DecisionRecord, NoopAudit};
use crate::config::PolicySettings;
use crate::telemetry::{NoopTelemetry, TelemetryEvent, TelemetrySink};

const MALFORMED_RULE: &str = "malformed-request";

/// The admission gate for agent actions.
pub struct PolicyEngine {
    settings: PolicySettings,
    store: Arc<PolicyStore>,
    audit: Arc<dyn AuditSink>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl PolicyEngine {
    /// Create an engine reading bundle snapshots from `store`, with audit
    /// and telemetry disabled.
    pub fn new(settings: PolicySettings, store: Arc<PolicyStore>) -> Self {
        Self {
            settings,
            store,
            audit: Arc::new(NoopAudit),
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Evaluate a requested action and return the admission decision.
    ///
    /// Always logs the outcome, including denials and approval holds.
    pub fn evaluate(&self, request: &EvaluationRequest) -> EvaluationResult {
        let now = Utc::now();
        let (result, policy_version) = self.decide(request, now);
        self.record(request, &result, policy_version, now);
        result
    }

    /// The pure decision, split out so tests can pin the clock.
    fn decide(
        &self,
        request: &EvaluationRequest,
        now: DateTime<Utc>,
    ) -> (EvaluationResult, Option<u64>) {
        if request.tool_name.trim().is_empty() {
            return (
                EvaluationResult::new(
                    PolicyDecision::Deny,
                    RiskLevel::High,
                    "malformed request: missing tool name",
                    MALFORMED_RULE,
                ),
                None,
            );
        }

        let snapshot = self.store.snapshot();
        let bundle = snapshot.active_bundle(now);
        let policy_version = bundle.map(|b| b.version);

        let ctx = RuleContext {
            request,
            bundle,
            settings: &self.settings,
            now,
        };

        for kind in RuleKind::GATING {
            if let RuleOutcome::Decisive(result) = kind.evaluate(&ctx) {
                debug!(
                    tool = %request.tool_name,
                    rule = result.matched_rule,
                    decision = result.decision.as_str(),
                    "rule decided"
                );
                return (result, policy_version);
            }
        }

        // No gating rule had an opinion: risk-based default.
        (risk_default(&ctx), policy_version)
    }

    /// Fire-and-forget audit and telemetry. Sink failures are logged and
    /// never reach the caller.
    fn record(
        &self,
        request: &EvaluationRequest,
        result: &EvaluationResult,
        policy_version: Option<u64>,
        now: DateTime<Utc>,
    ) {
        let record = DecisionRecord {
            timestamp: now,
            tool_name: request.tool_name.clone(),
            domain: request.domain.clone(),
            user_mode: request.user_mode.clone(),
            observe_only: request.observe_only,
            decision: result.decision,
            risk_level: result.risk_level,
            matched_rule: result.matched_rule.clone(),
            reason: result.reason.clone(),
            policy_version,
        };
        if let Err(e) = self.audit.log(&record) {
            warn!(error = %e, "audit sink failed; decision unaffected");
        }

        let event = TelemetryEvent {
            timestamp: now,
            decision: result.decision,
            matched_rule: result.matched_rule.clone(),
        };
        if let Err(e) = self.telemetry.emit(&event) {
            warn!(error = %e, "telemetry sink failed; decision unaffected");
        }
    }
}
