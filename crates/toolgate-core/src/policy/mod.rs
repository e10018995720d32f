//! Policy decision types and traits.
//!
//! Every action an agent attempts — browser automation, code execution,
//! navigation — is admitted or refused by the policy engine. Each request is
//! evaluated against a fixed pipeline of rules to produce a decision: allow,
//! deny, or hold for human approval.

pub mod bundle;
pub mod engine;
pub mod risk;
pub mod rules;
pub mod store;

use serde::{Deserialize, Serialize};

/// Coarse severity classification driving default caution.
///
/// Total order: `Low < Medium < High`. Used both as a classification input
/// and as the effective severity attached to a decision.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// String form used in audit records and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

/// The admission decision for a requested action.
///
/// `Deny` and `NeedsApproval` both stop auto-execution; they differ only in
/// whether a human may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDecision {
    Allow,
    Deny,
    NeedsApproval,
}

impl PolicyDecision {
    /// String form used in audit records and telemetry counters.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyDecision::Allow => "allow",
            PolicyDecision::Deny => "deny",
            PolicyDecision::NeedsApproval => "needs_approval",
        }
    }
}

/// A requested action, as submitted by a tool-invocation site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Name of the tool the agent wants to invoke.
    pub tool_name: String,
    /// Opaque tool arguments. The engine does not interpret these beyond
    /// presence checks; they are carried through to the audit log.
    #[serde(default)]
    pub args: serde_json::Value,
    /// Target host for navigating tools; empty for tools with no target.
    #[serde(default)]
    pub domain: String,
    /// Session-wide read-only mode.
    #[serde(default)]
    pub observe_only: bool,
    /// User mode tag (e.g. `"standard"`, `"admin"`). A classification input
    /// only, never itself a decision.
    #[serde(default = "default_user_mode")]
    pub user_mode: String,
}

fn default_user_mode() -> String {
    "standard".to_string()
}

impl EvaluationRequest {
    /// A request for `tool_name` with no domain, observe-only off, and the
    /// default user mode.
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            args: serde_json::Value::Null,
            domain: String::new(),
            observe_only: false,
            user_mode: default_user_mode(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_user_mode(mut self, mode: impl Into<String>) -> Self {
        self.user_mode = mode.into();
        self
    }

    pub fn observe_only(mut self) -> Self {
        self.observe_only = true;
        self
    }
}

/// Outcome of evaluating a request against the policy pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// The admission decision.
    pub decision: PolicyDecision,
    /// The *effective* risk used for the decision — not necessarily the
    /// tool's base risk (observe-only violations are always `High`).
    pub risk_level: RiskLevel,
    /// Human-readable explanation.
    pub reason: String,
    /// Identifier of the evaluator that produced the decision, for audit.
    pub matched_rule: String,
}

impl EvaluationResult {
    pub(crate) fn new(
        decision: PolicyDecision,
        risk_level: RiskLevel,
        reason: impl Into<String>,
        matched_rule: &str,
    ) -> Self {
        Self {
            decision,
            risk_level,
            reason: reason.into(),
            matched_rule: matched_rule.to_string(),
        }
    }
}
