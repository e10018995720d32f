//! Wire format for the remote policy endpoint, plus sync status reporting.
//!
//! The endpoint serves a JSON document in camelCase. Raw documents are
//! validated and converted into the core [`RemotePolicyBundle`]; any schema
//! violation is a sync error, never a crash.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use toolgate_core::policy::bundle::{
    RemotePolicyBundle, RestrictionAction, TimeBasedRule, TimeRuleAction, ToolRestriction,
};

use crate::error::{Result, SyncError};

/// The bundle document as served by the remote policy endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDocument {
    pub version: u64,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refresh_interval_ms: Option<u64>,
    #[serde(default)]
    pub domain_allowlist: Option<Vec<String>>,
    #[serde(default)]
    pub domain_blocklist: Option<Vec<String>>,
    #[serde(default)]
    pub tool_restrictions: Vec<RawRestriction>,
    #[serde(default)]
    pub time_based_rules: Vec<RawTimeRule>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A tool restriction entry as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRestriction {
    pub tool: String,
    pub action: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A time-based rule as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTimeRule {
    pub start_hour: u8,
    pub end_hour: u8,
    #[serde(default)]
    pub days_of_week: Option<Vec<u8>>,
    pub action: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl BundleDocument {
    /// Validate the document and convert it into an immutable bundle.
    pub fn into_bundle(self, fetched_at: DateTime<Utc>) -> Result<RemotePolicyBundle> {
        let mut tool_restrictions = Vec::with_capacity(self.tool_restrictions.len());
        for raw in self.tool_restrictions {
            if raw.tool.is_empty() {
                return Err(SyncError::InvalidBundle(
                    "tool restriction with empty tool name".to_string(),
                ));
            }
            tool_restrictions.push(ToolRestriction {
                action: parse_restriction_action(&raw.action)?,
                tool: raw.tool,
                reason: raw.reason,
            });
        }

        let mut time_based_rules = Vec::with_capacity(self.time_based_rules.len());
        for raw in self.time_based_rules {
            if raw.start_hour > 23 || raw.end_hour > 23 {
                return Err(SyncError::InvalidBundle(format!(
                    "time rule hours out of range: {}-{}",
                    raw.start_hour, raw.end_hour
                )));
            }
            if let Some(ref days) = raw.days_of_week {
                if days.iter().any(|d| *d > 6) {
                    return Err(SyncError::InvalidBundle(
                        "time rule day of week out of range".to_string(),
                    ));
                }
            }
            time_based_rules.push(TimeBasedRule {
                start_hour: raw.start_hour,
                end_hour: raw.end_hour,
                days_of_week: raw.days_of_week,
                action: parse_time_action(&raw.action)?,
                reason: raw.reason,
            });
        }

        Ok(RemotePolicyBundle {
            version: self.version,
            fetched_at,
            expires_at: self.expires_at,
            refresh_interval_ms: self.refresh_interval_ms,
            domain_allowlist: self.domain_allowlist,
            domain_blocklist: self.domain_blocklist,
            tool_restrictions,
            time_based_rules,
            message: self.message,
        })
    }
}

fn parse_restriction_action(action: &str) -> Result<RestrictionAction> {
    match action {
        "deny" => Ok(RestrictionAction::Deny),
        "require_approval" => Ok(RestrictionAction::RequireApproval),
        "allow" => Ok(RestrictionAction::Allow),
        other => Err(SyncError::InvalidBundle(format!(
            "unknown restriction action '{other}', expected deny/require_approval/allow"
        ))),
    }
}

fn parse_time_action(action: &str) -> Result<TimeRuleAction> {
    match action {
        "deny" => Ok(TimeRuleAction::Deny),
        "require_approval" => Ok(TimeRuleAction::RequireApproval),
        other => Err(SyncError::InvalidBundle(format!(
            "unknown time rule action '{other}', expected deny/require_approval"
        ))),
    }
}

/// Phase of the sync state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Syncing,
    Success,
    Error,
}

/// Read-only snapshot of the sync manager and the held bundle, for the
/// operator-facing status surface.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Configured remote endpoint, if any.
    pub url: Option<String>,
    /// Whether any bundle is held (possibly expired).
    pub has_bundle: bool,
    pub policy_version: Option<u64>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub allowlist_entries: usize,
    pub blocklist_entries: usize,
    pub tool_restriction_entries: usize,
    pub time_rule_entries: usize,
    /// Admin-visible banner from the bundle.
    pub message: Option<String>,
    /// Whether the developer override is in force.
    pub dev_override: bool,
    pub phase: SyncPhase,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub next_sync_time: Option<DateTime<Utc>>,
}
