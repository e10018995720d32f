//! Remote policy bundle data model.
//!
//! A bundle is a versioned snapshot of organization-supplied rules, created
//! by a successful sync fetch and superseded atomically by the next one.
//! Bundles are never mutated after construction. An expired bundle is kept
//! around for status reporting but is not consulted by the rule evaluators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action attached to a tool restriction entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionAction {
    Deny,
    RequireApproval,
    Allow,
}

/// A single tool restriction: exact tool name or the `"*"` wildcard.
///
/// Exact-name entries take precedence over a wildcard entry; at most one
/// exact match and one wildcard match are considered per evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRestriction {
    pub tool: String,
    pub action: RestrictionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Action attached to a time-based rule. `Allow` is deliberately absent:
/// a time window can only tighten policy, never open it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRuleAction {
    Deny,
    RequireApproval,
}

/// A rule restricting actions during an hour-of-day window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeBasedRule {
    /// Window start hour, 0-23 inclusive.
    pub start_hour: u8,
    /// Window end hour, 0-23 inclusive. When `end_hour < start_hour` the
    /// window wraps midnight.
    pub end_hour: u8,
    /// Days of week the rule applies to (0 = Sunday .. 6 = Saturday).
    /// `None` means every day.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    pub action: TimeRuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TimeBasedRule {
    /// Whether this rule matches the given hour and day of week.
    pub fn matches(&self, hour: u8, weekday: u8) -> bool {
        if let Some(ref days) = self.days_of_week {
            if !days.contains(&weekday) {
                return false;
            }
        }
        is_time_in_range(self.start_hour, self.end_hour, hour)
    }
}

/// Hour-of-day window test with midnight wraparound.
///
/// `start <= end` is a same-day window `[start, end)`; `start > end` wraps
/// midnight and matches when `hour >= start || hour < end`.
pub fn is_time_in_range(start: u8, end: u8, hour: u8) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// A versioned snapshot of remote policy rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePolicyBundle {
    /// Monotonic version counter from the policy server. Informational;
    /// the most recently fetched bundle is always the one in force.
    pub version: u64,
    /// When this bundle was fetched.
    pub fetched_at: DateTime<Utc>,
    /// Hard expiry. A bundle past this instant is no longer consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Server-suggested refresh interval for the sync timer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval_ms: Option<u64>,
    /// When present and non-empty, only these domains may be targeted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_allowlist: Option<Vec<String>>,
    /// Domains that are always refused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_blocklist: Option<Vec<String>>,
    /// Ordered tool restrictions (exact entries plus at most one `"*"`).
    #[serde(default)]
    pub tool_restrictions: Vec<ToolRestriction>,
    /// Ordered time-based rules; the first matching rule is decisive.
    #[serde(default)]
    pub time_based_rules: Vec<TimeBasedRule>,
    /// Admin-visible banner message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RemotePolicyBundle {
    /// Whether the bundle has expired as of `now`. A bundle with no
    /// `expires_at` never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => now > expiry,
            None => false,
        }
    }

    /// Whether the bundle has expired as of the current wall clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Look up the restriction applying to `tool_name`: the first exact
    /// match, falling back to the first `"*"` wildcard entry. An explicit
    /// fallback lookup, not a pattern engine, so matching order stays
    /// auditable.
    pub fn find_restriction(&self, tool_name: &str) -> Option<&ToolRestriction> {
        self.tool_restrictions
            .iter()
            .find(|r| r.tool == tool_name)
            .or_else(|| self.tool_restrictions.iter().find(|r| r.tool == "*"))
    }
}
