//! Rule evaluators for the admission pipeline.
//!
//! The pipeline is a closed set of rule kinds evaluated in a fixed order;
//! the first decisive evaluator wins. Rules that consult the remote bundle
//! see it only when it is present, unexpired, and not bypassed by the
//! developer override — the engine resolves that before building the
//! [`RuleContext`].

use chrono::{DateTime, Datelike, Timelike, Utc};

use super::bundle::{RemotePolicyBundle, RestrictionAction, TimeRuleAction};
use super::risk::{domain_risk, tool_risk};
use super::{EvaluationRequest, EvaluationResult, PolicyDecision, RiskLevel};
use crate::config::PolicySettings;

/// Tools that may never execute, regardless of remote policy, user mode, or
/// developer override. This is the one invariant floor of the pipeline.
pub const DANGEROUS_TOOLS: &[&str] =
    &["system_execute", "shell_exec", "process_spawn", "system_eval"];

/// Tools permitted while a session is in observe-only mode.
pub const OBSERVE_SAFE_TOOLS: &[&str] =
    &["browser_observe", "browser_screenshot", "browser_read_page"];

/// The rule kinds of the pipeline, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    DangerousTool,
    ObserveOnly,
    DomainList,
    ToolRestriction,
    TimeWindow,
    RiskDefault,
}

impl RuleKind {
    /// The gating rules, evaluated in order before the risk-based default.
    pub const GATING: [RuleKind; 5] = [
        RuleKind::DangerousTool,
        RuleKind::ObserveOnly,
        RuleKind::DomainList,
        RuleKind::ToolRestriction,
        RuleKind::TimeWindow,
    ];

    /// Identifier recorded as `matched_rule` in audit entries.
    pub fn id(&self) -> &'static str {
        match self {
            RuleKind::DangerousTool => "dangerous-tool",
            RuleKind::ObserveOnly => "observe-only",
            RuleKind::DomainList => "domain-list",
            RuleKind::ToolRestriction => "tool-restriction",
            RuleKind::TimeWindow => "time-window",
            RuleKind::RiskDefault => "risk-default",
        }
    }

    /// Evaluate this rule against the context.
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        match self {
            RuleKind::DangerousTool => eval_dangerous_tool(ctx),
            RuleKind::ObserveOnly => eval_observe_only(ctx),
            RuleKind::DomainList => eval_domain_list(ctx),
            RuleKind::ToolRestriction => eval_tool_restriction(ctx),
            RuleKind::TimeWindow => eval_time_window(ctx),
            RuleKind::RiskDefault => RuleOutcome::Decisive(risk_default(ctx)),
        }
    }
}

/// What a single evaluator had to say about a request.
#[derive(Debug, Clone)]
pub enum RuleOutcome {
    /// The evaluator decided; the pipeline stops here.
    Decisive(EvaluationResult),
    /// The evaluator has no opinion; the pipeline continues.
    NoOpinion,
}

/// Inputs shared by all evaluators for a single request.
pub struct RuleContext<'a> {
    pub request: &'a EvaluationRequest,
    /// The active bundle: `None` when absent, expired, or bypassed.
    pub bundle: Option<&'a RemotePolicyBundle>,
    pub settings: &'a PolicySettings,
    pub now: DateTime<Utc>,
}

impl RuleContext<'_> {
    /// Effective risk: the worse of the tool's and the domain's baseline.
    pub fn effective_risk(&self) -> RiskLevel {
        tool_risk(&self.request.tool_name).max(domain_risk(&self.request.domain))
    }
}

fn eval_dangerous_tool(ctx: &RuleContext<'_>) -> RuleOutcome {
    let tool = ctx.request.tool_name.as_str();
    let builtin = DANGEROUS_TOOLS.contains(&tool);
    let extended = ctx.settings.dangerous_tools.iter().any(|t| t == tool);
    if builtin || extended {
        return RuleOutcome::Decisive(EvaluationResult::new(
            PolicyDecision::Deny,
            RiskLevel::High,
            format!("tool '{tool}' is on the dangerous-tool deny list"),
            RuleKind::DangerousTool.id(),
        ));
    }
    RuleOutcome::NoOpinion
}

fn eval_observe_only(ctx: &RuleContext<'_>) -> RuleOutcome {
    if !ctx.request.observe_only {
        return RuleOutcome::NoOpinion;
    }
    let tool = ctx.request.tool_name.as_str();
    let read_only = OBSERVE_SAFE_TOOLS.contains(&tool)
        || ctx.settings.observe_safe_tools.iter().any(|t| t == tool);
    if read_only {
        // Terminal: read-only tools stop the pipeline in observe mode.
        return RuleOutcome::Decisive(EvaluationResult::new(
            PolicyDecision::Allow,
            tool_risk(tool),
            format!("read-only tool '{tool}' permitted in observe-only mode"),
            RuleKind::ObserveOnly.id(),
        ));
    }
    // Observe-only violations are always high severity, independent of the
    // tool's baseline risk.
    RuleOutcome::Decisive(EvaluationResult::new(
        PolicyDecision::Deny,
        RiskLevel::High,
        format!("state-modifying tool '{tool}' blocked in observe-only mode"),
        RuleKind::ObserveOnly.id(),
    ))
}

fn eval_domain_list(ctx: &RuleContext<'_>) -> RuleOutcome {
    let Some(bundle) = ctx.bundle else {
        return RuleOutcome::NoOpinion;
    };
    let domain = ctx.request.domain.as_str();
    // Tools without a target host are outside the domain rules' scope.
    if domain.is_empty() {
        return RuleOutcome::NoOpinion;
    }

    if let Some(ref allowlist) = bundle.domain_allowlist {
        if !allowlist.is_empty() {
            if allowlist.iter().any(|d| d == domain) {
                // Allowlisted: the blocklist is not consulted.
                return RuleOutcome::NoOpinion;
            }
            return RuleOutcome::Decisive(EvaluationResult::new(
                PolicyDecision::Deny,
                ctx.effective_risk(),
                format!("domain '{domain}' is not on the policy allowlist"),
                RuleKind::DomainList.id(),
            ));
        }
    }

    if let Some(ref blocklist) = bundle.domain_blocklist {
        if blocklist.iter().any(|d| d == domain) {
            return RuleOutcome::Decisive(EvaluationResult::new(
                PolicyDecision::Deny,
                ctx.effective_risk(),
                format!("domain '{domain}' is on the policy blocklist"),
                RuleKind::DomainList.id(),
            ));
        }
    }

    RuleOutcome::NoOpinion
}

fn eval_tool_restriction(ctx: &RuleContext<'_>) -> RuleOutcome {
    let Some(bundle) = ctx.bundle else {
        return RuleOutcome::NoOpinion;
    };
    let tool = ctx.request.tool_name.as_str();
    let Some(restriction) = bundle.find_restriction(tool) else {
        return RuleOutcome::NoOpinion;
    };

    let decision = match restriction.action {
        RestrictionAction::Deny => PolicyDecision::Deny,
        RestrictionAction::RequireApproval => PolicyDecision::NeedsApproval,
        RestrictionAction::Allow => PolicyDecision::Allow,
    };
    let reason = restriction
        .reason
        .clone()
        .unwrap_or_else(|| format!("remote policy restriction on '{}'", restriction.tool));

    RuleOutcome::Decisive(EvaluationResult::new(
        decision,
        ctx.effective_risk(),
        reason,
        RuleKind::ToolRestriction.id(),
    ))
}

fn eval_time_window(ctx: &RuleContext<'_>) -> RuleOutcome {
    let Some(bundle) = ctx.bundle else {
        return RuleOutcome::NoOpinion;
    };
    let hour = ctx.now.hour() as u8;
    let weekday = ctx.now.weekday().num_days_from_sunday() as u8;

    for rule in &bundle.time_based_rules {
        if rule.matches(hour, weekday) {
            let decision = match rule.action {
                TimeRuleAction::Deny => PolicyDecision::Deny,
                TimeRuleAction::RequireApproval => PolicyDecision::NeedsApproval,
            };
            let reason = rule.reason.clone().unwrap_or_else(|| {
                format!(
                    "action restricted during {:02}:00-{:02}:00 window",
                    rule.start_hour, rule.end_hour
                )
            });
            return RuleOutcome::Decisive(EvaluationResult::new(
                decision,
                ctx.effective_risk(),
                reason,
                RuleKind::TimeWindow.id(),
            ));
        }
    }

    RuleOutcome::NoOpinion
}

/// The risk-based default, applied when no gating rule was decisive.
/// Always produces a decision.
pub fn risk_default(ctx: &RuleContext<'_>) -> EvaluationResult {
    let effective = ctx.effective_risk();
    let mode = ctx.request.user_mode.as_str();
    let threshold = ctx.settings.approval_threshold(mode);

    if effective >= threshold {
        EvaluationResult::new(
            PolicyDecision::NeedsApproval,
            effective,
            format!(
                "{} risk meets the approval threshold for '{mode}' mode",
                effective.as_str()
            ),
            RuleKind::RiskDefault.id(),
        )
    } else {
        EvaluationResult::new(
            PolicyDecision::Allow,
            effective,
            format!(
                "{} risk is below the approval threshold for '{mode}' mode",
                effective.as_str()
            ),
            RuleKind::RiskDefault.id(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::bundle::{TimeBasedRule, ToolRestriction};
    use chrono::TimeZone;

    fn settings() -> PolicySettings {
        PolicySettings::default()
    }

    fn ctx_for<'a>(
        request: &'a EvaluationRequest,
        bundle: Option<&'a RemotePolicyBundle>,
        settings: &'a PolicySettings,
    ) -> RuleContext<'a> {
        RuleContext {
            request,
            bundle,
            settings,
            now: Utc::now(),
        }
    }

    fn bundle() -> RemotePolicyBundle {
        RemotePolicyBundle {
            version: 1,
            fetched_at: Utc::now(),
            expires_at: None,
            refresh_interval_ms: None,
            domain_allowlist: None,
            domain_blocklist: None,
            tool_restrictions: Vec::new(),
            time_based_rules: Vec::new(),
            message: None,
        }
    }

    fn decisive(outcome: RuleOutcome) -> EvaluationResult {
        match outcome {
            RuleOutcome::Decisive(res) => res,
            RuleOutcome::NoOpinion => panic!("expected a decisive outcome"),
        }
    }

    #[test]
    fn dangerous_tool_always_denied() {
        let s = settings();
        let req = EvaluationRequest::new("system_execute")
            .with_domain("localhost")
            .with_user_mode("admin");
        let res = decisive(RuleKind::DangerousTool.evaluate(&ctx_for(&req, None, &s)));
        assert_eq!(res.decision, PolicyDecision::Deny);
        assert_eq!(res.risk_level, RiskLevel::High);
        assert_eq!(res.matched_rule, "dangerous-tool");
    }

    #[test]
    fn dangerous_tool_list_extends_from_settings() {
        let s = PolicySettings {
            dangerous_tools: vec!["db_drop".to_string()],
            ..Default::default()
        };
        let req = EvaluationRequest::new("db_drop");
        let res = decisive(RuleKind::DangerousTool.evaluate(&ctx_for(&req, None, &s)));
        assert_eq!(res.decision, PolicyDecision::Deny);
    }

    #[test]
    fn observe_only_denies_state_modifying_tool_at_high_risk() {
        let s = settings();
        // browser_click is only MEDIUM base risk; the violation is still HIGH.
        let req = EvaluationRequest::new("browser_click").observe_only();
        let res = decisive(RuleKind::ObserveOnly.evaluate(&ctx_for(&req, None, &s)));
        assert_eq!(res.decision, PolicyDecision::Deny);
        assert_eq!(res.risk_level, RiskLevel::High);
    }

    #[test]
    fn observe_only_allows_read_only_tool() {
        let s = settings();
        let req = EvaluationRequest::new("browser_observe").observe_only();
        let res = decisive(RuleKind::ObserveOnly.evaluate(&ctx_for(&req, None, &s)));
        assert_eq!(res.decision, PolicyDecision::Allow);
        assert_eq!(res.risk_level, RiskLevel::Low);
    }

    #[test]
    fn observe_only_has_no_opinion_when_mode_off() {
        let s = settings();
        let req = EvaluationRequest::new("browser_click");
        assert!(matches!(
            RuleKind::ObserveOnly.evaluate(&ctx_for(&req, None, &s)),
            RuleOutcome::NoOpinion
        ));
    }

    #[test]
    fn allowlist_denies_unlisted_domain() {
        let s = settings();
        let mut b = bundle();
        b.domain_allowlist = Some(vec!["example.com".to_string()]);
        let req = EvaluationRequest::new("browser_navigate").with_domain("not-allowed.example");
        let res = decisive(RuleKind::DomainList.evaluate(&ctx_for(&req, Some(&b), &s)));
        assert_eq!(res.decision, PolicyDecision::Deny);
        assert_eq!(res.matched_rule, "domain-list");
    }

    #[test]
    fn allowlisted_domain_skips_blocklist() {
        let s = settings();
        let mut b = bundle();
        b.domain_allowlist = Some(vec!["example.com".to_string()]);
        b.domain_blocklist = Some(vec!["example.com".to_string()]);
        let req = EvaluationRequest::new("browser_navigate").with_domain("example.com");
        assert!(matches!(
            RuleKind::DomainList.evaluate(&ctx_for(&req, Some(&b), &s)),
            RuleOutcome::NoOpinion
        ));
    }

    #[test]
    fn blocklist_denies_without_allowlist() {
        let s = settings();
        let mut b = bundle();
        b.domain_blocklist = Some(vec!["evil.example".to_string()]);
        let req = EvaluationRequest::new("browser_navigate").with_domain("evil.example");
        let res = decisive(RuleKind::DomainList.evaluate(&ctx_for(&req, Some(&b), &s)));
        assert_eq!(res.decision, PolicyDecision::Deny);
    }

    #[test]
    fn empty_allowlist_is_not_exclusive() {
        let s = settings();
        let mut b = bundle();
        b.domain_allowlist = Some(Vec::new());
        let req = EvaluationRequest::new("browser_navigate").with_domain("example.com");
        assert!(matches!(
            RuleKind::DomainList.evaluate(&ctx_for(&req, Some(&b), &s)),
            RuleOutcome::NoOpinion
        ));
    }

    #[test]
    fn domainless_request_skips_domain_rules() {
        let s = settings();
        let mut b = bundle();
        b.domain_allowlist = Some(vec!["example.com".to_string()]);
        let req = EvaluationRequest::new("file_read");
        assert!(matches!(
            RuleKind::DomainList.evaluate(&ctx_for(&req, Some(&b), &s)),
            RuleOutcome::NoOpinion
        ));
    }

    #[test]
    fn tool_restriction_exact_deny() {
        let s = settings();
        let mut b = bundle();
        b.tool_restrictions = vec![ToolRestriction {
            tool: "code_execute".to_string(),
            action: crate::policy::bundle::RestrictionAction::Deny,
            reason: None,
        }];
        let req = EvaluationRequest::new("code_execute");
        let res = decisive(RuleKind::ToolRestriction.evaluate(&ctx_for(&req, Some(&b), &s)));
        assert_eq!(res.decision, PolicyDecision::Deny);
        assert_eq!(res.matched_rule, "tool-restriction");
    }

    #[test]
    fn tool_restriction_wildcard_requires_approval() {
        let s = settings();
        let mut b = bundle();
        b.tool_restrictions = vec![ToolRestriction {
            tool: "*".to_string(),
            action: crate::policy::bundle::RestrictionAction::RequireApproval,
            reason: None,
        }];
        let req = EvaluationRequest::new("browser_scroll");
        let res = decisive(RuleKind::ToolRestriction.evaluate(&ctx_for(&req, Some(&b), &s)));
        assert_eq!(res.decision, PolicyDecision::NeedsApproval);
    }

    #[test]
    fn tool_restriction_no_match_is_no_opinion() {
        let s = settings();
        let mut b = bundle();
        b.tool_restrictions = vec![ToolRestriction {
            tool: "code_execute".to_string(),
            action: crate::policy::bundle::RestrictionAction::Deny,
            reason: None,
        }];
        let req = EvaluationRequest::new("browser_scroll");
        assert!(matches!(
            RuleKind::ToolRestriction.evaluate(&ctx_for(&req, Some(&b), &s)),
            RuleOutcome::NoOpinion
        ));
    }

    #[test]
    fn time_window_first_match_is_decisive() {
        let s = settings();
        let mut b = bundle();
        b.time_based_rules = vec![
            TimeBasedRule {
                start_hour: 0,
                end_hour: 23,
                days_of_week: None,
                action: TimeRuleAction::RequireApproval,
                reason: Some("after-hours approval".to_string()),
            },
            TimeBasedRule {
                start_hour: 0,
                end_hour: 23,
                days_of_week: None,
                action: TimeRuleAction::Deny,
                reason: None,
            },
        ];
        let req = EvaluationRequest::new("browser_navigate").with_domain("example.com");
        let ctx = RuleContext {
            request: &req,
            bundle: Some(&b),
            settings: &s,
            // A Wednesday at noon.
            now: Utc.with_ymd_and_hms(2025, 6, 4, 12, 0, 0).unwrap(),
        };
        let res = decisive(RuleKind::TimeWindow.evaluate(&ctx));
        assert_eq!(res.decision, PolicyDecision::NeedsApproval);
        assert_eq!(res.reason, "after-hours approval");
    }

    #[test]
    fn time_window_outside_hours_is_no_opinion() {
        let s = settings();
        let mut b = bundle();
        b.time_based_rules = vec![TimeBasedRule {
            start_hour: 22,
            end_hour: 6,
            days_of_week: None,
            action: TimeRuleAction::Deny,
            reason: None,
        }];
        let req = EvaluationRequest::new("browser_navigate").with_domain("example.com");
        let ctx = RuleContext {
            request: &req,
            bundle: Some(&b),
            settings: &s,
            now: Utc.with_ymd_and_hms(2025, 6, 4, 12, 0, 0).unwrap(),
        };
        assert!(matches!(
            RuleKind::TimeWindow.evaluate(&ctx),
            RuleOutcome::NoOpinion
        ));
    }

    #[test]
    fn risk_default_high_needs_approval_in_any_mode() {
        let s = settings();
        for mode in ["standard", "admin"] {
            let req = EvaluationRequest::new("code_execute").with_user_mode(mode);
            let res = risk_default(&ctx_for(&req, None, &s));
            assert_eq!(res.decision, PolicyDecision::NeedsApproval, "mode {mode}");
            assert_eq!(res.risk_level, RiskLevel::High);
        }
    }

    #[test]
    fn risk_default_medium_depends_on_mode() {
        let s = settings();
        let standard = EvaluationRequest::new("browser_click").with_domain("example.com");
        let res = risk_default(&ctx_for(&standard, None, &s));
        assert_eq!(res.decision, PolicyDecision::NeedsApproval);

        let admin = EvaluationRequest::new("browser_click")
            .with_domain("example.com")
            .with_user_mode("admin");
        let res = risk_default(&ctx_for(&admin, None, &s));
        assert_eq!(res.decision, PolicyDecision::Allow);
    }

    #[test]
    fn risk_default_low_allows() {
        let s = settings();
        let req = EvaluationRequest::new("browser_observe");
        let res = risk_default(&ctx_for(&req, None, &s));
        assert_eq!(res.decision, PolicyDecision::Allow);
        assert_eq!(res.risk_level, RiskLevel::Low);
    }

    #[test]
    fn effective_risk_takes_worse_of_tool_and_domain() {
        let s = settings();
        // Low-risk tool against a high-risk domain.
        let req = EvaluationRequest::new("browser_observe").with_domain("admin.example.com");
        let ctx = ctx_for(&req, None, &s);
        assert_eq!(ctx.effective_risk(), RiskLevel::High);
    }
}
