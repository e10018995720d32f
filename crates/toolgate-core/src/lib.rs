//! # toolgate-core
//!
//! Runtime policy decision engine gating every action an autonomous agent
//! attempts against a host environment -- browser automation, code
//! execution, navigation. Each requested action is resolved to allow, deny,
//! or needs-approval by a layered pipeline: built-in safety rules, risk
//! classification, and an optionally-synchronized remote policy bundle.
//!
//! This crate holds the decision pipeline, the shared bundle snapshot store,
//! and the audit/telemetry contracts. Bundle synchronization itself lives in
//! `toolgate-sync`.

pub mod audit;
pub mod config;
pub mod policy;
pub mod telemetry;

// Re-export key types at crate root for convenience.
pub use config::GateConfig;
pub use policy::bundle::RemotePolicyBundle;
pub use policy::engine::PolicyEngine;
pub use policy::store::{DeveloperOverride, PolicyStore};
pub use policy::{EvaluationRequest, EvaluationResult, PolicyDecision, RiskLevel};
