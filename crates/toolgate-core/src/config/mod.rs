//! Configuration loading and settings types.

pub mod settings;

pub use settings::{AuditSettings, GateConfig, PolicySettings, SyncSettings};
