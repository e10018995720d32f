//! Application settings and TOML configuration parsing.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::policy::RiskLevel;

/// Top-level toolgate configuration, loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Decision-pipeline settings.
    #[serde(default)]
    pub policy: PolicySettings,

    /// Audit log settings.
    #[serde(default)]
    pub audit: AuditSettings,

    /// Remote policy sync settings.
    #[serde(default)]
    pub sync: SyncSettings,
}

impl GateConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: GateConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Write configuration to a TOML file at `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// Decision-pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySettings {
    /// Per-user-mode approval threshold: the lowest risk level at which the
    /// risk-based default escalates to needs-approval. Modes absent from the
    /// table use the `"standard"` entry.
    #[serde(default = "default_approval_thresholds")]
    pub approval_thresholds: HashMap<String, RiskLevel>,

    /// Additional tool names treated as dangerous, on top of the built-in
    /// deny floor. Extensions can only add entries, never remove built-ins.
    #[serde(default)]
    pub dangerous_tools: Vec<String>,

    /// Additional tool names treated as read-only in observe-only sessions.
    #[serde(default)]
    pub observe_safe_tools: Vec<String>,
}

fn default_approval_thresholds() -> HashMap<String, RiskLevel> {
    let mut table = HashMap::new();
    table.insert("standard".to_string(), RiskLevel::Medium);
    table.insert("admin".to_string(), RiskLevel::High);
    table
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            approval_thresholds: default_approval_thresholds(),
            dangerous_tools: Vec::new(),
            observe_safe_tools: Vec::new(),
        }
    }
}

impl PolicySettings {
    /// The approval threshold for `user_mode`. Unknown modes fall back to
    /// the `"standard"` entry, and to `Medium` if even that is absent.
    pub fn approval_threshold(&self, user_mode: &str) -> RiskLevel {
        self.approval_thresholds
            .get(user_mode)
            .or_else(|| self.approval_thresholds.get("standard"))
            .copied()
            .unwrap_or(RiskLevel::Medium)
    }
}

/// Audit log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Path to the JSON-lines audit log file.
    #[serde(default = "default_audit_log_path")]
    pub log_path: PathBuf,

    /// Maximum log file size in megabytes before rotation.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Number of rotated files to keep.
    #[serde(default = "default_max_files")]
    pub max_files: u32,
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("toolgate-audit.jsonl")
}

fn default_max_size_mb() -> u64 {
    50
}

fn default_max_files() -> u32 {
    5
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            log_path: default_audit_log_path(),
            max_size_mb: default_max_size_mb(),
            max_files: default_max_files(),
        }
    }
}

/// Remote policy sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Remote policy endpoint URL. Sync stays disabled until set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_url: Option<String>,

    /// Vault account key under which the auth token is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_account: Option<String>,

    /// Refresh interval used when the bundle does not suggest one.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

fn default_refresh_interval_ms() -> u64 {
    5 * 60 * 1000
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            policy_url: None,
            auth_account: None,
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thresholds() {
        let settings = PolicySettings::default();
        assert_eq!(settings.approval_threshold("standard"), RiskLevel::Medium);
        assert_eq!(settings.approval_threshold("admin"), RiskLevel::High);
    }

    #[test]
    fn unknown_mode_falls_back_to_standard() {
        let settings = PolicySettings::default();
        assert_eq!(settings.approval_threshold("kiosk"), RiskLevel::Medium);
    }

    #[test]
    fn empty_table_falls_back_to_medium() {
        let settings = PolicySettings {
            approval_thresholds: HashMap::new(),
            ..Default::default()
        };
        assert_eq!(settings.approval_threshold("standard"), RiskLevel::Medium);
    }

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: GateConfig = toml::from_str("").unwrap();
        assert_eq!(config.audit.max_size_mb, 50);
        assert_eq!(config.sync.refresh_interval_ms, 300_000);
        assert!(config.sync.policy_url.is_none());
    }

    #[test]
    fn parse_partial_config() {
        let config: GateConfig = toml::from_str(
            r#"
[sync]
policy_url = "https://policy.example.com/bundle"
refresh_interval_ms = 60000

[policy.approval_thresholds]
standard = "MEDIUM"
operator = "HIGH"
"#,
        )
        .unwrap();
        assert_eq!(
            config.sync.policy_url.as_deref(),
            Some("https://policy.example.com/bundle")
        );
        assert_eq!(config.sync.refresh_interval_ms, 60_000);
        assert_eq!(config.policy.approval_threshold("operator"), RiskLevel::High);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.toml");

        let mut config = GateConfig::default();
        config.sync.policy_url = Some("https://policy.example.com/v1".to_string());
        config.policy.dangerous_tools.push("db_drop".to_string());
        config.save(&path).unwrap();

        let loaded = GateConfig::load(&path).unwrap();
        assert_eq!(
            loaded.sync.policy_url.as_deref(),
            Some("https://policy.example.com/v1")
        );
        assert_eq!(loaded.policy.dangerous_tools, vec!["db_drop".to_string()]);
    }

    #[test]
    fn load_missing_file_errors() {
        assert!(GateConfig::load(Path::new("/nonexistent/gate.toml")).is_err());
    }
}
