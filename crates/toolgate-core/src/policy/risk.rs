//! Static risk classification for tools and domains.
//!
//! Pure lookups with no I/O, safe to call on every evaluation. Unknown
//! entries default to [`RiskLevel::Medium`]: fail toward caution, not toward
//! permissiveness or paranoia.

use super::RiskLevel;

/// Baseline risk of a tool by name.
pub fn tool_risk(tool_name: &str) -> RiskLevel {
    match tool_name {
        // Pure observation, no host state touched.
        "browser_observe" | "browser_screenshot" | "browser_read_page" => RiskLevel::Low,
        // Ordinary page interaction.
        "browser_navigate" | "browser_click" | "browser_scroll" | "browser_type"
        | "browser_select" => RiskLevel::Medium,
        // Writes, downloads, code, credentials.
        "browser_download" | "browser_upload" | "file_write" | "code_execute"
        | "credentials_fill" => RiskLevel::High,
        _ => RiskLevel::Medium,
    }
}

/// Baseline risk of a target domain.
///
/// An empty domain means the tool has no network target (e.g. local file
/// tools); it contributes no risk of its own.
pub fn domain_risk(domain: &str) -> RiskLevel {
    if domain.is_empty() {
        return RiskLevel::Low;
    }
    match domain {
        "localhost" | "127.0.0.1" | "[::1]" => RiskLevel::Low,
        d if d.starts_with("admin.") || d.starts_with("internal.") || d.starts_with("vpn.") => {
            RiskLevel::High
        }
        _ => RiskLevel::Medium,
    }
}
