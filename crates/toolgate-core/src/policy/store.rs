//! Shared policy state: the current bundle snapshot and developer override.
//!
//! This is the single mutable resource shared between the engine and the
//! sync manager. Bundles are immutable; the store swaps `Arc` snapshots
//! atomically under a lock held only long enough to clone a reference, so
//! evaluation never blocks on an in-progress sync.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bundle::RemotePolicyBundle;

/// Local bypass of remote policy for development and testing.
///
/// In force only when enabled with a non-empty token; never persisted across
/// process restarts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeveloperOverride {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl DeveloperOverride {
    /// Whether the override actually bypasses remote policy.
    pub fn in_force(&self) -> bool {
        self.enabled && self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// A consistent read of the store at one instant.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    pub bundle: Option<Arc<RemotePolicyBundle>>,
    pub dev_override: DeveloperOverride,
}

impl PolicySnapshot {
    /// The bundle the rule evaluators should consult: present, unexpired as
    /// of `now`, and not bypassed by the developer override.
    pub fn active_bundle(&self, now: DateTime<Utc>) -> Option<&RemotePolicyBundle> {
        if self.dev_override.in_force() {
            return None;
        }
        self.bundle
            .as_deref()
            .filter(|bundle| !bundle.is_expired_at(now))
    }
}

struct StoreInner {
    bundle: Option<Arc<RemotePolicyBundle>>,
    dev_override: DeveloperOverride,
}

/// Lock-protected holder of the current policy snapshot.
pub struct PolicyStore {
    inner: Mutex<StoreInner>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                bundle: None,
                dev_override: DeveloperOverride::default(),
            }),
        }
    }

    /// Read a consistent snapshot. Clones an `Arc`, never copies rule data.
    pub fn snapshot(&self) -> PolicySnapshot {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        PolicySnapshot {
            bundle: inner.bundle.clone(),
            dev_override: inner.dev_override.clone(),
        }
    }

    /// Atomically replace the held bundle with a freshly fetched one.
    pub fn install_bundle(&self, bundle: RemotePolicyBundle) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.bundle = Some(Arc::new(bundle));
    }

    /// Drop the held bundle, falling back to built-in rules only.
    pub fn clear_bundle(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.bundle = None;
    }

    /// Toggle the developer override. Does not touch the held bundle.
    pub fn set_dev_override(&self, dev_override: DeveloperOverride) {
        if dev_override.enabled && !dev_override.in_force() {
            tracing::warn!("developer override enabled without a token; not in force");
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.dev_override = dev_override;
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}
