//! Background synchronization of the remote policy bundle.
//!
//! The manager owns the bundle lifecycle: fetch, validate, atomic snapshot
//! swap, expiry tracking, and retry on the next timer tick. A failed or
//! invalid fetch never disables enforcement; the last-known-good snapshot
//! stays in force. Concurrent [`PolicySyncManager::sync`] calls while a
//! fetch is in flight coalesce onto that fetch instead of issuing parallel
//! requests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use toolgate_core::config::SyncSettings;
use toolgate_core::policy::store::{DeveloperOverride, PolicyStore};

use crate::client::BundleClient;
use crate::error::{Result, SyncError};
use crate::types::{SyncPhase, SyncStatus};
use crate::vault::VaultSecrets;

/// Result of a single sync attempt, also returned to coalesced callers.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// A fresh bundle was validated and installed.
    Updated { version: u64 },
    /// The fetch or validation failed; the previous snapshot remains in force.
    Failed { reason: String },
}

#[derive(Default)]
struct SyncTarget {
    url: Option<String>,
    auth_account: Option<String>,
}

struct SyncState {
    phase: SyncPhase,
    last_sync_time: Option<DateTime<Utc>>,
    last_error: Option<String>,
    next_sync_time: Option<DateTime<Utc>>,
    policy_version: Option<u64>,
    /// Bumped on every completed attempt; used to coalesce waiters.
    generation: u64,
    last_outcome: Option<SyncOutcome>,
}

/// Owns the remote bundle lifecycle and the sync state machine:
/// `idle -> syncing -> {success, error} -> idle` once the next tick is
/// scheduled.
pub struct PolicySyncManager {
    store: Arc<PolicyStore>,
    vault: Arc<dyn VaultSecrets>,
    client: BundleClient,
    default_refresh: Duration,
    target: Mutex<SyncTarget>,
    state: Mutex<SyncState>,
    /// Serializes fetches; waiters coalesce via the generation counter.
    fetch_lock: tokio::sync::Mutex<()>,
}

impl PolicySyncManager {
    pub fn new(
        store: Arc<PolicyStore>,
        vault: Arc<dyn VaultSecrets>,
        settings: &SyncSettings,
    ) -> Result<Self> {
        Ok(Self::with_client(
            store,
            vault,
            settings,
            BundleClient::new()?,
        ))
    }

    /// Construct with a custom bundle client (for testing with mockito).
    pub fn with_client(
        store: Arc<PolicyStore>,
        vault: Arc<dyn VaultSecrets>,
        settings: &SyncSettings,
        client: BundleClient,
    ) -> Self {
        Self {
            store,
            vault,
            client,
            default_refresh: Duration::from_millis(settings.refresh_interval_ms.max(1)),
            target: Mutex::new(SyncTarget {
                url: settings.policy_url.clone(),
                auth_account: settings.auth_account.clone(),
            }),
            state: Mutex::new(SyncState {
                phase: SyncPhase::Idle,
                last_sync_time: None,
                last_error: None,
                next_sync_time: None,
                policy_version: None,
                generation: 0,
                last_outcome: None,
            }),
            fetch_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Set the sync target. The credential itself stays in the vault under
    /// `auth_account`; this manager only keeps the account key.
    pub fn configure(&self, url: impl Into<String>, auth_account: Option<String>) {
        let mut target = self.target.lock().unwrap_or_else(|e| e.into_inner());
        target.url = Some(url.into());
        target.auth_account = auth_account;
    }

    /// Toggle the developer override on the shared store. Does not touch
    /// held bundle state.
    pub fn set_dev_override(&self, enabled: bool, token: Option<String>) {
        self.store
            .set_dev_override(DeveloperOverride { enabled, token });
    }

    /// Force an immediate sync. Calls made while a fetch is already in
    /// flight wait for it and return its outcome; exactly one network fetch
    /// is issued.
    pub async fn sync(&self) -> SyncOutcome {
        let entry_generation = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.generation
        };

        let _guard = self.fetch_lock.lock().await;

        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.generation != entry_generation {
                // Another sync completed while we waited for the lock.
                if let Some(outcome) = state.last_outcome.clone() {
                    debug!("coalesced onto an in-flight sync");
                    return outcome;
                }
            }
            state.phase = SyncPhase::Syncing;
        }

        let outcome = self.fetch_once().await;
        self.finish(outcome.clone());
        outcome
    }

    /// One fetch attempt against the configured target. The auth token is
    /// resolved from the vault here and dropped when the request completes.
    async fn fetch_once(&self) -> SyncOutcome {
        let (url, auth_account) = {
            let target = self.target.lock().unwrap_or_else(|e| e.into_inner());
            (target.url.clone(), target.auth_account.clone())
        };
        let Some(url) = url else {
            return SyncOutcome::Failed {
                reason: SyncError::NotConfigured.to_string(),
            };
        };

        let token = match auth_account {
            Some(account) => match self.vault.get(&account) {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "failed to resolve sync auth token");
                    return SyncOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            },
            None => None,
        };

        let doc = match self.client.fetch(&url, token.as_deref()).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "bundle fetch failed; previous snapshot remains in force");
                return SyncOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        match doc.into_bundle(Utc::now()) {
            Ok(bundle) => {
                let version = bundle.version;
                if let Some(held) = self.store.snapshot().bundle {
                    if version < held.version {
                        info!(
                            held = held.version,
                            fetched = version,
                            "server rolled the bundle version back; applying anyway"
                        );
                    }
                }
                self.store.install_bundle(bundle);
                info!(version, "policy bundle updated");
                SyncOutcome::Updated { version }
            }
            Err(e) => {
                warn!(error = %e, "fetched bundle failed validation; previous snapshot remains in force");
                SyncOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Record the attempt, schedule the next tick, and return to idle.
    fn finish(&self, outcome: SyncOutcome) {
        let now = Utc::now();
        let refresh = self.refresh_interval();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.generation += 1;
        match &outcome {
            SyncOutcome::Updated { version } => {
                state.phase = SyncPhase::Success;
                state.last_sync_time = Some(now);
                state.last_error = None;
                state.policy_version = Some(*version);
            }
            SyncOutcome::Failed { reason } => {
                state.phase = SyncPhase::Error;
                state.last_error = Some(reason.clone());
            }
        }
        state.next_sync_time = now
            .checked_add_signed(chrono::Duration::milliseconds(refresh.as_millis() as i64));
        // Next tick scheduled: the machine is idle again.
        state.phase = SyncPhase::Idle;
        state.last_outcome = Some(outcome);
    }

    /// Refresh interval: the held bundle's suggestion, else the default.
    fn refresh_interval(&self) -> Duration {
        self.store
            .snapshot()
            .bundle
            .as_deref()
            .and_then(|b| b.refresh_interval_ms)
            .map(Duration::from_millis)
            .unwrap_or(self.default_refresh)
    }

    /// Background timer loop. Runs until `shutdown` flips; an in-flight
    /// fetch abandoned at shutdown cannot corrupt the held snapshot, which
    /// is only replaced on full success.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            let delay = self.refresh_interval();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    match self.sync().await {
                        SyncOutcome::Updated { version } => {
                            debug!(version, "scheduled sync applied");
                        }
                        SyncOutcome::Failed { reason } => {
                            warn!(%reason, "scheduled sync failed; retrying next tick");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("policy sync loop shutting down");
                    return;
                }
            }
        }
    }

    /// Read-only status snapshot for the operator surface.
    pub fn status(&self) -> SyncStatus {
        let snapshot = self.store.snapshot();
        let bundle = snapshot.bundle.as_deref();
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let target = self.target.lock().unwrap_or_else(|e| e.into_inner());

        SyncStatus {
            url: target.url.clone(),
            has_bundle: bundle.is_some(),
            policy_version: bundle.map(|b| b.version),
            fetched_at: bundle.map(|b| b.fetched_at),
            expires_at: bundle.and_then(|b| b.expires_at),
            is_expired: bundle.is_some_and(|b| b.is_expired()),
            allowlist_entries: bundle
                .and_then(|b| b.domain_allowlist.as_ref().map(Vec::len))
                .unwrap_or(0),
            blocklist_entries: bundle
                .and_then(|b| b.domain_blocklist.as_ref().map(Vec::len))
                .unwrap_or(0),
            tool_restriction_entries: bundle.map(|b| b.tool_restrictions.len()).unwrap_or(0),
            time_rule_entries: bundle.map(|b| b.time_based_rules.len()).unwrap_or(0),
            message: bundle.and_then(|b| b.message.clone()),
            dev_override: snapshot.dev_override.in_force(),
            phase: state.phase,
            last_sync_time: state.last_sync_time,
            last_error: state.last_error.clone(),
            next_sync_time: state.next_sync_time,
        }
    }
}
