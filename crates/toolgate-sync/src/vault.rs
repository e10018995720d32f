//! Secret storage seam for the sync auth token.
//!
//! The real vault (OS keychain, secret service) lives outside this crate;
//! the manager resolves the token through this trait per fetch and never
//! holds it longer than the in-flight request.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, SyncError};

/// Get/set/delete secrets by account key.
pub trait VaultSecrets: Send + Sync {
    fn get(&self, account: &str) -> Result<Option<String>>;
    fn set(&self, account: &str, secret: &str) -> Result<()>;
    fn delete(&self, account: &str) -> Result<()>;
}

/// In-memory vault for tests and local development.
#[derive(Default)]
pub struct InMemoryVault {
    secrets: Mutex<HashMap<String, String>>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VaultSecrets for InMemoryVault {
    fn get(&self, account: &str) -> Result<Option<String>> {
        let secrets = self
            .secrets
            .lock()
            .map_err(|e| SyncError::VaultError(e.to_string()))?;
        Ok(secrets.get(account).cloned())
    }

    fn set(&self, account: &str, secret: &str) -> Result<()> {
        let mut secrets = self
            .secrets
            .lock()
            .map_err(|e| SyncError::VaultError(e.to_string()))?;
        secrets.insert(account.to_string(), secret.to_string());
        Ok(())
    }

    fn delete(&self, account: &str) -> Result<()> {
        let mut secrets = self
            .secrets
            .lock()
            .map_err(|e| SyncError::VaultError(e.to_string()))?;
        secrets.remove(account);
        Ok(())
    }
}
