//! Remote policy bundle synchronization for toolgate.
//!
//! This crate provides:
//! - Wire format types for the remote policy endpoint (camelCase JSON)
//! - Async HTTP bundle client with bearer-token auth
//! - A sync manager owning the fetch/validate/install lifecycle and a
//!   background refresh loop
//! - A vault seam so the auth credential never lives in the sync state
//!
//! A failed or invalid fetch never weakens enforcement: the last
//! successfully installed bundle stays in force until the next success.

pub mod client;
pub mod error;
pub mod manager;
pub mod types;
pub mod vault;

// Re-export key types at crate root for convenience.
pub use client::BundleClient;
pub use error::SyncError;
pub use manager::{PolicySyncManager, SyncOutcome};
pub use types::{BundleDocument, SyncPhase, SyncStatus};
pub use vault::{InMemoryVault, VaultSecrets};
