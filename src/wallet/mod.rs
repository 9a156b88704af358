// src/wallet/mod.rs
//! Per-organization identity wallets.
//!
//! A wallet maps labels to [`Identity`] records. Records are write-once:
//! there is no update or delete, and a second `put` on a label fails with
//! [`WalletError::AlreadyExists`](crate::error::WalletError::AlreadyExists)
//! without touching the stored record.

pub mod auth_token;
#[cfg(test)]
pub mod credential_storage;
pub mod file_store;
pub mod importer;
pub mod key_management;

use crate::error::WalletResult;
use crate::models::identity::Identity;
use async_trait::async_trait;

/// Storage contract of an organization wallet.
///
/// Implemented by the file system wallet; tests also use an in-memory wallet.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Whether a record is stored under `label`. Never fails.
    async fn exists(&self, label: &str) -> bool;

    /// Stores a record; the check for an existing label and the write are atomic.
    async fn put(&self, label: &str, identity: &Identity) -> WalletResult<()>;

    /// Fetches a copy of the record stored under `label`.
    async fn get(&self, label: &str) -> WalletResult<Identity>;

    /// Labels of all stored records, sorted.
    async fn list(&self) -> WalletResult<Vec<String>>;
}
