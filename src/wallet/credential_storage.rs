// src/wallet/credential_storage.rs
//! In-memory identity storage.
//!
//! Provides a [`CredentialStore`] backed by a hashmap. It honours the same
//! write-once contract as the file system wallet and is the store behind
//! service-level tests.

use crate::error::{WalletError, WalletResult};
use crate::models::identity::{validate_label, Identity};
use crate::wallet::CredentialStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for wallet identities.
///
/// This storage provides:
/// - Thread-safe access through a read/write lock
/// - Atomic check-and-insert (`put` holds the write lock for both steps)
/// - Concurrent readers for `exists`, `get` and `list`
#[derive(Default)]
pub struct MemoryWallet {
    /// Identities keyed by label
    identities: RwLock<HashMap<String, Identity>>,
}

impl MemoryWallet {
    /// Creates a new empty MemoryWallet instance.
    pub fn new() -> Self {
        MemoryWallet::default()
    }

    /// Returns the number of stored identities.
    pub fn count(&self) -> usize {
        self.identities.read().map(|map| map.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CredentialStore for MemoryWallet {
    async fn exists(&self, label: &str) -> bool {
        self.identities
            .read()
            .map(|map| map.contains_key(label))
            .unwrap_or(false)
    }

    /// Stores an identity under `label`.
    ///
    /// # Behavior
    /// - Fails with `AlreadyExists` if the label is taken; the stored record is kept
    /// - Never overwrites
    async fn put(&self, label: &str, identity: &Identity) -> WalletResult<()> {
        validate_label(label)?;
        let mut map = self
            .identities
            .write()
            .map_err(|_| WalletError::StoreIo(std::io::Error::other("wallet lock poisoned")))?;
        if map.contains_key(label) {
            return Err(WalletError::AlreadyExists(label.to_string()));
        }
        map.insert(label.to_string(), identity.clone());
        Ok(())
    }

    async fn get(&self, label: &str) -> WalletResult<Identity> {
        self.identities
            .read()
            .map_err(|_| WalletError::StoreIo(std::io::Error::other("wallet lock poisoned")))?
            .get(label)
            .cloned()
            .ok_or_else(|| WalletError::NotFound(label.to_string()))
    }

    async fn list(&self) -> WalletResult<Vec<String>> {
        let mut labels: Vec<String> = self
            .identities
            .read()
            .map_err(|_| WalletError::StoreIo(std::io::Error::other("wallet lock poisoned")))?
            .keys()
            .cloned()
            .collect();
        labels.sort();
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::{EnrollmentMaterial, Role};
    use std::sync::Arc;

    fn create_test_identity(cert: &str) -> Identity {
        Identity::new(
            "Org1MSP",
            EnrollmentMaterial {
                certificate: cert.to_string(),
                private_key: "KEYDATA".to_string(),
            },
            Role::None,
        )
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let wallet = MemoryWallet::new();
        assert!(!wallet.exists("alice").await);

        let identity = create_test_identity("CERT-A");
        wallet.put("alice", &identity).await.unwrap();

        assert!(wallet.exists("alice").await);
        assert_eq!(wallet.get("alice").await.unwrap(), identity);
        assert_eq!(wallet.count(), 1);
    }

    #[tokio::test]
    async fn test_second_put_keeps_original() {
        let wallet = MemoryWallet::new();
        let original = create_test_identity("CERT-A");
        wallet.put("alice", &original).await.unwrap();

        let result = wallet.put("alice", &create_test_identity("CERT-B")).await;
        assert!(matches!(result, Err(WalletError::AlreadyExists(label)) if label == "alice"));
        assert_eq!(wallet.get("alice").await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_get_missing() {
        let wallet = MemoryWallet::new();
        assert!(matches!(wallet.get("bob").await, Err(WalletError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_concurrent_puts_single_winner() {
        let wallet = Arc::new(MemoryWallet::new());
        let attempts = (0..16).map(|i| {
            let wallet = wallet.clone();
            tokio::spawn(async move {
                wallet
                    .put("carol", &create_test_identity(&format!("CERT-{}", i)))
                    .await
            })
        });

        let results = futures::future::join_all(attempts).await;
        let successes = results.iter().filter(|r| matches!(r, Ok(Ok(())))).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Ok(Err(WalletError::AlreadyExists(_)))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 15);
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let wallet = MemoryWallet::new();
        wallet.put("zed", &create_test_identity("Z")).await.unwrap();
        wallet.put("amy", &create_test_identity("A")).await.unwrap();
        assert_eq!(wallet.list().await.unwrap(), vec!["amy", "zed"]);
    }
}
