// src/wallet/file_store.rs
//! File system wallet.
//!
//! One directory per organization, one JSON file per identity:
//! `<base>/<org>/<label>.id`. The file layout is the one written by the
//! Fabric 2.x SDKs, with an optional `roles` array for administrators.
//!
//! Writes go to a hidden temporary file first and are committed with a hard
//! link. Linking fails if the target exists, so the existence check and the
//! write happen as one step even across processes, and a write interrupted
//! before the link leaves nothing visible under the label. Temporary files
//! orphaned by a put that never finished are swept when the wallet is opened.

use crate::error::{WalletError, WalletResult};
use crate::models::identity::{validate_label, Identity, Role};
use crate::models::organization::Organization;
use crate::utils::serialization::{deserialize, serialize_pretty};
use crate::wallet::CredentialStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const ID_EXTENSION: &str = "id";
const IDENTITY_TYPE: &str = "X.509";
const TEMPORARY_SUFFIX: &str = ".tmp";

/// Temporary files at least this old belong to no running put.
const STALE_TEMPORARY_AGE: Duration = Duration::from_secs(600);

/// Credentials section of a wallet file.
#[derive(Serialize, Deserialize)]
struct StoredCredentials {
    certificate: String,
    #[serde(rename = "privateKey")]
    private_key: String,
}

/// On-disk representation of an [`Identity`].
#[derive(Serialize, Deserialize)]
struct StoredIdentity {
    credentials: StoredCredentials,
    #[serde(rename = "mspId")]
    msp_id: String,
    #[serde(rename = "type")]
    identity_type: String,
    version: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    roles: Vec<String>,
}

impl From<&Identity> for StoredIdentity {
    fn from(identity: &Identity) -> Self {
        let roles = match identity.role {
            Role::Admin => vec![Role::Admin.as_str().to_string()],
            Role::None => Vec::new(),
        };
        StoredIdentity {
            credentials: StoredCredentials {
                certificate: identity.certificate.clone(),
                private_key: identity.private_key.clone(),
            },
            msp_id: identity.msp_id.clone(),
            identity_type: IDENTITY_TYPE.to_string(),
            version: 1,
            roles,
        }
    }
}

impl From<StoredIdentity> for Identity {
    fn from(stored: StoredIdentity) -> Self {
        let role = if stored
            .roles
            .iter()
            .any(|r| r.eq_ignore_ascii_case(Role::Admin.as_str()))
        {
            Role::Admin
        } else {
            Role::None
        };
        Identity {
            msp_id: stored.msp_id,
            certificate: stored.credentials.certificate,
            private_key: stored.credentials.private_key,
            role,
        }
    }
}

/// Opens organization wallets below a common base directory.
#[derive(Debug, Clone)]
pub struct Wallets {
    base: PathBuf,
}

impl Wallets {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Wallets { base: base.into() }
    }

    /// Opens (creating if needed) the wallet of `org`.
    pub async fn open(&self, org: &Organization) -> WalletResult<FileSystemWallet> {
        FileSystemWallet::open(self.base.join(org.name())).await
    }
}

/// Persistent wallet of a single organization.
#[derive(Debug, Clone)]
pub struct FileSystemWallet {
    root: PathBuf,
}

impl FileSystemWallet {
    /// Opens the wallet rooted at `root`, creating an empty one if absent.
    pub async fn open(root: impl AsRef<Path>) -> WalletResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        let wallet = FileSystemWallet { root };
        if let Err(e) = wallet.remove_stale_temporaries().await {
            log::warn!(
                "Could not sweep temporary files in {}: {}",
                wallet.path().display(),
                e
            );
        }
        Ok(wallet)
    }

    /// Directory holding this organization's identity files.
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn identity_path(&self, label: &str) -> PathBuf {
        self.root.join(format!("{}.{}", label, ID_EXTENSION))
    }

    fn temporary_path(&self, label: &str) -> PathBuf {
        self.root.join(format!(
            ".{}.{:016x}{}",
            label,
            rand::random::<u64>(),
            TEMPORARY_SUFFIX
        ))
    }

    /// Removes hidden temporary files older than [`STALE_TEMPORARY_AGE`].
    ///
    /// Younger files may belong to a put in flight in another process and are
    /// kept.
    ///
    /// # Returns
    /// Number of files removed
    async fn remove_stale_temporaries(&self) -> std::io::Result<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(self.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let is_temporary = name
                .to_str()
                .map_or(false, |n| n.starts_with('.') && n.ends_with(TEMPORARY_SUFFIX));
            if !is_temporary {
                continue;
            }

            let metadata = entry.metadata().await?;
            let age = metadata.modified()?.elapsed().unwrap_or_default();
            if !metadata.is_file() || age < STALE_TEMPORARY_AGE {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    log::warn!("Removed stale temporary wallet file {}", entry.path().display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    async fn write_temporary(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(contents).await?;
        file.sync_all().await
    }
}

#[async_trait]
impl CredentialStore for FileSystemWallet {
    async fn exists(&self, label: &str) -> bool {
        if validate_label(label).is_err() {
            return false;
        }
        fs::try_exists(self.identity_path(label))
            .await
            .unwrap_or(false)
    }

    async fn put(&self, label: &str, identity: &Identity) -> WalletResult<()> {
        validate_label(label)?;
        let contents = serialize_pretty(&StoredIdentity::from(identity)).map_err(|source| {
            WalletError::CorruptRecord {
                label: label.to_string(),
                source,
            }
        })?;

        let temporary = self.temporary_path(label);
        if let Err(e) = Self::write_temporary(&temporary, &contents).await {
            let _ = fs::remove_file(&temporary).await;
            return Err(e.into());
        }

        let committed = fs::hard_link(&temporary, self.identity_path(label)).await;
        if let Err(e) = fs::remove_file(&temporary).await {
            log::warn!("Could not remove temporary wallet file {}: {}", temporary.display(), e);
        }

        match committed {
            Ok(()) => {
                log::debug!("Stored identity \"{}\" in {}", label, self.root.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(WalletError::AlreadyExists(label.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, label: &str) -> WalletResult<Identity> {
        if validate_label(label).is_err() {
            return Err(WalletError::NotFound(label.to_string()));
        }
        let contents = match fs::read(self.identity_path(label)).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(WalletError::NotFound(label.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let stored: StoredIdentity =
            deserialize(&contents).map_err(|source| WalletError::CorruptRecord {
                label: label.to_string(),
                source,
            })?;
        Ok(stored.into())
    }

    async fn list(&self) -> WalletResult<Vec<String>> {
        let mut labels = Vec::new();
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(labels),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ID_EXTENSION) {
                continue;
            }
            if let Some(label) = path.file_stem().and_then(|stem| stem.to_str()) {
                if !label.starts_with('.') {
                    labels.push(label.to_string());
                }
            }
        }

        labels.sort();
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::EnrollmentMaterial;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_identity(cert: &str, role: Role) -> Identity {
        Identity::new(
            "Org1MSP",
            EnrollmentMaterial {
                certificate: cert.to_string(),
                private_key: "KEYDATA".to_string(),
            },
            role,
        )
    }

    #[tokio::test]
    async fn test_open_creates_empty_wallet() {
        let dir = TempDir::new().unwrap();
        let wallets = Wallets::new(dir.path().join("wallet"));
        let wallet = wallets.open(&Organization::parse("1").unwrap()).await.unwrap();

        assert!(wallet.path().is_dir());
        assert!(wallet.path().ends_with("wallet/1"));
        assert!(!wallet.exists("alice").await);
        assert!(wallet.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exists_on_vanished_directory() {
        let dir = TempDir::new().unwrap();
        let wallet = FileSystemWallet::open(dir.path().join("org1")).await.unwrap();
        std::fs::remove_dir(wallet.path()).unwrap();
        assert!(!wallet.exists("alice").await);
        assert!(!wallet.exists("../alice").await);
    }

    #[tokio::test]
    async fn test_round_trip_and_persistence() {
        let dir = TempDir::new().unwrap();
        let identity = create_test_identity("CERT-A", Role::Admin);
        {
            let wallet = FileSystemWallet::open(dir.path()).await.unwrap();
            wallet.put("Admin", &identity).await.unwrap();
        }

        let reopened = FileSystemWallet::open(dir.path()).await.unwrap();
        assert!(reopened.exists("Admin").await);
        assert_eq!(reopened.get("Admin").await.unwrap(), identity);
    }

    #[tokio::test]
    async fn test_file_layout() {
        let dir = TempDir::new().unwrap();
        let wallet = FileSystemWallet::open(dir.path()).await.unwrap();
        wallet
            .put("alice", &create_test_identity("CERT-A", Role::None))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join("alice.id")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["mspId"], "Org1MSP");
        assert_eq!(json["type"], "X.509");
        assert_eq!(json["version"], 1);
        assert_eq!(json["credentials"]["certificate"], "CERT-A");
        assert_eq!(json["credentials"]["privateKey"], "KEYDATA");
        assert!(json.get("roles").is_none());
    }

    #[tokio::test]
    async fn test_second_put_keeps_original() {
        let dir = TempDir::new().unwrap();
        let wallet = FileSystemWallet::open(dir.path()).await.unwrap();
        let original = create_test_identity("CERT-A", Role::None);
        wallet.put("alice", &original).await.unwrap();

        let result = wallet
            .put("alice", &create_test_identity("CERT-B", Role::Admin))
            .await;
        assert!(matches!(result, Err(WalletError::AlreadyExists(_))));
        assert_eq!(wallet.get("alice").await.unwrap(), original);
        assert_eq!(wallet.list().await.unwrap(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_concurrent_puts_single_winner() {
        let dir = TempDir::new().unwrap();
        let wallet = Arc::new(FileSystemWallet::open(dir.path()).await.unwrap());

        let attempts = (0..12).map(|i| {
            let wallet = wallet.clone();
            tokio::spawn(async move {
                wallet
                    .put("dave", &create_test_identity(&format!("CERT-{}", i), Role::None))
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
        assert_eq!(conflicts, 11);

        // No temporary files left behind.
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_get_missing_and_corrupt() {
        let dir = TempDir::new().unwrap();
        let wallet = FileSystemWallet::open(dir.path()).await.unwrap();
        assert!(matches!(wallet.get("ghost").await, Err(WalletError::NotFound(_))));

        std::fs::write(dir.path().join("broken.id"), b"{not json").unwrap();
        assert!(matches!(
            wallet.get("broken").await,
            Err(WalletError::CorruptRecord { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_ignores_temporary_files() {
        let dir = TempDir::new().unwrap();
        let wallet = FileSystemWallet::open(dir.path()).await.unwrap();
        wallet
            .put("bob", &create_test_identity("B", Role::None))
            .await
            .unwrap();
        std::fs::write(dir.path().join(".eve.0000000000000001.tmp"), b"{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        assert_eq!(wallet.list().await.unwrap(), vec!["bob"]);
        assert!(!wallet.exists("eve").await);
    }

    fn age_file(path: &Path, age: Duration) {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(std::time::SystemTime::now() - age)
            .unwrap();
    }

    #[tokio::test]
    async fn test_open_removes_stale_temporary_files() {
        let dir = TempDir::new().unwrap();
        let wallet = FileSystemWallet::open(dir.path()).await.unwrap();
        wallet
            .put("bob", &create_test_identity("B", Role::None))
            .await
            .unwrap();

        let stale = dir.path().join(".eve.00000000000000ff.tmp");
        let fresh = dir.path().join(".carol.0000000000000002.tmp");
        std::fs::write(&stale, b"{").unwrap();
        std::fs::write(&fresh, b"{").unwrap();
        age_file(&stale, Duration::from_secs(3600));

        let reopened = FileSystemWallet::open(dir.path()).await.unwrap();
        assert!(!stale.exists());
        assert!(fresh.exists());
        assert_eq!(reopened.get("bob").await.unwrap().certificate, "B");
    }

    #[tokio::test]
    async fn test_sweep_leaves_identity_files_alone() {
        let dir = TempDir::new().unwrap();
        let wallet = FileSystemWallet::open(dir.path()).await.unwrap();
        wallet
            .put("alice", &create_test_identity("A", Role::None))
            .await
            .unwrap();
        age_file(&dir.path().join("alice.id"), Duration::from_secs(3600));
        std::fs::write(dir.path().join("old.tmp"), b"").unwrap();
        age_file(&dir.path().join("old.tmp"), Duration::from_secs(3600));

        assert_eq!(wallet.remove_stale_temporaries().await.unwrap(), 0);
        assert!(wallet.exists("alice").await);
        assert!(dir.path().join("old.tmp").exists());
    }

    #[tokio::test]
    async fn test_organizations_are_isolated() {
        let dir = TempDir::new().unwrap();
        let wallets = Wallets::new(dir.path());
        let org1 = wallets.open(&Organization::parse("1").unwrap()).await.unwrap();
        let org2 = wallets.open(&Organization::parse("2").unwrap()).await.unwrap();

        org1.put("alice", &create_test_identity("A1", Role::None))
            .await
            .unwrap();
        assert!(!org2.exists("alice").await);
        org2.put("alice", &create_test_identity("A2", Role::None))
            .await
            .unwrap();
        assert_eq!(org1.get("alice").await.unwrap().certificate, "A1");
    }
}
