// src/wallet/importer.rs
//! Identity import from cryptogen output.
//!
//! `cryptogen` lays out every principal's MSP material as
//!
//! ```text
//! <root>/peerOrganizations/<domain>/users/<P>@<domain>/msp/
//!     signcerts/<P>@<domain>-cert.pem
//!     keystore/<single private key file>
//! ```
//!
//! The importer reads that material and writes a wallet record. Source
//! files are only read, never modified.

use crate::error::{WalletError, WalletResult};
use crate::models::identity::{validate_label, EnrollmentMaterial, Identity, Role};
use crate::models::organization::Organization;
use crate::wallet::CredentialStore;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Path convention of a cryptogen `crypto-config` tree.
#[derive(Debug, Clone)]
pub struct CryptoConfigLayout {
    root: PathBuf,
}

impl CryptoConfigLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CryptoConfigLayout { root: root.into() }
    }

    /// MSP directory of `principal` in `org`.
    pub fn msp_dir(&self, org: &Organization, principal: &str) -> PathBuf {
        let domain = org.domain();
        self.root
            .join("peerOrganizations")
            .join(&domain)
            .join("users")
            .join(format!("{}@{}", principal, domain))
            .join("msp")
    }

    /// Signing certificate of `principal` in `org`.
    pub fn certificate_path(&self, org: &Organization, principal: &str) -> PathBuf {
        let domain = org.domain();
        self.msp_dir(org, principal)
            .join("signcerts")
            .join(format!("{}@{}-cert.pem", principal, domain))
    }

    pub fn keystore_dir(&self, org: &Organization, principal: &str) -> PathBuf {
        self.msp_dir(org, principal).join("keystore")
    }

    /// Reads the certificate and the single keystore key of `principal`.
    ///
    /// # Errors
    /// - `PrincipalNotProvisioned` if the MSP directory or the certificate is missing
    /// - `KeyMaterialMissing` if the keystore is absent, empty or its key unreadable
    /// - `AmbiguousKeyMaterial` if the keystore holds more than one file
    pub async fn read_material(
        &self,
        org: &Organization,
        principal: &str,
    ) -> WalletResult<EnrollmentMaterial> {
        let msp_dir = self.msp_dir(org, principal);
        if !fs::try_exists(&msp_dir).await.unwrap_or(false) {
            return Err(not_provisioned(org, principal, msp_dir));
        }

        let cert_path = self.certificate_path(org, principal);
        let certificate = match fs::read_to_string(&cert_path).await {
            Ok(certificate) => certificate,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(not_provisioned(org, principal, cert_path))
            }
            Err(e) => return Err(e.into()),
        };

        let key_path = single_key_file(&self.keystore_dir(org, principal)).await?;
        let private_key = fs::read_to_string(&key_path)
            .await
            .map_err(|_| WalletError::KeyMaterialMissing(key_path.clone()))?;

        Ok(EnrollmentMaterial {
            certificate,
            private_key,
        })
    }
}

fn not_provisioned(org: &Organization, principal: &str, path: PathBuf) -> WalletError {
    WalletError::PrincipalNotProvisioned {
        principal: principal.to_string(),
        organization: org.name().to_string(),
        path,
    }
}

/// Locates the only regular file in a keystore directory.
async fn single_key_file(keystore: &Path) -> WalletResult<PathBuf> {
    let mut entries = match fs::read_dir(keystore).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(WalletError::KeyMaterialMissing(keystore.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }

    match files.len() {
        0 => Err(WalletError::KeyMaterialMissing(keystore.to_path_buf())),
        1 => Ok(files.remove(0)),
        count => Err(WalletError::AmbiguousKeyMaterial {
            path: keystore.to_path_buf(),
            count,
        }),
    }
}

/// Imports certificate and key material under `label` with the given role.
///
/// The record gets the organization's MSP id. Callers decide the role:
/// cryptogen imports use [`Role::for_label`], CA-registered users always get
/// [`Role::None`].
///
/// # Errors
/// `AlreadyExists` if the label is taken; the wallet is left unchanged.
pub async fn import_identity(
    store: &dyn CredentialStore,
    org: &Organization,
    label: &str,
    material: EnrollmentMaterial,
    role: Role,
) -> WalletResult<Identity> {
    validate_label(label)?;
    if store.exists(label).await {
        return Err(WalletError::AlreadyExists(label.to_string()));
    }

    let identity = Identity::new(org.msp_id(), material, role);
    store.put(label, &identity).await?;
    log::info!(
        "Imported identity \"{}\" ({}, role {}) into the wallet of organization {}",
        label,
        identity.msp_id,
        identity.role.as_str(),
        org
    );
    Ok(identity)
}

/// Imports `principal` from the cryptogen tree into the wallet.
///
/// # Process Flow
/// 1. Derive the MSP directory from organization and principal
/// 2. Read the signing certificate and the single keystore key
/// 3. Refuse if the label already exists
/// 4. Store the record
pub async fn import_from_crypto_config(
    store: &dyn CredentialStore,
    layout: &CryptoConfigLayout,
    org: &Organization,
    principal: &str,
) -> WalletResult<Identity> {
    validate_label(principal)?;
    let material = layout.read_material(org, principal).await?;
    import_identity(store, org, principal, material, Role::for_label(principal)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::credential_storage::MemoryWallet;
    use tempfile::TempDir;

    const CERT: &str = "-----BEGIN CERTIFICATE-----\nABCDEF\n-----END CERTIFICATE-----\n";

    fn provision(root: &Path, org: &Organization, principal: &str, keys: &[&str]) {
        let layout = CryptoConfigLayout::new(root);
        let signcerts = layout.certificate_path(org, principal);
        std::fs::create_dir_all(signcerts.parent().unwrap()).unwrap();
        std::fs::write(&signcerts, CERT).unwrap();

        let keystore = layout.keystore_dir(org, principal);
        std::fs::create_dir_all(&keystore).unwrap();
        for (i, key) in keys.iter().enumerate() {
            std::fs::write(keystore.join(format!("{}_sk", i)), key).unwrap();
        }
    }

    #[test]
    fn test_path_convention() {
        let layout = CryptoConfigLayout::new("/crypto-config");
        let org = Organization::parse("org1").unwrap();
        assert_eq!(
            layout.certificate_path(&org, "User1"),
            PathBuf::from(
                "/crypto-config/peerOrganizations/org1.example.com/users/User1@org1.example.com/msp/signcerts/User1@org1.example.com-cert.pem"
            )
        );
    }

    #[tokio::test]
    async fn test_import_user() {
        let dir = TempDir::new().unwrap();
        let org = Organization::parse("1").unwrap();
        provision(dir.path(), &org, "alice", &["KEYDATA"]);

        let store = MemoryWallet::new();
        let layout = CryptoConfigLayout::new(dir.path());
        let identity = import_from_crypto_config(&store, &layout, &org, "alice")
            .await
            .unwrap();

        assert!(store.exists("alice").await);
        assert_eq!(identity.msp_id, "Org1MSP");
        assert_eq!(identity.certificate, CERT);
        assert_eq!(identity.private_key, "KEYDATA");
        assert_eq!(identity.role, Role::None);
    }

    #[tokio::test]
    async fn test_import_admin_gets_role() {
        let dir = TempDir::new().unwrap();
        let org = Organization::parse("org2").unwrap();
        provision(dir.path(), &org, "Admin", &["ADMINKEY"]);

        let store = MemoryWallet::new();
        let layout = CryptoConfigLayout::new(dir.path());
        let identity = import_from_crypto_config(&store, &layout, &org, "Admin")
            .await
            .unwrap();
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(store.get("Admin").await.unwrap().msp_id, "Org2MSP");
    }

    #[tokio::test]
    async fn test_admin_lookalike_gets_no_role() {
        let dir = TempDir::new().unwrap();
        let org = Organization::parse("1").unwrap();
        provision(dir.path(), &org, "ADMIN", &["KEYDATA"]);

        let store = MemoryWallet::new();
        let layout = CryptoConfigLayout::new(dir.path());
        let identity = import_from_crypto_config(&store, &layout, &org, "ADMIN")
            .await
            .unwrap();
        assert_eq!(identity.role, Role::None);
    }

    #[tokio::test]
    async fn test_missing_principal_directory() {
        let dir = TempDir::new().unwrap();
        let store = MemoryWallet::new();
        let layout = CryptoConfigLayout::new(dir.path());
        let org = Organization::parse("1").unwrap();

        let result = import_from_crypto_config(&store, &layout, &org, "ghost").await;
        assert!(matches!(result, Err(WalletError::PrincipalNotProvisioned { .. })));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn test_keystore_must_hold_one_key() {
        let dir = TempDir::new().unwrap();
        let org = Organization::parse("1").unwrap();
        provision(dir.path(), &org, "empty", &[]);
        provision(dir.path(), &org, "twice", &["K1", "K2"]);

        let store = MemoryWallet::new();
        let layout = CryptoConfigLayout::new(dir.path());
        assert!(matches!(
            import_from_crypto_config(&store, &layout, &org, "empty").await,
            Err(WalletError::KeyMaterialMissing(_))
        ));
        assert!(matches!(
            import_from_crypto_config(&store, &layout, &org, "twice").await,
            Err(WalletError::AmbiguousKeyMaterial { count: 2, .. })
        ));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_import_is_rejected() {
        let dir = TempDir::new().unwrap();
        let org = Organization::parse("1").unwrap();
        provision(dir.path(), &org, "alice", &["KEYDATA"]);

        let store = MemoryWallet::new();
        let layout = CryptoConfigLayout::new(dir.path());
        let first = import_from_crypto_config(&store, &layout, &org, "alice")
            .await
            .unwrap();
        let second = import_from_crypto_config(&store, &layout, &org, "alice").await;

        assert!(matches!(second, Err(WalletError::AlreadyExists(_))));
        assert_eq!(store.get("alice").await.unwrap(), first);
    }
}
