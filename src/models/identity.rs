// src/models/identity.rs
//! X.509 identity data model.
//!
//! Defines the record a wallet stores under a label: the owning
//! organization's MSP id, the PEM certificate, the PEM private key and a
//! role tag.

use crate::error::{WalletError, WalletResult};
use serde::{Deserialize, Serialize};

/// Label reserved for the CA bootstrap administrator.
pub const ADMIN_LABEL: &str = "admin";

/// Label under which the cryptogen administrator is imported.
pub const IMPORTED_ADMIN_LABEL: &str = "Admin";

/// Role attached to a wallet identity.
///
/// Ordinary users carry no role; the reserved administrator principals carry
/// [`Role::Admin`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    None,
    Admin,
}

impl Role {
    /// Role implied by a principal label.
    ///
    /// Only the exact reserved labels `admin` (CA bootstrap) and `Admin`
    /// (cryptogen) name the administrator principal.
    pub fn for_label(label: &str) -> Self {
        if is_reserved_label(label) {
            Role::Admin
        } else {
            Role::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::None => "none",
            Role::Admin => "Admin",
        }
    }
}

/// An X.509 identity held in a wallet.
///
/// # Fields
/// - `msp_id`: Membership service provider namespace, e.g. `Org1MSP`
/// - `certificate`: PEM-encoded X.509 certificate
/// - `private_key`: PEM-encoded private key (PKCS#8)
/// - `role`: [`Role::Admin`] for the reserved administrator, otherwise [`Role::None`]
///
/// # Security Considerations
/// - `private_key` is secret material; it is written to the wallet directory
///   in clear text, exactly like the Fabric SDK file system wallet
/// - `Debug` output redacts the key
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub msp_id: String,
    pub certificate: String,
    pub private_key: String,
    pub role: Role,
}

impl Identity {
    pub fn new(msp_id: impl Into<String>, material: EnrollmentMaterial, role: Role) -> Self {
        Identity {
            msp_id: msp_id.into(),
            certificate: material.certificate,
            private_key: material.private_key,
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("msp_id", &self.msp_id)
            .field("certificate", &self.certificate)
            .field("private_key", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Certificate and key pair, either read from cryptogen output or issued by a CA.
#[derive(Clone, PartialEq, Eq)]
pub struct EnrollmentMaterial {
    pub certificate: String,
    pub private_key: String,
}

impl std::fmt::Debug for EnrollmentMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentMaterial")
            .field("certificate", &self.certificate)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Whether `label` is one of the reserved administrator labels.
pub fn is_reserved_label(label: &str) -> bool {
    label == ADMIN_LABEL || label == IMPORTED_ADMIN_LABEL
}

/// Checks that a label can name a wallet entry.
///
/// Labels become file names, so path separators, NUL and a leading dot
/// (reserved for in-flight temporary files) are rejected.
pub fn validate_label(label: &str) -> WalletResult<()> {
    if label.is_empty() {
        return Err(WalletError::Validation("label must not be empty".into()));
    }
    if label.starts_with('.') {
        return Err(WalletError::Validation(format!(
            "label \"{}\" must not start with '.'",
            label
        )));
    }
    if label.contains(['/', '\\', '\0']) {
        return Err(WalletError::Validation(format!(
            "label \"{}\" contains a path separator",
            label
        )));
    }
    Ok(())
}
