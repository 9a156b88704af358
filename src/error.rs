// src/error.rs
//! Error taxonomy shared by the wallet, importer, enrollment and login services.
//!
//! Every core operation returns [`WalletError`] instead of aborting. The HTTP
//! layer maps each kind onto a status code in one place
//! (see `services::api_server`), the CLI prints it through `anyhow`.

use crate::blockchain::ca_client::CaError;
use crate::blockchain::gateway::GatewayError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures of the identity lifecycle operations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The label is already taken in this organization's wallet.
    #[error("An identity for \"{0}\" already exists in the wallet")]
    AlreadyExists(String),

    /// No record is stored under the label.
    #[error("An identity for \"{0}\" does not exist in the wallet")]
    NotFound(String),

    /// The cryptogen output has no directory (or certificate) for the principal.
    #[error("Principal \"{principal}\" in organization \"{organization}\" is not provisioned at {}", .path.display())]
    PrincipalNotProvisioned {
        principal: String,
        organization: String,
        path: PathBuf,
    },

    /// The keystore directory holds no readable private key.
    #[error("No private key found in {}", .0.display())]
    KeyMaterialMissing(PathBuf),

    /// The keystore directory holds more than one candidate key.
    #[error("Expected exactly one private key in {}, found {count}", .path.display())]
    AmbiguousKeyMaterial { path: PathBuf, count: usize },

    /// A user registration needs the CA admin identity first.
    #[error("An identity for the admin user \"{0}\" does not exist in the wallet")]
    AdminNotEnrolled(String),

    #[error("Malformed certificate: {0}")]
    MalformedCertificate(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, expired or forged session token on an authenticated route.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A session token could not be produced after a successful login.
    #[error("Failed to issue session token: {0}")]
    SessionIssue(#[source] jsonwebtoken::errors::Error),

    #[error("Enrollment failed: {0}")]
    EnrollmentFailed(#[source] CaError),

    #[error("Transaction failed: {0}")]
    Transaction(#[source] GatewayError),

    #[error("Wallet I/O error: {0}")]
    StoreIo(#[from] std::io::Error),

    #[error("Corrupt wallet record for \"{label}\": {source}")]
    CorruptRecord {
        label: String,
        #[source]
        source: serde_json::Error,
    },

    /// Rejected input (bad label, bad organization name, missing field).
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Operation timed out after {0:?}")]
    TimedOut(Duration),
}

pub type WalletResult<T> = Result<T, WalletError>;
