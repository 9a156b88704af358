// src/services/verifier.rs
//! Login verification service.
//!
//! Checks a submitted certificate-derived token against the identity stored
//! in the wallet (see [`crate::wallet::auth_token`]) and, on success, issues
//! a short-lived signed session token for the HTTP transaction routes.

use crate::error::{WalletError, WalletResult};
use crate::models::identity::Identity;
use crate::models::organization::Organization;
use crate::wallet::auth_token::verify_token;
use crate::wallet::CredentialStore;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Wallet label of the logged-in identity
    pub sub: String,
    /// Organization whose wallet holds the identity
    pub org: String,
    pub msp_id: String,
    pub role: String,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
}

/// Login verifier and session token issuer.
///
/// The Verifier provides:
/// - The certificate-token login check
/// - HS256 session tokens bound to a label and organization
#[derive(Clone)]
pub struct Verifier {
    /// HMAC secret for session tokens
    secret: Vec<u8>,
    /// Session lifetime in seconds
    ttl_secs: i64,
}

impl Verifier {
    /// Constructs a new Verifier instance.
    ///
    /// # Arguments
    /// * `secret` - HMAC key for session tokens
    /// * `ttl_secs` - Session lifetime in seconds
    pub fn new(secret: impl AsRef<[u8]>, ttl_secs: i64) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl_secs,
        }
    }

    /// Verifies a login attempt against the wallet.
    ///
    /// # Arguments
    /// * `store` - Wallet of the claimed organization
    /// * `label` - Claimed wallet label
    /// * `submitted` - Token presented by the caller
    ///
    /// # Returns
    /// - `Ok(identity)` if the submitted token equals the one derived from
    ///   the stored certificate
    /// - `Err(NotFound)` if no identity is stored under `label`
    /// - `Err(InvalidCredentials)` on any mismatch
    /// - `Err(MalformedCertificate)` if the stored certificate has no PEM body
    pub async fn verify_login(
        &self,
        store: &dyn CredentialStore,
        label: &str,
        submitted: &str,
    ) -> WalletResult<Identity> {
        let identity = store.get(label).await?;
        match verify_token(&identity.certificate, submitted) {
            Ok(()) => Ok(identity),
            Err(e) => {
                log::warn!("Rejected login for \"{}\": {}", label, e);
                Err(e)
            }
        }
    }

    /// Issues a session token for a verified identity.
    ///
    /// # Errors
    /// `SessionIssue` if the token cannot be encoded; this is a server-side
    /// failure, not a rejected login.
    pub fn issue_session(
        &self,
        org: &Organization,
        label: &str,
        identity: &Identity,
    ) -> WalletResult<String> {
        let claims = SessionClaims {
            sub: label.to_string(),
            org: org.name().to_string(),
            msp_id: identity.msp_id.clone(),
            role: identity.role.as_str().to_string(),
            exp: chrono::Utc::now().timestamp() + self.ttl_secs,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(WalletError::SessionIssue)
    }

    /// Validates a session token's signature and expiry.
    pub fn verify_session(&self, token: &str) -> WalletResult<SessionClaims> {
        decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| WalletError::Unauthorized(e.to_string()))
    }
}
