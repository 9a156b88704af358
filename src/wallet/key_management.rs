// src/wallet/key_management.rs
//! Signing with a wallet identity's private key.
//!
//! Fabric identities use ECDSA over NIST P-256 with SHA-256. Keys are
//! stored as PKCS#8 PEM, which is what both cryptogen and the CA
//! enrollment flow produce.
//!
//! Uses the following cryptographic primitives:
//! - ECDSA P-256 / SHA-256 (via `ring`)
//! - Low-S normalization (see [`crate::utils::crypto::normalize_low_s`])

use crate::models::identity::Identity;
use crate::utils::crypto::{normalize_low_s, pem_to_der};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};

/// Signer bound to one wallet identity.
///
/// # Security Notes
/// - The parsed key lives only as long as this value
/// - Signatures are always emitted in low-S form, which Fabric requires
pub struct KeyManager {
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
    certificate: String,
}

impl KeyManager {
    /// Loads the signing key of an identity.
    ///
    /// # Errors
    /// Returns `Err` if:
    /// - The private key is not a PEM `PRIVATE KEY` block
    /// - The key is not a P-256 PKCS#8 document
    pub fn from_identity(identity: &Identity) -> Result<Self, String> {
        let der = pem_to_der(&identity.private_key, "PRIVATE KEY")?;
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &der)
            .map_err(|e| format!("unsupported private key: {}", e))?;
        Ok(KeyManager {
            key_pair,
            rng: SystemRandom::new(),
            certificate: identity.certificate.clone(),
        })
    }

    /// PEM certificate of the identity this signer belongs to.
    pub fn certificate(&self) -> &str {
        &self.certificate
    }

    /// Signs a message with ECDSA P-256 / SHA-256.
    ///
    /// # Returns
    /// DER-encoded signature in low-S form.
    pub fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, String> {
        let signature = self
            .key_pair
            .sign(&self.rng, message)
            .map_err(|_| "ECDSA signing failed".to_string())?;
        normalize_low_s(signature.as_ref())
    }
}
