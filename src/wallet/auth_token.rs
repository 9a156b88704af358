// src/wallet/auth_token.rs
//! Certificate-derived login token.
//!
//! The network's login flow treats the base64 body of a user's enrollment
//! certificate as that user's password: whoever can show the body of the
//! certificate stored in the wallet is accepted as its owner.
//!
//! # Security Considerations
//! - The token is not a secret. Certificates are public material, shared
//!   with every peer that validates a transaction signed by the identity.
//! - The check exists for compatibility with existing clients only and is
//!   unsuitable for production authentication.

use crate::error::{WalletError, WalletResult};

pub const BEGIN_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----";
pub const END_CERTIFICATE: &str = "-----END CERTIFICATE-----";

/// Derives the login token of a PEM certificate.
///
/// # Arguments
/// * `certificate` - PEM text, possibly spread over many lines
///
/// # Returns
/// The concatenated base64 body between the first BEGIN marker and the
/// first END marker that follows it, with line breaks removed.
///
/// # Compatibility
/// Both `\n` and `\r` are removed. Clients that strip only `\n` derive a
/// different token from a certificate stored with CRLF line endings; for
/// LF-only certificates, which Fabric tooling writes, the tokens agree.
///
/// # Errors
/// [`WalletError::MalformedCertificate`] if either marker is missing.
pub fn derive_token(certificate: &str) -> WalletResult<String> {
    let flattened: String = certificate
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect();

    let start = flattened
        .find(BEGIN_CERTIFICATE)
        .map(|i| i + BEGIN_CERTIFICATE.len())
        .ok_or(WalletError::MalformedCertificate("missing BEGIN CERTIFICATE marker"))?;
    let end = flattened[start..]
        .find(END_CERTIFICATE)
        .map(|i| start + i)
        .ok_or(WalletError::MalformedCertificate(
            "missing END CERTIFICATE marker after BEGIN",
        ))?;

    Ok(flattened[start..end].to_string())
}

/// Compares a submitted token with the token derived from `certificate`.
///
/// The comparison is byte-for-byte; it runs in constant time with respect to
/// the token contents.
pub fn verify_token(certificate: &str, submitted: &str) -> WalletResult<()> {
    let expected = derive_token(certificate)?;
    ring::constant_time::verify_slices_are_equal(expected.as_bytes(), submitted.as_bytes())
        .map_err(|_| WalletError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT: &str = "-----BEGIN CERTIFICATE-----\nABCDEF\n-----END CERTIFICATE-----\n";
    const MULTILINE: &str = "-----BEGIN CERTIFICATE-----\r\nMIIC\r\nNjCC\r\nAd2g\r\n-----END CERTIFICATE-----\r\n";

    #[test]
    fn test_derive_simple_certificate() {
        assert_eq!(derive_token(CERT).unwrap(), "ABCDEF");
    }

    #[test]
    fn test_derive_is_deterministic_and_newline_insensitive() {
        let first = derive_token(MULTILINE).unwrap();
        assert_eq!(first, "MIICNjCCAd2g");
        assert_eq!(derive_token(MULTILINE).unwrap(), first);

        let stripped: String = MULTILINE.chars().filter(|c| *c != '\n').collect();
        assert_eq!(derive_token(&stripped).unwrap(), first);
    }

    #[test]
    fn test_malformed_inputs() {
        assert!(matches!(
            derive_token("not a cert"),
            Err(WalletError::MalformedCertificate(_))
        ));
        assert!(matches!(
            derive_token("-----BEGIN CERTIFICATE-----ABC"),
            Err(WalletError::MalformedCertificate(_))
        ));
        // END before BEGIN does not count.
        assert!(matches!(
            derive_token("-----END CERTIFICATE-----ABC-----BEGIN CERTIFICATE-----XYZ"),
            Err(WalletError::MalformedCertificate(_))
        ));
    }

    #[test]
    fn test_end_marker_is_searched_after_begin() {
        let cert = "-----END CERTIFICATE----------BEGIN CERTIFICATE-----XYZ-----END CERTIFICATE-----";
        assert_eq!(derive_token(cert).unwrap(), "XYZ");
    }

    #[test]
    fn test_verify_token() {
        assert!(verify_token(CERT, "ABCDEF").is_ok());
        assert!(matches!(
            verify_token(CERT, "WRONG"),
            Err(WalletError::InvalidCredentials)
        ));
        assert!(matches!(
            verify_token(CERT, "ABCDEF "),
            Err(WalletError::InvalidCredentials)
        ));
    }
}
