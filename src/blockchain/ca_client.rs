// src/blockchain/ca_client.rs
//! Fabric certificate authority client.
//!
//! Provides the two CA operations the wallet needs:
//! - `register`: an enrolled registrar (the CA admin) creates a principal and
//!   receives its one-time enrollment secret
//! - `enroll`: a principal exchanges label and secret for a certificate
//!
//! [`FabricCaClient`] speaks the Fabric CA REST API. Enrollment generates a
//! fresh P-256 key pair locally and sends only a certificate signing request,
//! so the private key never leaves this process.

use crate::models::identity::{EnrollmentMaterial, Identity};
use crate::wallet::key_management::KeyManager;
use async_trait::async_trait;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const ENROLL_PATH: &str = "/api/v1/enroll";
const REGISTER_PATH: &str = "/api/v1/register";

/// Failures talking to the certificate authority.
#[derive(Debug, Error)]
pub enum CaError {
    #[error("Request to certificate authority failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Certificate authority rejected the request: {0}")]
    Rejected(String),

    #[error("Unexpected certificate authority response: {0}")]
    InvalidResponse(String),

    #[error("Failed to build certificate signing request: {0}")]
    Csr(#[from] rcgen::Error),

    #[error("Failed to sign request: {0}")]
    Signing(String),
}

/// Certificate authority operations used by the enrollment service.
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Registers `label` on behalf of `registrar`, returning the enrollment secret.
    async fn register(
        &self,
        registrar: &Identity,
        label: &str,
        role: &str,
        affiliation: Option<&str>,
    ) -> Result<String, CaError>;

    /// Enrolls `label` with its secret, returning certificate and private key.
    async fn enroll(&self, label: &str, secret: &str) -> Result<EnrollmentMaterial, CaError>;
}

/// Request body of `POST /api/v1/enroll`
#[derive(Serialize)]
struct EnrollRequest<'a> {
    certificate_request: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    caname: Option<&'a str>,
}

/// Request body of `POST /api/v1/register`
#[derive(Serialize)]
struct RegisterRequest<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    affiliation: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    caname: Option<&'a str>,
}

/// Envelope every Fabric CA response is wrapped in.
#[derive(Deserialize)]
struct CaResponse<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<CaMessage>,
}

#[derive(Deserialize)]
struct CaMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct EnrollResult {
    #[serde(rename = "Cert")]
    cert: String,
}

#[derive(Deserialize)]
struct RegisterResult {
    secret: String,
}

/// HTTP client for a Fabric CA server.
#[derive(Clone)]
pub struct FabricCaClient {
    http: reqwest::Client,
    /// Base URL, e.g. `http://localhost:7054`
    url: String,
    /// CA instance name when the server hosts several CAs
    ca_name: Option<String>,
}

impl FabricCaClient {
    /// Creates a CA client.
    ///
    /// # Arguments
    /// * `url` - Base URL of the CA server
    /// * `ca_name` - Optional CA instance name (`caname` in requests)
    /// * `timeout` - Bound on every request
    pub fn new(url: &str, ca_name: Option<String>, timeout: Duration) -> Result<Self, CaError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(FabricCaClient {
            http,
            url: url.trim_end_matches('/').to_string(),
            ca_name,
        })
    }

    /// Unwraps the Fabric CA envelope, turning `success: false` into `Rejected`.
    async fn read_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CaError> {
        let status = response.status();
        let body = response.bytes().await?;
        let envelope: CaResponse<T> = serde_json::from_slice(&body).map_err(|e| {
            CaError::InvalidResponse(format!("HTTP {}: {}", status, e))
        })?;

        if !envelope.success || !status.is_success() {
            let reasons: Vec<String> = envelope
                .errors
                .iter()
                .map(|e| format!("code {}: {}", e.code, e.message))
                .collect();
            return Err(CaError::Rejected(if reasons.is_empty() {
                format!("HTTP {}", status)
            } else {
                reasons.join("; ")
            }));
        }

        envelope
            .result
            .ok_or_else(|| CaError::InvalidResponse("missing result".into()))
    }
}

/// Builds the Fabric CA authorization token for a request body.
///
/// Token: `base64(cert) "." base64(signature)`, where the signature covers
/// `method "." base64(uri) "." base64(body) "." base64(cert)`.
pub fn authorization_token(
    signer: &KeyManager,
    method: &str,
    uri: &str,
    body: &[u8],
) -> Result<String, CaError> {
    let b64_cert = base64::encode(signer.certificate());
    let payload = format!(
        "{}.{}.{}.{}",
        method,
        base64::encode(uri),
        base64::encode(body),
        b64_cert
    );
    let signature = signer
        .sign_message(payload.as_bytes())
        .map_err(CaError::Signing)?;
    Ok(format!("{}.{}", b64_cert, base64::encode(signature)))
}

/// Generates a P-256 key pair and a PKCS#10 request with `CN=<label>`.
fn certificate_request(label: &str) -> Result<(KeyPair, String), CaError> {
    let key_pair = KeyPair::generate()?;
    let mut params = CertificateParams::new(Vec::<String>::new())?;
    let mut subject = DistinguishedName::new();
    subject.push(DnType::CommonName, label);
    params.distinguished_name = subject;
    let csr = params.serialize_request(&key_pair)?.pem()?;
    Ok((key_pair, csr))
}

#[async_trait]
impl CertificateAuthority for FabricCaClient {
    async fn register(
        &self,
        registrar: &Identity,
        label: &str,
        role: &str,
        affiliation: Option<&str>,
    ) -> Result<String, CaError> {
        let body = serde_json::to_vec(&RegisterRequest {
            id: label,
            role,
            affiliation,
            caname: self.ca_name.as_deref(),
        })
        .map_err(|e| CaError::InvalidResponse(e.to_string()))?;

        let token = {
            let signer = KeyManager::from_identity(registrar).map_err(CaError::Signing)?;
            authorization_token(&signer, "POST", REGISTER_PATH, &body)?
        };

        log::debug!("Registering \"{}\" with certificate authority {}", label, self.url);
        let response = self
            .http
            .post(format!("{}{}", self.url, REGISTER_PATH))
            .header(reqwest::header::AUTHORIZATION, token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let result: RegisterResult = Self::read_response(response).await?;
        Ok(result.secret)
    }

    async fn enroll(&self, label: &str, secret: &str) -> Result<EnrollmentMaterial, CaError> {
        let (key_pair, csr) = certificate_request(label)?;

        log::debug!("Enrolling \"{}\" with certificate authority {}", label, self.url);
        let response = self
            .http
            .post(format!("{}{}", self.url, ENROLL_PATH))
            .basic_auth(label, Some(secret))
            .json(&EnrollRequest {
                certificate_request: csr,
                caname: self.ca_name.as_deref(),
            })
            .send()
            .await?;

        let result: EnrollResult = Self::read_response(response).await?;
        let certificate = base64::decode(&result.cert)
            .map_err(|e| CaError::InvalidResponse(format!("certificate is not base64: {}", e)))
            .and_then(|bytes| {
                String::from_utf8(bytes).map_err(|e| {
                    CaError::InvalidResponse(format!("certificate is not UTF-8: {}", e))
                })
            })?;

        Ok(EnrollmentMaterial {
            certificate,
            private_key: key_pair.serialize_pem(),
        })
    }
}
