// src/blockchain/gateway.rs
//! Ledger gateway boundary.
//!
//! Chaincode invocation is delegated to an external gateway service; this
//! crate never interprets chaincode semantics. A transaction is either
//! *submitted* (endorsed, ordered and committed) or *evaluated* (a read-only
//! query against one peer).

use crate::models::identity::Identity;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failures reported by the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Request to ledger gateway failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ledger gateway returned {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// A named chaincode function call with ordered string arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Channel (network) the contract is deployed to, e.g. `staffaccountant`
    pub channel: String,
    /// Chaincode name, e.g. `database` or `token_erc20`
    pub contract: String,
    /// Function name, e.g. `queryAll` or `transfer`
    pub function: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Submit/evaluate access to the ledger on behalf of a wallet identity.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn submit(
        &self,
        label: &str,
        identity: &Identity,
        transaction: &Transaction,
    ) -> Result<Bytes, GatewayError>;

    async fn evaluate(
        &self,
        label: &str,
        identity: &Identity,
        transaction: &Transaction,
    ) -> Result<Bytes, GatewayError>;
}

/// Request body sent to the REST gateway.
///
/// Only the public half of the identity is sent.
#[derive(Serialize)]
struct GatewayRequest<'a> {
    identity: &'a str,
    #[serde(rename = "mspId")]
    msp_id: &'a str,
    certificate: &'a str,
    function: &'a str,
    args: &'a [String],
}

/// Gateway reached over HTTP.
///
/// Routes: `POST <url>/channels/<channel>/contracts/<contract>/submit` and
/// `.../evaluate`. The response body is the raw chaincode result.
#[derive(Clone)]
pub struct RestGateway {
    http: reqwest::Client,
    url: String,
}

impl RestGateway {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(RestGateway {
            http,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    async fn call(
        &self,
        action: &str,
        label: &str,
        identity: &Identity,
        transaction: &Transaction,
    ) -> Result<Bytes, GatewayError> {
        let url = format!(
            "{}/channels/{}/contracts/{}/{}",
            self.url, transaction.channel, transaction.contract, action
        );
        let response = self
            .http
            .post(url)
            .json(&GatewayRequest {
                identity: label,
                msp_id: &identity.msp_id,
                certificate: &identity.certificate,
                function: &transaction.function,
                args: &transaction.args,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl LedgerGateway for RestGateway {
    async fn submit(
        &self,
        label: &str,
        identity: &Identity,
        transaction: &Transaction,
    ) -> Result<Bytes, GatewayError> {
        self.call("submit", label, identity, transaction).await
    }

    async fn evaluate(
        &self,
        label: &str,
        identity: &Identity,
        transaction: &Transaction,
    ) -> Result<Bytes, GatewayError> {
        self.call("evaluate", label, identity, transaction).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::{EnrollmentMaterial, Role};
    use mockito::{mock, Matcher};

    fn identity() -> Identity {
        Identity::new(
            "Org1MSP",
            EnrollmentMaterial {
                certificate: "CERT".into(),
                private_key: "NEVER-SENT".into(),
            },
            Role::None,
        )
    }

    fn query_all() -> Transaction {
        Transaction {
            channel: "staffaccountant".into(),
            contract: "database".into(),
            function: "queryAll".into(),
            args: vec![],
        }
    }

    #[tokio::test]
    async fn test_evaluate_returns_payload() {
        let _m = mock("POST", "/gw-ok/channels/staffaccountant/contracts/database/evaluate")
            .match_body(Matcher::PartialJsonString(
                r#"{"identity":"alice","mspId":"Org1MSP","function":"queryAll"}"#.into(),
            ))
            .with_status(200)
            .with_body(r#"[{"Key":"Empalice"}]"#)
            .create();

        let gateway = RestGateway::new(
            &format!("{}/gw-ok", mockito::server_url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let payload = gateway.evaluate("alice", &identity(), &query_all()).await.unwrap();
        assert_eq!(&payload[..], br#"[{"Key":"Empalice"}]"#);
    }

    #[tokio::test]
    async fn test_private_key_is_not_sent() {
        let _m = mock("POST", "/gw-key/channels/staffaccountant/contracts/database/submit")
            .match_body(Matcher::Regex("NEVER-SENT".into()))
            .with_status(200)
            .create();

        let gateway = RestGateway::new(
            &format!("{}/gw-key", mockito::server_url()),
            Duration::from_secs(5),
        )
        .unwrap();
        // The mock only matches a body containing the key; an unmatched request gets 501.
        let result = gateway.submit("alice", &identity(), &query_all()).await;
        assert!(matches!(result, Err(GatewayError::Rejected { status: 501, .. })));
    }

    #[tokio::test]
    async fn test_rejection_is_reported() {
        let _m = mock("POST", "/gw-err/channels/staffaccountant/contracts/token_erc20/submit")
            .with_status(500)
            .with_body("transfer amount must be positive")
            .create();

        let gateway = RestGateway::new(
            &format!("{}/gw-err", mockito::server_url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let transaction = Transaction {
            contract: "token_erc20".into(),
            function: "transfer".into(),
            args: vec!["recipient".into(), "-1".into()],
            ..query_all()
        };
        match gateway.submit("alice", &identity(), &transaction).await {
            Err(GatewayError::Rejected { status, message }) => {
                assert_eq!(status, 500);
                assert!(message.contains("positive"));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }
}
