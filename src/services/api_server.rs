// src/services/api_server.rs
//! API Server for the Fabric wallet
//!
//! This module provides the REST API interface for the identity lifecycle:
//! importing cryptogen identities, enrolling and registering identities with
//! the certificate authority, logging in, and dispatching transactions on
//! behalf of a logged-in identity.
//!
//! The API is built using Axum and includes endpoints for:
//! - Importing the cryptogen `Admin` and user identities
//! - CA admin enrollment and user registration
//! - Certificate-token login with a session token in return
//! - Listing the identities of an organization's wallet
//! - Chaincode submit and evaluate calls (bearer session required)

use crate::blockchain::gateway::Transaction;
use crate::error::WalletError;
use crate::models::identity::IMPORTED_ADMIN_LABEL;
use crate::models::organization::Organization;
use crate::services::dispatcher::TransactionDispatcher;
use crate::services::enrollment::EnrollmentService;
use crate::services::verifier::{SessionClaims, Verifier};
use crate::services::with_timeout;
use crate::utils::serialization::payload_to_string;
use crate::wallet::file_store::Wallets;
use crate::wallet::importer::{import_from_crypto_config, CryptoConfigLayout};
use crate::wallet::CredentialStore;
use axum::{
    extract::{Json, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

// API request structures
//
// Fields are optional so that a missing field is reported as a 400 with a
// readable message instead of a body rejection.

/// Request payload naming only an organization
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrgRequest {
    org_name: Option<String>,
}

/// Request payload naming a user of an organization
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRequest {
    user_name: Option<String>,
    org_name: Option<String>,
}

/// Request payload for the login check
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    user_name: Option<String>,
    org_name: Option<String>,
    password: Option<String>,
}

/// Request payload for a chaincode call
#[derive(Deserialize)]
struct TransactionRequest {
    channel: Option<String>,
    contract: Option<String>,
    function: Option<String>,
    #[serde(default)]
    args: Vec<String>,
}

/// Error returned by every handler, rendered as `{"error": ...}`.
pub struct ApiError(WalletError);

impl From<WalletError> for ApiError {
    fn from(error: WalletError) -> Self {
        ApiError(error)
    }
}

/// Maps a wallet error onto the HTTP status reported to clients.
pub fn status_for(error: &WalletError) -> StatusCode {
    match error {
        WalletError::AlreadyExists(_)
        | WalletError::PrincipalNotProvisioned { .. }
        | WalletError::Validation(_) => StatusCode::BAD_REQUEST,
        WalletError::InvalidCredentials | WalletError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            log::error!("Request failed: {}", self.0);
        } else {
            log::warn!("Request rejected: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// Returns the value of a required request field.
fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(WalletError::Validation(format!("missing field \"{}\"", field)).into()),
    }
}

/// API server state containing all service dependencies
pub struct ApiServer {
    /// Per-organization wallets
    wallets: Arc<Wallets>,

    /// Location of the cryptogen output
    layout: Arc<CryptoConfigLayout>,

    /// Service for CA enrollment and registration
    enrollment: Arc<EnrollmentService>,

    /// Service for login checks and session tokens
    verifier: Arc<Verifier>,

    /// Service for chaincode calls
    dispatcher: Arc<TransactionDispatcher>,

    /// Channel used when a transaction request names none
    default_channel: String,

    /// Deadline applied to every service call
    timeout: Duration,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `wallets` - Wallet base shared by all organizations
    /// * `layout` - Cryptogen output used by the import routes
    /// * `enrollment` - Service for the CA routes
    /// * `verifier` - Service for login and session checks
    /// * `dispatcher` - Service for the transaction routes
    /// * `default_channel` - Channel for requests without one
    /// * `timeout` - Deadline for each service call
    pub fn new(
        wallets: Wallets,
        layout: CryptoConfigLayout,
        enrollment: EnrollmentService,
        verifier: Verifier,
        dispatcher: TransactionDispatcher,
        default_channel: String,
        timeout: Duration,
    ) -> Self {
        ApiServer {
            wallets: Arc::new(wallets),
            layout: Arc::new(layout),
            enrollment: Arc::new(enrollment),
            verifier: Arc::new(verifier),
            dispatcher: Arc::new(dispatcher),
            default_channel,
            timeout,
        }
    }

    /// Builds the router with every route and the CORS layer.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/enroll-admin", post(Self::import_admin_handler))
            .route("/import-user", post(Self::import_user_handler))
            .route("/ca/enroll-admin", post(Self::enroll_admin_handler))
            .route("/ca/register-user", post(Self::register_user_handler))
            .route("/login", post(Self::login_handler))
            .route("/identities/:org", get(Self::list_identities_handler))
            .route("/transactions/submit", post(Self::submit_handler))
            .route("/transactions/evaluate", post(Self::evaluate_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("API server listening on http://{}", addr);

        axum::serve(listener, app).await
    }

    // =====================
    // Cryptogen Import Handlers
    // =====================

    /// Imports the cryptogen `Admin` identity of an organization
    ///
    /// # Endpoint
    /// POST /enroll-admin
    ///
    /// # Request Body
    /// `{"orgName": "1"}`
    ///
    /// # Responses
    /// - 200 OK: Identity imported
    /// - 400 Bad Request: Already imported, or not provisioned
    /// - 500 Internal Server Error: Key material or wallet failure
    async fn import_admin_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<OrgRequest>,
    ) -> ApiResult {
        let org = Organization::parse(&required(payload.org_name, "orgName")?)?;

        with_timeout(state.timeout, async {
            let store = state.wallets.open(&org).await?;
            import_from_crypto_config(&store, &state.layout, &org, IMPORTED_ADMIN_LABEL).await
        })
        .await?;

        Ok(Json(json!({
            "message": format!("Successfully imported admin user \"{}\" into the wallet", IMPORTED_ADMIN_LABEL)
        })))
    }

    /// Imports a cryptogen user identity
    ///
    /// # Endpoint
    /// POST /import-user
    ///
    /// # Request Body
    /// `{"userName": "User1", "orgName": "1"}`
    ///
    /// # Responses
    /// - 200 OK: Identity imported
    /// - 400 Bad Request: Already imported, not provisioned, or invalid input
    async fn import_user_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<UserRequest>,
    ) -> ApiResult {
        let user = required(payload.user_name, "userName")?;
        let org = Organization::parse(&required(payload.org_name, "orgName")?)?;

        with_timeout(state.timeout, async {
            let store = state.wallets.open(&org).await?;
            import_from_crypto_config(&store, &state.layout, &org, &user).await
        })
        .await?;

        Ok(Json(json!({
            "message": format!("Successfully imported user \"{}\" into the wallet", user)
        })))
    }

    // =====================
    // Certificate Authority Handlers
    // =====================

    /// Enrolls the CA bootstrap admin
    ///
    /// # Endpoint
    /// POST /ca/enroll-admin
    async fn enroll_admin_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<OrgRequest>,
    ) -> ApiResult {
        let org = Organization::parse(&required(payload.org_name, "orgName")?)?;

        let admin = with_timeout(state.timeout, async {
            let store = state.wallets.open(&org).await?;
            state.enrollment.enroll_admin(&store, &org).await
        })
        .await?;

        Ok(Json(json!({
            "message": "Successfully enrolled admin user \"admin\" and imported it into the wallet",
            "mspId": admin.msp_id,
        })))
    }

    /// Registers and enrolls a user with the CA
    ///
    /// # Endpoint
    /// POST /ca/register-user
    ///
    /// # Responses
    /// - 200 OK: User registered, enrolled and imported
    /// - 400 Bad Request: Label already taken
    /// - 500 Internal Server Error: Admin not enrolled or CA failure
    async fn register_user_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<UserRequest>,
    ) -> ApiResult {
        let user = required(payload.user_name, "userName")?;
        let org = Organization::parse(&required(payload.org_name, "orgName")?)?;

        let identity = with_timeout(state.timeout, async {
            let store = state.wallets.open(&org).await?;
            state.enrollment.register_user(&store, &org, &user).await
        })
        .await?;

        Ok(Json(json!({
            "message": format!(
                "Successfully registered and enrolled user \"{}\" and imported it into the wallet",
                user
            ),
            "mspId": identity.msp_id,
        })))
    }

    // =====================
    // Login & Wallet Handlers
    // =====================

    /// Checks a certificate-derived password and opens a session
    ///
    /// # Endpoint
    /// POST /login
    ///
    /// # Request Body
    /// `{"userName": "alice", "orgName": "1", "password": "<token>"}`
    ///
    /// # Responses
    /// - 200 OK: `{"message", "token"}` with a bearer session token
    /// - 401 Unauthorized: Password mismatch
    async fn login_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<LoginRequest>,
    ) -> ApiResult {
        let user = required(payload.user_name, "userName")?;
        let org = Organization::parse(&required(payload.org_name, "orgName")?)?;
        let password = required(payload.password, "password")?;

        let identity = with_timeout(state.timeout, async {
            let store = state.wallets.open(&org).await?;
            state.verifier.verify_login(&store, &user, &password).await
        })
        .await?;
        let token = state.verifier.issue_session(&org, &user, &identity)?;

        log::info!("User \"{}\" of organization {} logged in", user, org);
        Ok(Json(json!({
            "message": format!("Successfully logged in as user \"{}\"", user),
            "token": token,
        })))
    }

    /// Lists the identity labels stored for an organization
    ///
    /// # Endpoint
    /// GET /identities/:org
    async fn list_identities_handler(
        State(state): State<Arc<ApiServer>>,
        Path(org): Path<String>,
    ) -> ApiResult {
        let org = Organization::parse(&org)?;

        let identities = with_timeout(state.timeout, async {
            let store = state.wallets.open(&org).await?;
            store.list().await
        })
        .await?;

        Ok(Json(json!({
            "message": format!("{} identities in the wallet of organization {}", identities.len(), org),
            "identities": identities,
        })))
    }

    // =====================
    // Transaction Handlers
    // =====================

    /// Submits a chaincode transaction as the session's identity
    ///
    /// # Endpoint
    /// POST /transactions/submit
    ///
    /// # Headers
    /// `Authorization: Bearer <session token>`
    ///
    /// # Responses
    /// - 200 OK: Transaction committed, result payload returned
    /// - 401 Unauthorized: Missing or invalid session token
    /// - 500 Internal Server Error: Identity missing or gateway failure
    async fn submit_handler(
        State(state): State<Arc<ApiServer>>,
        headers: HeaderMap,
        Json(payload): Json<TransactionRequest>,
    ) -> ApiResult {
        let claims = state.session(&headers)?;
        let transaction = state.transaction(payload)?;
        let org = Organization::parse(&claims.org)?;

        let result = with_timeout(state.timeout, async {
            let store = state.wallets.open(&org).await?;
            state.dispatcher.submit(&store, &claims.sub, &transaction).await
        })
        .await?;

        Ok(Json(json!({
            "message": "Transaction has been submitted",
            "result": payload_to_string(&result),
        })))
    }

    /// Evaluates a chaincode query as the session's identity
    ///
    /// # Endpoint
    /// POST /transactions/evaluate
    async fn evaluate_handler(
        State(state): State<Arc<ApiServer>>,
        headers: HeaderMap,
        Json(payload): Json<TransactionRequest>,
    ) -> ApiResult {
        let claims = state.session(&headers)?;
        let transaction = state.transaction(payload)?;
        let org = Organization::parse(&claims.org)?;

        let result = with_timeout(state.timeout, async {
            let store = state.wallets.open(&org).await?;
            state.dispatcher.evaluate(&store, &claims.sub, &transaction).await
        })
        .await?;

        Ok(Json(json!({
            "message": "Transaction has been evaluated",
            "result": payload_to_string(&result),
        })))
    }

    /// Validates the bearer session token of a request.
    fn session(&self, headers: &HeaderMap) -> Result<SessionClaims, ApiError> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| WalletError::Unauthorized("missing bearer token".into()))?;
        Ok(self.verifier.verify_session(token.trim())?)
    }

    fn transaction(&self, payload: TransactionRequest) -> Result<Transaction, ApiError> {
        Ok(Transaction {
            channel: payload
                .channel
                .filter(|channel| !channel.is_empty())
                .unwrap_or_else(|| self.default_channel.clone()),
            contract: required(payload.contract, "contract")?,
            function: required(payload.function, "function")?,
            args: payload.args,
        })
    }
}

// Implement Clone for ApiServer to use with Axum's State
impl Clone for ApiServer {
    fn clone(&self) -> Self {
        ApiServer {
            wallets: Arc::clone(&self.wallets),
            layout: Arc::clone(&self.layout),
            enrollment: Arc::clone(&self.enrollment),
            verifier: Arc::clone(&self.verifier),
            dispatcher: Arc::clone(&self.dispatcher),
            default_channel: self.default_channel.clone(),
            timeout: self.timeout,
        }
    }
}
