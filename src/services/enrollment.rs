// src/services/enrollment.rs
//! Enrollment Service
//!
//! This module obtains new identities from the organization's certificate
//! authority and imports them into the wallet.
//!
//! The service covers two flows:
//! - Admin enrollment: the CA bootstrap admin enrolls with its well-known secret
//! - User registration: the enrolled admin registers a user, which then
//!   enrolls with the one-time secret the CA returned

use crate::blockchain::ca_client::CertificateAuthority;
use crate::error::{WalletError, WalletResult};
use crate::models::identity::{validate_label, Identity, Role, ADMIN_LABEL};
use crate::models::organization::Organization;
use crate::wallet::importer::import_identity;
use crate::wallet::CredentialStore;
use std::sync::Arc;

/// Well-known enrollment secret of the CA bootstrap admin.
pub const DEFAULT_ADMIN_SECRET: &str = "adminpw";

/// CA role given to registered users.
pub const DEFAULT_USER_ROLE: &str = "client";

/// Service for enrolling and registering identities with a CA.
///
/// Holds the CA collaborator and the registration policy; the wallet to
/// write into is passed per call, so one service serves every organization.
#[derive(Clone)]
pub struct EnrollmentService {
    /// Certificate authority client
    ca: Arc<dyn CertificateAuthority>,

    /// Secret the bootstrap admin enrolls with
    admin_secret: String,

    /// CA role of registered users
    user_role: String,

    /// Affiliation of registered users; the registrar's own when `None`
    affiliation: Option<String>,
}

impl EnrollmentService {
    /// Creates a new EnrollmentService instance
    ///
    /// # Arguments
    /// * `ca` - Certificate authority to enroll against
    /// * `admin_secret` - Bootstrap admin secret (usually [`DEFAULT_ADMIN_SECRET`])
    /// * `user_role` - Role for registered users (usually [`DEFAULT_USER_ROLE`])
    /// * `affiliation` - Optional affiliation for registered users
    pub fn new(
        ca: Arc<dyn CertificateAuthority>,
        admin_secret: impl Into<String>,
        user_role: impl Into<String>,
        affiliation: Option<String>,
    ) -> Self {
        Self {
            ca,
            admin_secret: admin_secret.into(),
            user_role: user_role.into(),
            affiliation,
        }
    }

    /// Enrolls the CA bootstrap admin and imports it as `admin`.
    ///
    /// # Returns
    /// The stored identity, carrying the admin role.
    ///
    /// # Errors
    /// - `AlreadyExists` if `admin` is already in the wallet (no CA call is made)
    /// - `EnrollmentFailed` if the CA cannot be reached or refuses
    pub async fn enroll_admin(
        &self,
        store: &dyn CredentialStore,
        org: &Organization,
    ) -> WalletResult<Identity> {
        if store.exists(ADMIN_LABEL).await {
            log::warn!("Admin of organization {} is already enrolled", org);
            return Err(WalletError::AlreadyExists(ADMIN_LABEL.to_string()));
        }

        let material = self
            .ca
            .enroll(ADMIN_LABEL, &self.admin_secret)
            .await
            .map_err(WalletError::EnrollmentFailed)?;

        let identity = import_identity(store, org, ADMIN_LABEL, material, Role::Admin).await?;
        log::info!("Successfully enrolled admin user \"{}\" for organization {}", ADMIN_LABEL, org);
        Ok(identity)
    }

    /// Registers and enrolls a user, then imports it under `label`.
    ///
    /// # Process Flow
    /// 1. Refuse administrator-like labels and labels already in the wallet
    /// 2. Load the `admin` identity as registrar
    /// 3. Register `label` with the CA, receiving a one-time secret
    /// 4. Enroll `label` with that secret
    /// 5. Import the issued certificate and key, without any role
    ///
    /// # Errors
    /// - `Validation` if `label` is `admin` in any letter case
    /// - `AlreadyExists` if the label is taken
    /// - `AdminNotEnrolled` if no `admin` identity exists
    /// - `EnrollmentFailed` on any CA failure
    pub async fn register_user(
        &self,
        store: &dyn CredentialStore,
        org: &Organization,
        label: &str,
    ) -> WalletResult<Identity> {
        validate_label(label)?;
        if label.eq_ignore_ascii_case(ADMIN_LABEL) {
            return Err(WalletError::Validation(format!(
                "\"{}\" is reserved for the administrator",
                label
            )));
        }
        if store.exists(label).await {
            return Err(WalletError::AlreadyExists(label.to_string()));
        }

        let registrar = match store.get(ADMIN_LABEL).await {
            Ok(admin) if admin.is_admin() => admin,
            Ok(_) => {
                log::warn!("Cannot register \"{}\": \"{}\" of organization {} has no admin role", label, ADMIN_LABEL, org);
                return Err(WalletError::AdminNotEnrolled(ADMIN_LABEL.to_string()));
            }
            Err(WalletError::NotFound(_)) => {
                log::warn!("Cannot register \"{}\": admin of organization {} is not enrolled", label, org);
                return Err(WalletError::AdminNotEnrolled(ADMIN_LABEL.to_string()));
            }
            Err(e) => return Err(e),
        };

        let secret = self
            .ca
            .register(&registrar, label, &self.user_role, self.affiliation.as_deref())
            .await
            .map_err(WalletError::EnrollmentFailed)?;
        let material = self
            .ca
            .enroll(label, &secret)
            .await
            .map_err(WalletError::EnrollmentFailed)?;

        let identity = import_identity(store, org, label, material, Role::None).await?;
        log::info!("Successfully registered and enrolled user \"{}\" for organization {}", label, org);
        Ok(identity)
    }
}
