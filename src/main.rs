// src/main.rs

//! # Fabric Wallet - Main Entry Point
//!
//! Command-line front end and HTTP server for managing Hyperledger Fabric
//! identities in per-organization wallets.
//!
//! ## Architecture Overview
//! 1. **Wallet Layer**: file-backed credential stores, cryptogen import,
//!    certificate-derived login tokens and request signing
//! 2. **Blockchain Layer**: Fabric CA REST client and the ledger gateway client
//! 3. **Services Layer**: enrollment, login verification, transaction dispatch
//!    and the HTTP API
//!
//! ## Configuration
//! Settings come from built-in defaults, a config file (`--config`, or an
//! optional `fabric-wallet.*` in the working directory) and
//! `FABRIC_WALLET__*` environment variables (a `.env` file is loaded first).
//! See [`settings::Settings`].

use crate::blockchain::ca_client::FabricCaClient;
use crate::blockchain::gateway::{RestGateway, Transaction};
use crate::models::identity::IMPORTED_ADMIN_LABEL;
use crate::models::organization::Organization;
use crate::services::api_server::ApiServer;
use crate::services::dispatcher::TransactionDispatcher;
use crate::services::enrollment::EnrollmentService;
use crate::services::verifier::Verifier;
use crate::services::with_timeout;
use crate::settings::{Settings, DEVELOPMENT_JWT_SECRET};
use crate::utils::serialization::payload_to_string;
use crate::wallet::auth_token::derive_token;
use crate::wallet::file_store::Wallets;
use crate::wallet::importer::{import_from_crypto_config, CryptoConfigLayout};
use crate::wallet::CredentialStore;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Module declarations (organized by functional domain)
mod blockchain; // Fabric CA and gateway clients
mod error; // Shared error type
mod models; // Identity and organization types
mod services; // Business logic and API
mod settings; // Layered configuration
mod utils; // Helper functions
mod wallet; // Credential stores and key material

#[derive(Parser)]
#[command(name = "fabric-wallet")]
#[command(about = "Identity wallet and transaction client for Hyperledger Fabric")]
#[command(version)]
struct Cli {
    /// Config file to load instead of `fabric-wallet.*` in the working directory
    #[arg(long, global = true, env = "FABRIC_WALLET_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve,
    /// Import a cryptogen user identity into the wallet
    Import { user: String, org: String },
    /// Import the cryptogen `Admin` identity into the wallet
    ImportAdmin { org: String },
    /// Enroll the CA bootstrap admin as `admin`
    EnrollAdmin { org: String },
    /// Register and enroll a user with the CA
    RegisterUser { user: String, org: String },
    /// Print the login password derived from a stored certificate
    Password { user: String, org: String },
    /// List the identities stored for an organization
    List { org: String },
    /// Submit a chaincode transaction
    Invoke(CallArgs),
    /// Evaluate a chaincode query
    Query(CallArgs),
}

#[derive(clap::Args)]
struct CallArgs {
    user: String,
    org: String,
    contract: String,
    function: String,
    args: Vec<String>,
    /// Channel the contract is deployed to
    #[arg(long, env = "FABRIC_WALLET_CHANNEL")]
    channel: Option<String>,
}

/// Service components built from the settings.
struct Components {
    wallets: Wallets,
    layout: CryptoConfigLayout,
    enrollment: EnrollmentService,
    verifier: Verifier,
    dispatcher: TransactionDispatcher,
    timeout: Duration,
}

impl Components {
    fn build(settings: &Settings) -> Result<Self> {
        let timeout = settings.timeout();

        let ca = FabricCaClient::new(&settings.ca.url, settings.ca.ca_name.clone(), timeout)
            .context("Failed to initialize the certificate authority client")?;
        let gateway = RestGateway::new(&settings.gateway.url, timeout)
            .context("Failed to initialize the gateway client")?;

        Ok(Components {
            wallets: Wallets::new(&settings.wallet.path),
            layout: CryptoConfigLayout::new(&settings.crypto_config.path),
            enrollment: EnrollmentService::new(
                Arc::new(ca),
                settings.ca.admin_secret.clone(),
                settings.ca.user_role.clone(),
                settings.ca.affiliation.clone(),
            ),
            verifier: Verifier::new(&settings.auth.jwt_secret, settings.auth.token_ttl_secs),
            dispatcher: TransactionDispatcher::new(Arc::new(gateway)),
            timeout,
        })
    }
}

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load `.env` and initialize logging
/// 2. Load layered settings
/// 3. Build the service components
/// 4. Run the requested command
#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let components = Components::build(&settings)?;
    let timeout = components.timeout;

    match cli.command {
        Commands::Serve => {
            if settings.auth.jwt_secret == DEVELOPMENT_JWT_SECRET {
                log::warn!("Using the development session secret; set FABRIC_WALLET__AUTH__JWT_SECRET");
            }
            let addr = settings.addr()?;
            let server = ApiServer::new(
                components.wallets,
                components.layout,
                components.enrollment,
                components.verifier,
                components.dispatcher,
                settings.gateway.channel.clone(),
                timeout,
            );
            server.run(addr).await?;
        }
        Commands::Import { user, org } => {
            let org = Organization::parse(&org)?;
            with_timeout(timeout, async {
                let store = components.wallets.open(&org).await?;
                import_from_crypto_config(&store, &components.layout, &org, &user).await
            })
            .await?;
            println!("Successfully imported user \"{}\" into the wallet", user);
        }
        Commands::ImportAdmin { org } => {
            let org = Organization::parse(&org)?;
            with_timeout(timeout, async {
                let store = components.wallets.open(&org).await?;
                import_from_crypto_config(&store, &components.layout, &org, IMPORTED_ADMIN_LABEL)
                    .await
            })
            .await?;
            println!(
                "Successfully imported admin user \"{}\" into the wallet",
                IMPORTED_ADMIN_LABEL
            );
        }
        Commands::EnrollAdmin { org } => {
            let org = Organization::parse(&org)?;
            with_timeout(timeout, async {
                let store = components.wallets.open(&org).await?;
                components.enrollment.enroll_admin(&store, &org).await
            })
            .await?;
            println!("Successfully enrolled admin user \"admin\" and imported it into the wallet");
        }
        Commands::RegisterUser { user, org } => {
            let org = Organization::parse(&org)?;
            with_timeout(timeout, async {
                let store = components.wallets.open(&org).await?;
                components.enrollment.register_user(&store, &org, &user).await
            })
            .await?;
            println!(
                "Successfully registered and enrolled user \"{}\" and imported it into the wallet",
                user
            );
        }
        Commands::Password { user, org } => {
            let org = Organization::parse(&org)?;
            let identity = with_timeout(timeout, async {
                let store = components.wallets.open(&org).await?;
                store.get(&user).await
            })
            .await?;
            println!("{}", derive_token(&identity.certificate)?);
        }
        Commands::List { org } => {
            let org = Organization::parse(&org)?;
            let labels = with_timeout(timeout, async {
                let store = components.wallets.open(&org).await?;
                store.list().await
            })
            .await?;
            for label in labels {
                println!("{}", label);
            }
        }
        Commands::Invoke(call) => {
            let (user, org, transaction) = call.into_transaction(&settings.gateway.channel)?;
            with_timeout(timeout, async {
                let store = components.wallets.open(&org).await?;
                components.dispatcher.submit(&store, &user, &transaction).await
            })
            .await?;
            println!("Transaction has been submitted");
        }
        Commands::Query(call) => {
            let (user, org, transaction) = call.into_transaction(&settings.gateway.channel)?;
            let result = with_timeout(timeout, async {
                let store = components.wallets.open(&org).await?;
                components.dispatcher.evaluate(&store, &user, &transaction).await
            })
            .await?;
            println!(
                "Transaction has been evaluated, result is: {}",
                payload_to_string(&result)
            );
        }
    }

    Ok(())
}

impl CallArgs {
    fn into_transaction(self, default_channel: &str) -> Result<(String, Organization, Transaction)> {
        let org = Organization::parse(&self.org)?;
        let transaction = Transaction {
            channel: self.channel.unwrap_or_else(|| default_channel.to_string()),
            contract: self.contract,
            function: self.function,
            args: self.args,
        };
        Ok((self.user, org, transaction))
    }
}
