// src/settings.rs
//! Layered runtime settings.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults
//! 2. The file given with `--config`, or else an optional
//!    `fabric-wallet.{toml,json,yaml}` file in the working directory
//! 3. `FABRIC_WALLET__*` environment variables, e.g. `FABRIC_WALLET__CA__URL`

use crate::services::enrollment::{DEFAULT_ADMIN_SECRET, DEFAULT_USER_ROLE};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HMAC secret used when none is configured. Only suitable for development.
pub const DEVELOPMENT_JWT_SECRET: &str = "fabric-wallet-development-secret";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletSettings {
    /// Base directory; each organization gets `<path>/<org>`
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfigSettings {
    /// Root of the cryptogen output (contains `peerOrganizations/`)
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaSettings {
    pub url: String,
    pub ca_name: Option<String>,
    pub admin_secret: String,
    pub affiliation: Option<String>,
    pub user_role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    pub url: String,
    /// Channel used when a call names none
    pub channel: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
}

/// Application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub wallet: WalletSettings,
    pub crypto_config: CryptoConfigSettings,
    pub ca: CaSettings,
    pub gateway: GatewaySettings,
    pub auth: AuthSettings,
    /// Deadline for each CA, gateway and wallet operation
    pub timeout_secs: u64,
}

impl Settings {
    /// Loads settings from defaults, a config file and the environment.
    ///
    /// # Arguments
    /// * `config_file` - Explicit config file, which must exist; when `None`,
    ///   `fabric-wallet.*` in the working directory is used if present
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match config_file {
            Some(path) => File::from(path).required(true),
            None => File::with_name("fabric-wallet").required(false),
        };

        Self::defaults()?
            .add_source(file)
            .add_source(
                Environment::with_prefix("FABRIC_WALLET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("wallet.path", "wallet")?
            .set_default("crypto_config.path", "crypto-config")?
            .set_default("ca.url", "http://localhost:7054")?
            .set_default("ca.admin_secret", DEFAULT_ADMIN_SECRET)?
            .set_default("ca.user_role", DEFAULT_USER_ROLE)?
            .set_default("gateway.url", "http://localhost:8080")?
            .set_default("gateway.channel", "staffaccountant")?
            .set_default("auth.jwt_secret", DEVELOPMENT_JWT_SECRET)?
            .set_default("auth.token_ttl_secs", 3600)?
            .set_default("timeout_secs", 30)
    }

    /// Address the HTTP server binds to.
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Message(format!("invalid server address: {}", e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
