//! Server configuration
//!
//! Every setting is a CLI flag with an environment fallback. `validate`
//! runs before anything binds, so a missing or malformed key stops the
//! process instead of failing requests later.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use clap::{Args, ValueEnum};
use keyvault_crypto::{KeyError, SymmetricKey};
use secrecy::SecretString;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid encryption key: {0}")]
    Key(#[from] KeyError),

    #[error("DATABASE_URL is required when the postgres store is selected")]
    MissingDatabaseUrl,

    #[error("KEYVAULT_AUTH_URL is required")]
    MissingAuthUrl,

    #[error("Invalid allowed origin: {0}")]
    InvalidOrigin(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// PostgreSQL via DATABASE_URL
    Postgres,
    /// In-process map, lost on restart
    Memory,
}

#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Seconds to wait for a database connection
    #[arg(long, env = "KEYVAULT_DB_TIMEOUT_SECS", default_value_t = 5)]
    pub db_timeout_secs: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "KEYVAULT_BIND", default_value = "127.0.0.1:8787")]
    pub bind: SocketAddr,

    /// Base64 of the 32-byte AES-256-GCM key (see `keyvault keygen`)
    #[arg(long, env = "KEYVAULT_ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// Where vault records live
    #[arg(long, env = "KEYVAULT_STORE", value_enum, default_value_t = StoreKind::Postgres)]
    pub store: StoreKind,

    #[command(flatten)]
    pub database: DatabaseArgs,

    /// Base URL of the GoTrue-compatible auth service
    #[arg(long, env = "KEYVAULT_AUTH_URL")]
    pub auth_url: Option<String>,

    /// Public API key sent to the auth service as `apikey`
    #[arg(long, env = "KEYVAULT_AUTH_API_KEY", hide_env_values = true)]
    pub auth_api_key: Option<String>,

    /// Seconds to wait for the auth service
    #[arg(long, env = "KEYVAULT_AUTH_TIMEOUT_SECS", default_value_t = 10)]
    pub auth_timeout_secs: u64,

    /// CORS allowed origin (`*` for any)
    #[arg(long, env = "KEYVAULT_ALLOWED_ORIGIN", default_value = "*")]
    pub allowed_origin: String,
}

pub enum StoreSettings {
    Postgres {
        database_url: String,
        acquire_timeout: Duration,
    },
    Memory,
}

pub struct AuthSettings {
    pub url: String,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

/// Validated configuration, ready to start serving
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub key: SymmetricKey,
    pub store: StoreSettings,
    pub auth: AuthSettings,
    /// `None` allows any origin
    pub allowed_origin: Option<HeaderValue>,
}

impl DatabaseArgs {
    pub fn require_url(&self) -> Result<String, ConfigError> {
        self.database_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or(ConfigError::MissingDatabaseUrl)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }
}

impl ServeArgs {
    pub fn validate(self) -> Result<ServerConfig, ConfigError> {
        let key = match self.encryption_key {
            Some(encoded) => SymmetricKey::from_base64(&SecretString::new(encoded))?,
            None => return Err(ConfigError::Key(KeyError::Missing)),
        };

        let store = match self.store {
            StoreKind::Postgres => StoreSettings::Postgres {
                database_url: self.database.require_url()?,
                acquire_timeout: self.database.acquire_timeout(),
            },
            StoreKind::Memory => StoreSettings::Memory,
        };

        let url = self
            .auth_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingAuthUrl)?;

        let auth = AuthSettings {
            url,
            api_key: self
                .auth_api_key
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::new),
            timeout: Duration::from_secs(self.auth_timeout_secs),
        };

        let origin = self.allowed_origin.trim();
        let allowed_origin = if origin == "*" {
            None
        } else {
            Some(
                HeaderValue::from_str(origin)
                    .map_err(|_| ConfigError::InvalidOrigin(origin.to_string()))?,
            )
        };

        Ok(ServerConfig {
            bind: self.bind,
            key,
            store,
            auth,
            allowed_origin,
        })
    }
}
