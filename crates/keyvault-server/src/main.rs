//! Keyvault - per-user encrypted API key vault
//!
//! Usage:
//!   keyvault serve     - Run the HTTP service
//!   keyvault migrate   - Create the vault table in PostgreSQL
//!   keyvault keygen    - Print a fresh base64 encryption key

mod config;
mod http;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use keyvault_core::{GoTrueResolver, VaultService};
use keyvault_crypto::SymmetricKey;
use keyvault_store::{MemoryVaultStore, PgVaultStore, VaultStore};
use secrecy::ExposeSecret;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{DatabaseArgs, ServeArgs, ServerConfig, StoreSettings};

#[derive(Parser)]
#[command(name = "keyvault")]
#[command(author = "HeyBattle1")]
#[command(version)]
#[command(about = "Per-user encrypted API key vault", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve(ServeArgs),

    /// Create the vault table if it does not exist
    Migrate(DatabaseArgs),

    /// Generate a new encryption key
    Keygen,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let config = args.validate().context("Refusing to start")?;
            serve(config).await?;
        }

        Commands::Migrate(args) => {
            let url = args.require_url()?;
            let store = PgVaultStore::connect(&url, args.acquire_timeout())
                .await
                .context("Failed to connect to PostgreSQL")?;
            store.migrate().await?;
            println!("vault_secrets table is ready");
        }

        Commands::Keygen => {
            let key = SymmetricKey::generate_encoded()?;
            println!("{}", key.expose_secret());
        }
    }

    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let store: Arc<dyn VaultStore> = match &config.store {
        StoreSettings::Postgres {
            database_url,
            acquire_timeout,
        } => {
            let store = PgVaultStore::connect(database_url, *acquire_timeout)
                .await
                .context("Failed to connect to PostgreSQL")?;
            store.migrate().await?;
            Arc::new(store)
        }
        StoreSettings::Memory => {
            tracing::warn!("Using in-memory store - secrets are lost on restart");
            Arc::new(MemoryVaultStore::new())
        }
    };

    let resolver = GoTrueResolver::new(
        &config.auth.url,
        config.auth.api_key.clone(),
        config.auth.timeout,
    )
    .context("Failed to build auth client")?;

    tracing::info!(
        store = store.name(),
        auth_url = %config.auth.url,
        key_fingerprint = %config.key.fingerprint(),
        "Vault configured"
    );

    let cors = http::cors(config.allowed_origin.clone());
    let service = VaultService::new(Arc::new(config.key), Arc::new(resolver), store);
    let app = http::router(service, cors);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Keyvault shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
