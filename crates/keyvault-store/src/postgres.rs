//! PostgreSQL backend
//!
//! Table layout: `vault_secrets(id, encrypted_secret, updated_at)`.
//! `encrypted_secret` holds the base64 envelope exactly as the cipher
//! produced it. Writes go through one `INSERT .. ON CONFLICT` statement, so
//! concurrent writers for the same identity resolve to last-writer-wins.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyvault_crypto::SecretEnvelope;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::record::envelope_from_column;
use crate::{CallerIdentity, Result, VaultRecord, VaultStore};

const MAX_CONNECTIONS: u32 = 10;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS vault_secrets (
    id TEXT PRIMARY KEY,
    encrypted_secret TEXT,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

const UPSERT: &str = "INSERT INTO vault_secrets (id, encrypted_secret, updated_at)
    VALUES ($1, $2, now())
    ON CONFLICT (id) DO UPDATE
    SET encrypted_secret = EXCLUDED.encrypted_secret, updated_at = now()";

/// sqlx-backed store
#[derive(Clone)]
pub struct PgVaultStore {
    pool: PgPool,
}

impl PgVaultStore {
    /// Connect with a bounded pool. `acquire_timeout` caps how long a request
    /// waits for a connection before the store reports itself unavailable.
    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        tracing::debug!(max_connections = MAX_CONNECTIONS, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the table if it does not exist yet
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        tracing::info!("vault_secrets table ready");
        Ok(())
    }
}

#[async_trait]
impl VaultStore for PgVaultStore {
    async fn get(&self, identity: &CallerIdentity) -> Result<Option<SecretEnvelope>> {
        let column: Option<Option<String>> =
            sqlx::query_scalar("SELECT encrypted_secret FROM vault_secrets WHERE id = $1")
                .bind(identity.as_str())
                .fetch_optional(&self.pool)
                .await?;

        Ok(envelope_from_column(column.flatten()))
    }

    async fn put(
        &self,
        identity: &CallerIdentity,
        envelope: Option<&SecretEnvelope>,
    ) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(identity.as_str())
            .bind(envelope.map(SecretEnvelope::as_str))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record(&self, identity: &CallerIdentity) -> Result<Option<VaultRecord>> {
        let row: Option<(Option<String>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT encrypted_secret, updated_at FROM vault_secrets WHERE id = $1",
        )
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(column, updated_at)| VaultRecord {
            identity: identity.clone(),
            envelope: envelope_from_column(column),
            updated_at,
        }))
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
