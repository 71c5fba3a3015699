//! Keyvault Store - one record per caller identity
//!
//! Records hold the encrypted envelope only. This crate never sees a key
//! or a plaintext secret. Writes are single atomic upserts keyed by
//! identity; clearing a secret keeps the record.

mod memory;
mod postgres;
mod record;

pub use memory::MemoryVaultStore;
pub use postgres::PgVaultStore;
pub use record::{CallerIdentity, VaultRecord};

use async_trait::async_trait;
use keyvault_crypto::SecretEnvelope;

/// Errors from store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable keyed record store for secret envelopes
#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Envelope stored for `identity`, absent if there is no record or it was cleared
    async fn get(&self, identity: &CallerIdentity) -> Result<Option<SecretEnvelope>>;

    /// Create-if-absent, replace-if-present. `None` clears the envelope but keeps the record.
    async fn put(&self, identity: &CallerIdentity, envelope: Option<&SecretEnvelope>)
        -> Result<()>;

    /// Full record including `updated_at`
    async fn record(&self, identity: &CallerIdentity) -> Result<Option<VaultRecord>>;

    /// Backend name for logs
    fn name(&self) -> &str;
}
