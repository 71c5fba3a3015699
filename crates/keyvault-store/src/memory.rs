//! In-process backend for local development and tests

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use keyvault_crypto::SecretEnvelope;

use crate::{CallerIdentity, Result, StoreError, VaultRecord, VaultStore};

/// HashMap-backed store. Each write holds the lock for the whole upsert.
#[derive(Default)]
pub struct MemoryVaultStore {
    records: RwLock<HashMap<CallerIdentity, VaultRecord>>,
}

impl MemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records, including cleared ones. Counts through a
    /// poisoned lock; the map itself is never left half-written.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E>(_: E) -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_string())
}

#[async_trait]
impl VaultStore for MemoryVaultStore {
    async fn get(&self, identity: &CallerIdentity) -> Result<Option<SecretEnvelope>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .get(identity)
            .and_then(|record| record.envelope.clone()))
    }

    async fn put(
        &self,
        identity: &CallerIdentity,
        envelope: Option<&SecretEnvelope>,
    ) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        let now = Utc::now();

        records
            .entry(identity.clone())
            .and_modify(|record| {
                record.envelope = envelope.cloned();
                record.updated_at = now;
            })
            .or_insert_with(|| VaultRecord {
                identity: identity.clone(),
                envelope: envelope.cloned(),
                updated_at: now,
            });
        Ok(())
    }

    async fn record(&self, identity: &CallerIdentity) -> Result<Option<VaultRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(identity).cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
