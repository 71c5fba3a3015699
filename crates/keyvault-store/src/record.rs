use std::fmt;

use chrono::{DateTime, Utc};
use keyvault_crypto::SecretEnvelope;

/// Server-verified identifier of the authenticated principal.
///
/// Only identity resolvers should construct one; request data never maps
/// to an identity directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row per identity
#[derive(Debug, Clone)]
pub struct VaultRecord {
    pub identity: CallerIdentity,
    /// `None` means "no secret", which is different from an empty secret
    pub envelope: Option<SecretEnvelope>,
    pub updated_at: DateTime<Utc>,
}

/// SQL NULL is the only "no secret". Any stored text, even empty, is an
/// envelope and must go through the cipher.
pub(crate) fn envelope_from_column(column: Option<String>) -> Option<SecretEnvelope> {
    column.map(SecretEnvelope::from_encoded)
}
