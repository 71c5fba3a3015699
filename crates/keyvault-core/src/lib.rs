//! Keyvault Core - identity-gated secret vault
//!
//! Ties the pieces together for the two request paths:
//!
//! - set: resolve identity -> encrypt -> upsert envelope
//! - get: resolve identity -> look up envelope -> decrypt
//!
//! Frontends (the HTTP server, tests) only talk to `VaultService`.

mod identity;
mod service;

pub use identity::{bearer_token, AuthError, GoTrueResolver, IdentityResolver};
pub use keyvault_store::CallerIdentity;
pub use service::{SetOutcome, VaultService};

use keyvault_crypto::CipherError;
use keyvault_store::StoreError;

/// Everything a vault request can fail with
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(#[from] AuthError),

    #[error("Stored secret could not be decrypted")]
    DecryptionFailure(#[source] CipherError),

    #[error("Secret could not be encrypted")]
    EncryptionFailure(#[source] CipherError),

    #[error("Secret store unavailable")]
    StoreUnavailable(#[from] StoreError),
}

impl VaultError {
    /// Stable machine-readable kind
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::Unauthenticated(_) => "unauthenticated",
            VaultError::DecryptionFailure(_) => "decryption_failed",
            VaultError::EncryptionFailure(_) => "encryption_failed",
            VaultError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl From<CipherError> for VaultError {
    fn from(err: CipherError) -> Self {
        match err {
            CipherError::EncryptionFailed => VaultError::EncryptionFailure(err),
            CipherError::DecryptionFailed | CipherError::MalformedEnvelope(_) => {
                VaultError::DecryptionFailure(err)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
