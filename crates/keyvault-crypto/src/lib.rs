//! Keyvault Crypto - envelope encryption for stored secrets
//!
//! This crate provides:
//! - AES-256-GCM authenticated encryption (12-byte IV, tag appended)
//! - The process-wide `SymmetricKey`, imported once from raw key material
//! - `SecretEnvelope`, the self-contained `base64(iv || ciphertext || tag)` blob
//!
//! Nothing in here does I/O. The key is passed in explicitly on every call.

mod cipher;
mod envelope;
mod key;

pub use cipher::{decrypt, decrypt_string, encrypt, encrypt_str};
pub use envelope::{SecretEnvelope, IV_LEN, TAG_LEN};
pub use key::{KeyError, SymmetricKey, KEY_LEN};

/// Errors from the envelope cipher
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("Encryption failed - system random source unavailable")]
    EncryptionFailed,

    #[error("Decryption failed - data may be corrupted, tampered, or sealed under another key")]
    DecryptionFailed,

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(&'static str),
}

pub type Result<T> = std::result::Result<T, CipherError>;
