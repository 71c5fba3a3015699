//! Self-contained envelope: `base64(iv || ciphertext || tag)`
//!
//! The encoded string is the only form that leaves this crate. It is what
//! gets persisted and what gets handed back to the cipher for decryption.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{CipherError, Result};

/// 96-bit IV (12 bytes)
pub const IV_LEN: usize = ring::aead::NONCE_LEN;
/// 128-bit GCM authentication tag (16 bytes)
pub const TAG_LEN: usize = 16;

/// An encrypted secret in its serialized form
#[derive(Clone, PartialEq, Eq)]
pub struct SecretEnvelope(String);

impl SecretEnvelope {
    pub(crate) fn seal(iv: &[u8; IV_LEN], sealed: &[u8]) -> Self {
        let mut raw = Vec::with_capacity(IV_LEN + sealed.len());
        raw.extend_from_slice(iv);
        raw.extend_from_slice(sealed);
        Self(STANDARD.encode(raw))
    }

    /// Wrap a stored envelope string. Validation happens at decrypt time.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into IV and ciphertext+tag
    pub(crate) fn open(&self) -> Result<([u8; IV_LEN], Vec<u8>)> {
        let raw = STANDARD
            .decode(self.0.trim())
            .map_err(|_| CipherError::MalformedEnvelope("not valid base64"))?;

        if raw.len() < IV_LEN + TAG_LEN {
            return Err(CipherError::MalformedEnvelope("too short"));
        }

        let (iv_bytes, sealed) = raw.split_at(IV_LEN);
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(iv_bytes);
        Ok((iv, sealed.to_vec()))
    }
}

impl fmt::Debug for SecretEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SecretEnvelope")
            .field(&format_args!("{} chars", self.0.len()))
            .finish()
    }
}
