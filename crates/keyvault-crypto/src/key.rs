//! Process-wide symmetric key
//!
//! Imported once at startup from a configured secret value and then shared
//! read-only for the lifetime of the process.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::aead::{LessSafeKey, UnboundKey, AES_256_GCM};
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use zeroize::Zeroizing;

/// 256-bit key (32 bytes)
pub const KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Encryption key is not configured")]
    Missing,

    #[error("Encryption key is not valid base64")]
    InvalidEncoding,

    #[error("Invalid key size: expected {KEY_LEN}, got {0}")]
    InvalidLength(usize),

    #[error("System random source unavailable")]
    Rng,
}

/// AES-256-GCM key. Raw bytes are dropped as soon as the cipher key is built.
pub struct SymmetricKey {
    aead: LessSafeKey,
    fingerprint: String,
}

impl SymmetricKey {
    /// Import raw key material
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != KEY_LEN {
            return Err(KeyError::InvalidLength(bytes.len()));
        }

        let unbound = UnboundKey::new(&AES_256_GCM, bytes)
            .map_err(|_| KeyError::InvalidLength(bytes.len()))?;

        // Short SHA-256 prefix so operators can tell keys apart in logs
        let fingerprint: String = digest(&SHA256, bytes).as_ref()[..4]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();

        Ok(Self {
            aead: LessSafeKey::new(unbound),
            fingerprint,
        })
    }

    /// Import a configured value: standard base64 of exactly 32 bytes
    pub fn from_base64(encoded: &SecretString) -> Result<Self, KeyError> {
        let trimmed = encoded.expose_secret().trim();
        if trimmed.is_empty() {
            return Err(KeyError::Missing);
        }

        let bytes = Zeroizing::new(
            STANDARD
                .decode(trimmed)
                .map_err(|_| KeyError::InvalidEncoding)?,
        );
        Self::from_bytes(&bytes)
    }

    /// Generate a fresh random key
    pub fn generate() -> Result<Self, KeyError> {
        let bytes = random_key_bytes()?;
        Self::from_bytes(&*bytes)
    }

    /// Generate fresh key material in its configured (base64) form
    pub fn generate_encoded() -> Result<SecretString, KeyError> {
        let bytes = random_key_bytes()?;
        Ok(SecretString::new(STANDARD.encode(&*bytes)))
    }

    /// Non-secret identifier for this key (first 4 bytes of its SHA-256, hex)
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub(crate) fn aead(&self) -> &LessSafeKey {
        &self.aead
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

fn random_key_bytes() -> Result<Zeroizing<[u8; KEY_LEN]>, KeyError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    SystemRandom::new()
        .fill(key.as_mut())
        .map_err(|_| KeyError::Rng)?;
    Ok(key)
}
