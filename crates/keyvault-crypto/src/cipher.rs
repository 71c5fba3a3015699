//! AES-256-GCM authenticated encryption
//!
//! Every call to `encrypt` draws a fresh 12-byte IV from the system RNG.
//! The IV is prepended so we can decrypt without external state.

use ring::aead::{Aad, Nonce};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::envelope::{SecretEnvelope, IV_LEN};
use crate::key::SymmetricKey;
use crate::{CipherError, Result};

/// Generate a cryptographically secure random IV
fn generate_iv() -> Result<[u8; IV_LEN]> {
    let mut iv = [0u8; IV_LEN];
    SystemRandom::new()
        .fill(&mut iv)
        .map_err(|_| CipherError::EncryptionFailed)?;
    Ok(iv)
}

/// Encrypt plaintext with AES-256-GCM
///
/// Returns: base64(iv || ciphertext || tag)
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<SecretEnvelope> {
    let iv = generate_iv()?;

    let mut in_out = Zeroizing::new(plaintext.to_vec());
    key.aead()
        .seal_in_place_append_tag(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut *in_out)
        .map_err(|_| CipherError::EncryptionFailed)?;

    Ok(SecretEnvelope::seal(&iv, &in_out))
}

pub fn encrypt_str(key: &SymmetricKey, plaintext: &str) -> Result<SecretEnvelope> {
    encrypt(key, plaintext.as_bytes())
}

/// Decrypt an envelope produced by `encrypt()`
pub fn decrypt(key: &SymmetricKey, envelope: &SecretEnvelope) -> Result<Zeroizing<Vec<u8>>> {
    let (iv, sealed) = envelope.open()?;
    let mut in_out = Zeroizing::new(sealed);

    let plaintext_len = key
        .aead()
        .open_in_place(Nonce::assume_unique_for_key(iv), Aad::empty(), in_out.as_mut_slice())
        .map_err(|_| CipherError::DecryptionFailed)?
        .len();

    in_out.truncate(plaintext_len);
    Ok(in_out)
}

/// Decrypt and require the plaintext to be UTF-8
pub fn decrypt_string(key: &SymmetricKey, envelope: &SecretEnvelope) -> Result<SecretString> {
    let bytes = decrypt(key, envelope)?;
    let text = std::str::from_utf8(&bytes).map_err(|_| CipherError::DecryptionFailed)?;
    Ok(SecretString::new(text.to_owned()))
}
