//! AES-256-GCM encryption for credentials stored at rest.
//!
//! Sealed values are `base64(nonce || ciphertext)` with a 96-bit random nonce,
//! so the same plaintext never seals to the same string twice.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;
use thiserror::Error;

const NONCE_LEN: usize = 12;

/// Error type for cipher operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("Encryption key must be exactly 32 bytes")]
    InvalidKey,

    #[error("Encryption failed")]
    SealFailed,

    #[error("Value is not a sealed credential")]
    NotSealed,

    #[error("Decryption failed")]
    OpenFailed,
}

/// Symmetric cipher for app account credentials.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Arc<Aes256Gcm>,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl CredentialCipher {
    /// Creates a cipher from a raw 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != 32 {
            return Err(CipherError::InvalidKey);
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKey)?;
        Ok(Self {
            cipher: Arc::new(cipher),
        })
    }

    /// Creates a cipher from a base64-encoded 32-byte key (the configuration format).
    pub fn from_base64_key(encoded: &str) -> Result<Self, CipherError> {
        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CipherError::InvalidKey)?;
        Self::new(&key)
    }

    /// Encrypts a cleartext value.
    pub fn seal(&self, plaintext: &str) -> Result<String, CipherError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::SealFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypts a sealed value.
    pub fn open(&self, sealed: &str) -> Result<String, CipherError> {
        let raw = STANDARD
            .decode(sealed.trim())
            .map_err(|_| CipherError::NotSealed)?;
        if raw.len() <= NONCE_LEN {
            return Err(CipherError::NotSealed);
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CipherError::OpenFailed)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::OpenFailed)
    }

    /// Returns true if `value` decrypts under this key.
    pub fn is_sealed(&self, value: &str) -> bool {
        self.open(value).is_ok()
    }

    /// Seals `value` unless it is already sealed under this key.
    pub fn seal_if_needed(&self, value: &str) -> Result<String, CipherError> {
        if self.is_sealed(value) {
            Ok(value.to_string())
        } else {
            self.seal(value)
        }
    }
}
