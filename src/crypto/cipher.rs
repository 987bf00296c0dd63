//! AES-256-GCM authenticated encryption
//!
//! Blob layout: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! A fresh random nonce is drawn for every call, so encrypting the same
//! plaintext twice never produces the same blob.

use std::sync::Arc;

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};

use super::key_manager::KeyManager;
use crate::error::EncryptionError;

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;
/// Size of the AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// An encrypted payload as produced by `CipherService::encrypt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob(Vec<u8>);

impl EncryptedBlob {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn nonce(&self) -> &[u8] {
        &self.0[..NONCE_SIZE]
    }
}

impl AsRef<[u8]> for EncryptedBlob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Encrypts and decrypts payloads under the master key
pub struct CipherService {
    keys: Arc<KeyManager>,
}

impl CipherService {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    fn cipher(&self) -> Result<Aes256Gcm, EncryptionError> {
        let key = self.keys.current_key()?;
        Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| EncryptionError::KeyUnavailable)
    }

    /// Encrypt `plaintext` with a fresh random nonce
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedBlob, EncryptionError> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        // aes-gcm only fails on inputs beyond the GCM length limit
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| EncryptionError::InvalidData("Plaintext too large for AES-GCM".into()))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + sealed.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&sealed);
        Ok(EncryptedBlob(blob))
    }

    /// Decrypt a blob produced by `encrypt`
    ///
    /// Returns `MalformedBlob` if the input cannot hold a nonce and a tag and
    /// `AuthenticationFailure` if the tag does not verify.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        if blob.len() < NONCE_SIZE + TAG_SIZE {
            return Err(EncryptionError::MalformedBlob(format!(
                "expected at least {} bytes, got {}",
                NONCE_SIZE + TAG_SIZE,
                blob.len()
            )));
        }

        let cipher = self.cipher()?;
        let (nonce, sealed) = blob.split_at(NONCE_SIZE);

        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| EncryptionError::AuthenticationFailure)
    }

    /// Encrypt a string and return the blob as base64
    pub fn encrypt_string(&self, plaintext: &str) -> Result<String, EncryptionError> {
        let blob = self.encrypt(plaintext.as_bytes())?;
        Ok(STANDARD.encode(blob.as_bytes()))
    }

    /// Decode base64 and decrypt to a string
    pub fn decrypt_string(&self, encoded: &str) -> Result<String, EncryptionError> {
        let blob = STANDARD
            .decode(encoded.trim())
            .map_err(|e| EncryptionError::InvalidData(format!("Invalid base64: {}", e)))?;
        let plaintext = self.decrypt(&blob)?;
        String::from_utf8(plaintext)
            .map_err(|e| EncryptionError::InvalidData(format!("Invalid UTF-8 in decrypted data: {}", e)))
    }
}
