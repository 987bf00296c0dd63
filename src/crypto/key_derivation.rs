//! Key derivation using Argon2id
//!
//! Derives the wrapping key for the passphrase credential store. The master
//! key itself is random and never derived from a passphrase.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::EncryptionError;

/// Salt length in bytes
const SALT_SIZE: usize = 16;

/// Parameters for key derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDerivationParams {
    /// Salt for key derivation (base64 encoded)
    pub salt: String,
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,
    /// Time cost (iterations, default: 3)
    pub time_cost: u32,
    /// Parallelism degree (default: 4)
    pub parallelism: u32,
}

impl KeyDerivationParams {
    /// Create new params with a random salt and default costs
    pub fn new() -> Self {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        Self {
            salt: STANDARD.encode(salt),
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }

    /// Cheap parameters for tests and low-power devices
    pub fn light() -> Self {
        Self {
            memory_cost: 8 * 1024,
            time_cost: 1,
            parallelism: 1,
            ..Self::new()
        }
    }
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self::new()
    }
}

/// A derived 256-bit key, zeroed on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; 32],
}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

/// Derive an encryption key from a passphrase
pub fn derive_key(passphrase: &str, params: &KeyDerivationParams) -> Result<DerivedKey, EncryptionError> {
    let salt = STANDARD
        .decode(&params.salt)
        .map_err(|e| EncryptionError::InvalidData(format!("Invalid salt: {}", e)))?;

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| EncryptionError::InvalidData(format!("Invalid Argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = DerivedKey { key: [0u8; 32] };
    argon2
        .hash_password_into(passphrase.as_bytes(), &salt, &mut key.key)
        .map_err(|e| EncryptionError::InvalidData(format!("Key derivation failed: {}", e)))?;

    Ok(key)
}
