//! Master key lifecycle
//!
//! `KeyManager` loads the 256-bit master key from a credential store, or
//! generates and persists one on first run. Initialization is serialized so
//! two concurrent callers can never both decide the key is missing and
//! generate two different keys.

use std::fmt;
use std::sync::Arc;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::OsRng;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::credential_store::CredentialStore;
use crate::error::{EncryptionError, KeyStoreError};

/// Master key length in bytes
pub const KEY_SIZE: usize = 32;

/// Default credential store identity
pub const DEFAULT_SERVICE: &str = "app.flowkey.encryption";
pub const DEFAULT_ACCOUNT: &str = "master-key";

/// The 256-bit master key, zeroed on drop and never printed
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    /// Generate a fresh key from the OS CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Build a key from stored bytes; the length must be exactly `KEY_SIZE`
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().ok()?;
        Some(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Owns the master key for the process lifetime
pub struct KeyManager {
    store: Arc<dyn CredentialStore>,
    service: String,
    account: String,
    key: RwLock<Option<Arc<MasterKey>>>,
    init_lock: Mutex<()>,
}

impl KeyManager {
    /// Create a manager using the default (service, account) identity
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self::with_identity(store, DEFAULT_SERVICE, DEFAULT_ACCOUNT)
    }

    pub fn with_identity(
        store: Arc<dyn CredentialStore>,
        service: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            store,
            service: service.into(),
            account: account.into(),
            key: RwLock::new(None),
            init_lock: Mutex::new(()),
        }
    }

    /// Load the key from the store, generating and persisting it if absent
    ///
    /// Calling this again after a successful initialization is a no-op.
    pub fn initialize(&self) -> Result<(), KeyStoreError> {
        if self.key.read().is_some() {
            return Ok(());
        }

        let _guard = self.init_lock.lock();
        if self.key.read().is_some() {
            return Ok(());
        }

        let key = match self.store.load(&self.service, &self.account)? {
            Some(bytes) => {
                let key = MasterKey::from_slice(&bytes).ok_or_else(|| {
                    KeyStoreError::new(
                        KeyStoreError::DECODE_FAILED,
                        format!(
                            "Stored master key has {} bytes, expected {}",
                            bytes.len(),
                            KEY_SIZE
                        ),
                    )
                })?;
                info!(service = %self.service, "loaded master key from credential store");
                key
            }
            None => {
                let key = MasterKey::generate();
                self.persist(&key)?;
                info!(service = %self.service, "generated and stored new master key");
                key
            }
        };

        *self.key.write() = Some(Arc::new(key));
        Ok(())
    }

    /// Replace any existing entry with `key`
    fn persist(&self, key: &MasterKey) -> Result<(), KeyStoreError> {
        self.store.delete(&self.service, &self.account)?;
        self.store
            .save(&self.service, &self.account, key.as_bytes())
            .inspect_err(|e| warn!(status = e.status, "failed to persist master key"))
    }

    /// The loaded master key
    pub fn current_key(&self) -> Result<Arc<MasterKey>, EncryptionError> {
        self.key
            .read()
            .as_ref()
            .cloned()
            .ok_or(EncryptionError::KeyUnavailable)
    }

    pub fn is_initialized(&self) -> bool {
        self.key.read().is_some()
    }
}
