//! Secure credential stores
//!
//! The master key lives in a credential store addressed by a
//! (service, account) pair, the same shape as the platform keychains.
//! `save` adds a new entry and refuses to overwrite one; callers that want to
//! replace an entry delete it first.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::key_derivation::{derive_key, DerivedKey, KeyDerivationParams};
use crate::error::KeyStoreError;
use crate::storage::file_io::{read_json, write_json_atomic};

/// A store for small secrets addressed by (service, account)
pub trait CredentialStore: Send + Sync {
    /// Load the secret, or `None` if no entry exists
    fn load(&self, service: &str, account: &str) -> Result<Option<Vec<u8>>, KeyStoreError>;

    /// Add a new entry; fails with `DUPLICATE_ITEM` if one already exists
    fn save(&self, service: &str, account: &str, secret: &[u8]) -> Result<(), KeyStoreError>;

    /// Remove the entry; removing a missing entry succeeds
    fn delete(&self, service: &str, account: &str) -> Result<(), KeyStoreError>;
}

fn entry_name(service: &str, account: &str) -> String {
    format!("{}/{}", service, account)
}

/// In-process credential store
///
/// Nothing survives the process; intended for tests and for embedders that
/// bridge to a platform keychain themselves.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, service: &str, account: &str) -> Result<Option<Vec<u8>>, KeyStoreError> {
        Ok(self.entries.lock().get(&entry_name(service, account)).cloned())
    }

    fn save(&self, service: &str, account: &str, secret: &[u8]) -> Result<(), KeyStoreError> {
        let mut entries = self.entries.lock();
        let name = entry_name(service, account);
        if entries.contains_key(&name) {
            return Err(KeyStoreError::new(
                KeyStoreError::DUPLICATE_ITEM,
                format!("An entry for {} already exists", name),
            ));
        }
        entries.insert(name, secret.to_vec());
        Ok(())
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), KeyStoreError> {
        self.entries.lock().remove(&entry_name(service, account));
        Ok(())
    }
}

/// Plaintext sealed with the store key to detect a wrong passphrase
const VERIFIER_PLAINTEXT: &[u8] = b"flowkey-credentials-v1";
const NONCE_SIZE: usize = 12;

/// On-disk layout of the passphrase credential store
#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    kdf: Option<KeyDerivationParams>,
    verifier: String,
    entries: BTreeMap<String, String>,
}

/// File-backed credential store sealed under a passphrase
///
/// Entries are AES-256-GCM encrypted with an Argon2id key derived from the
/// passphrase; the entry name is bound as associated data so sealed values
/// cannot be swapped between entries.
pub struct PassphraseCredentialStore {
    path: PathBuf,
    key: DerivedKey,
    lock: Mutex<()>,
}

impl PassphraseCredentialStore {
    /// Open the store at `path`, creating it with `new_params` if absent
    ///
    /// Fails with `AUTH_FAILED` if the passphrase does not unlock an
    /// existing store.
    pub fn open(
        path: PathBuf,
        passphrase: &str,
        new_params: KeyDerivationParams,
    ) -> Result<Self, KeyStoreError> {
        let existing: CredentialFile = read_json(&path)
            .map_err(|e| KeyStoreError::io(format!("Failed to read credential store: {}", e)))?;

        let derive = |params: &KeyDerivationParams| {
            derive_key(passphrase, params)
                .map_err(|e| KeyStoreError::new(KeyStoreError::DECODE_FAILED, e.to_string()))
        };

        match existing.kdf {
            Some(ref params) => {
                let key = derive(params)?;
                let verified = open_sealed(&key, "verifier", &existing.verifier)
                    .map(|plain| plain == VERIFIER_PLAINTEXT)
                    .unwrap_or(false);
                if !verified {
                    return Err(KeyStoreError::new(
                        KeyStoreError::AUTH_FAILED,
                        "Passphrase does not unlock the credential store",
                    ));
                }
                Ok(Self {
                    path,
                    key,
                    lock: Mutex::new(()),
                })
            }
            None => {
                let key = derive(&new_params)?;
                let file = CredentialFile {
                    verifier: seal(&key, "verifier", VERIFIER_PLAINTEXT)?,
                    kdf: Some(new_params),
                    entries: BTreeMap::new(),
                };
                write_json_atomic(&path, &file).map_err(|e| {
                    KeyStoreError::io(format!("Failed to create credential store: {}", e))
                })?;
                debug!(path = %path.display(), "created passphrase credential store");
                Ok(Self {
                    path,
                    key,
                    lock: Mutex::new(()),
                })
            }
        }
    }

    fn read_file(&self) -> Result<CredentialFile, KeyStoreError> {
        read_json(&self.path)
            .map_err(|e| KeyStoreError::io(format!("Failed to read credential store: {}", e)))
    }

    fn write_file(&self, file: &CredentialFile) -> Result<(), KeyStoreError> {
        write_json_atomic(&self.path, file)
            .map_err(|e| KeyStoreError::io(format!("Failed to write credential store: {}", e)))
    }
}

impl CredentialStore for PassphraseCredentialStore {
    fn load(&self, service: &str, account: &str) -> Result<Option<Vec<u8>>, KeyStoreError> {
        let _guard = self.lock.lock();
        let name = entry_name(service, account);
        match self.read_file()?.entries.get(&name) {
            Some(sealed) => open_sealed(&self.key, &name, sealed).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, service: &str, account: &str, secret: &[u8]) -> Result<(), KeyStoreError> {
        let _guard = self.lock.lock();
        let name = entry_name(service, account);
        let mut file = self.read_file()?;
        if file.entries.contains_key(&name) {
            return Err(KeyStoreError::new(
                KeyStoreError::DUPLICATE_ITEM,
                format!("An entry for {} already exists", name),
            ));
        }
        let sealed = seal(&self.key, &name, secret)?;
        file.entries.insert(name, sealed);
        self.write_file(&file)
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), KeyStoreError> {
        let _guard = self.lock.lock();
        let mut file = self.read_file()?;
        if file.entries.remove(&entry_name(service, account)).is_some() {
            self.write_file(&file)?;
        }
        Ok(())
    }
}

fn seal(key: &DerivedKey, name: &str, plaintext: &[u8]) -> Result<String, KeyStoreError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| KeyStoreError::new(KeyStoreError::DECODE_FAILED, e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: name.as_bytes(),
            },
        )
        .map_err(|_| KeyStoreError::new(KeyStoreError::DECODE_FAILED, "Failed to seal entry"))?;

    let mut blob = nonce_bytes.to_vec();
    blob.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(blob))
}

fn open_sealed(key: &DerivedKey, name: &str, sealed: &str) -> Result<Vec<u8>, KeyStoreError> {
    let decode_failed = |msg: &str| KeyStoreError::new(KeyStoreError::DECODE_FAILED, msg);

    let blob = STANDARD
        .decode(sealed)
        .map_err(|_| decode_failed("Sealed entry is not valid base64"))?;
    if blob.len() < NONCE_SIZE {
        return Err(decode_failed("Sealed entry is truncated"));
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_SIZE);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| decode_failed(&e.to_string()))?;
    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: name.as_bytes(),
            },
        )
        .map_err(|_| {
            KeyStoreError::new(KeyStoreError::AUTH_FAILED, "Sealed entry failed authentication")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_save_load_delete() {
        let store = MemoryCredentialStore::new();
        assert!(store.load("svc", "acct").unwrap().is_none());

        store.save("svc", "acct", b"secret").unwrap();
        assert_eq!(store.load("svc", "acct").unwrap().unwrap(), b"secret");

        store.delete("svc", "acct").unwrap();
        assert!(store.load("svc", "acct").unwrap().is_none());
        store.delete("svc", "acct").unwrap();
    }

    #[test]
    fn test_memory_store_rejects_duplicate() {
        let store = MemoryCredentialStore::new();
        store.save("svc", "acct", b"one").unwrap();

        let err = store.save("svc", "acct", b"two").unwrap_err();
        assert_eq!(err.status, KeyStoreError::DUPLICATE_ITEM);
        assert_eq!(store.load("svc", "acct").unwrap().unwrap(), b"one");
    }

    #[test]
    fn test_passphrase_store_persists_across_opens() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");

        {
            let store =
                PassphraseCredentialStore::open(path.clone(), "pw", KeyDerivationParams::light())
                    .unwrap();
            store.save("svc", "acct", b"master-key-bytes").unwrap();
        }

        let store =
            PassphraseCredentialStore::open(path.clone(), "pw", KeyDerivationParams::light())
                .unwrap();
        assert_eq!(
            store.load("svc", "acct").unwrap().unwrap(),
            b"master-key-bytes"
        );

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("master-key-bytes"));
    }

    #[test]
    fn test_passphrase_store_wrong_passphrase() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");

        PassphraseCredentialStore::open(path.clone(), "right", KeyDerivationParams::light())
            .unwrap();

        let err = PassphraseCredentialStore::open(path, "wrong", KeyDerivationParams::light())
            .err()
            .unwrap();
        assert_eq!(err.status, KeyStoreError::AUTH_FAILED);
    }

    #[test]
    fn test_passphrase_store_delete_then_save() {
        let temp_dir = TempDir::new().unwrap();
        let store = PassphraseCredentialStore::open(
            temp_dir.path().join("credentials.json"),
            "pw",
            KeyDerivationParams::light(),
        )
        .unwrap();

        store.save("svc", "acct", b"old").unwrap();
        assert_eq!(
            store.save("svc", "acct", b"new").unwrap_err().status,
            KeyStoreError::DUPLICATE_ITEM
        );

        store.delete("svc", "acct").unwrap();
        store.save("svc", "acct", b"new").unwrap();
        assert_eq!(store.load("svc", "acct").unwrap().unwrap(), b"new");
    }
}
