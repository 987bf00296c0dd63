//! Cryptographic layer for FlowKey Vault
//!
//! Provides the master key lifecycle, AES-256-GCM authenticated encryption,
//! and the credential stores the master key is persisted in.

pub mod cipher;
pub mod credential_store;
pub mod key_derivation;
pub mod key_manager;
pub mod secure_memory;

pub use cipher::{CipherService, EncryptedBlob, NONCE_SIZE, TAG_SIZE};
pub use credential_store::{CredentialStore, MemoryCredentialStore, PassphraseCredentialStore};
pub use key_derivation::{derive_key, DerivedKey, KeyDerivationParams};
pub use key_manager::{KeyManager, MasterKey};
pub use secure_memory::SecureString;
