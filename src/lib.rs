//! FlowKey Vault - personal data protection for FlowKey
//!
//! This library keeps a FlowKey user's translation history, knowledge
//! documents, habits and settings safe at rest. It manages a device master
//! key, encrypts data with AES-256-GCM, writes rolling encrypted backups,
//! restores them behind a restore point, and securely erases files.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Data directory resolution and privacy settings
//! - `error`: Custom error types
//! - `crypto`: Master key, credential stores and authenticated encryption
//! - `storage`: Atomic file writes, key-value preferences and secure erase
//! - `models`: Record DTOs and the backup snapshot
//! - `datastore`: Boundary to the application's user data store
//! - `backup`: Snapshot collection, backup files and restore
//! - `executor`: Background job queue
//! - `vault`: Facade wiring everything together
//! - `cli`: Command-line handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use flowkey_vault::config::{FlowKeyPaths, PrivacySettings};
//! use flowkey_vault::crypto::{KeyManager, MemoryCredentialStore};
//! use flowkey_vault::vault::FlowKeyVault;
//!
//! let paths = FlowKeyPaths::new()?;
//! let keys = Arc::new(KeyManager::new(Arc::new(MemoryCredentialStore::new())));
//! let vault = FlowKeyVault::new(&paths, keys, data_store, PrivacySettings::default())?;
//! vault.initialize_key()?;
//! let backup = vault.create_backup()?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod datastore;
pub mod error;
pub mod executor;
pub mod models;
pub mod storage;
pub mod vault;

pub use error::{VaultError, VaultResult};
pub use vault::FlowKeyVault;
