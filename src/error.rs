//! Error types for FlowKey Vault
//!
//! Each subsystem has its own error enum so callers can tell a missing backup
//! from a corrupt one, or a tampered payload from a missing key. `VaultError`
//! is the application-level umbrella used by the facade and the CLI.

use std::path::PathBuf;

use thiserror::Error;

use crate::backup::BackupFile;

/// Failure reported by a secure credential store
///
/// Status codes follow the platform keychain convention: negative values are
/// store-defined failures, `0` is never used for an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Credential store error (status {status}): {message}")]
pub struct KeyStoreError {
    pub status: i32,
    pub message: String,
}

impl KeyStoreError {
    /// An entry already exists for the (service, account) pair
    pub const DUPLICATE_ITEM: i32 = -25299;
    /// The underlying storage could not be read or written
    pub const IO_FAILURE: i32 = -36;
    /// The store could not be unlocked (wrong passphrase)
    pub const AUTH_FAILED: i32 = -25293;
    /// An entry exists but its contents are unusable
    pub const DECODE_FAILED: i32 = -26275;

    pub fn new(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(Self::IO_FAILURE, message)
    }
}

/// Errors from the authenticated encryption layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    /// The master key has not been loaded
    #[error("Master key is not available; the key manager has not been initialized")]
    KeyUnavailable,

    /// Input is too short or otherwise not an encrypted blob
    #[error("Malformed encrypted blob: {0}")]
    MalformedBlob(String),

    /// Tag verification failed: tampered data or wrong key
    #[error("Authentication failed: data was tampered with or encrypted under a different key")]
    AuthenticationFailure,

    /// Input was not valid base64 or the plaintext was not valid UTF-8
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Errors from secure file erasure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EraseError {
    #[error("Secure erase of {path} failed: {reason}")]
    IoFailure { path: PathBuf, reason: String },
}

/// Error returned by the external data store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Data store error: {0}")]
pub struct StoreError(pub String);

/// Errors from backup creation, listing, decoding and restore
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackupError {
    #[error("Backup file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid backup data: {0}")]
    InvalidBackupData(String),

    #[error("Incompatible backup version {found}: expected major version {expected}")]
    IncompatibleVersion { found: String, expected: u32 },

    #[error("Backup I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Erase(#[from] EraseError),

    #[error(transparent)]
    DataStore(#[from] StoreError),
}

impl BackupError {
    /// Check whether the backup failed authentication (tampered or wrong key)
    pub fn is_tampered(&self) -> bool {
        matches!(self, Self::Encryption(EncryptionError::AuthenticationFailure))
    }
}

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// A failed restore, with what the caller needs to decide on recovery
#[derive(Error, Debug, Clone)]
#[error("Restore failed: {error}")]
pub struct RestoreError {
    /// What went wrong
    #[source]
    pub error: BackupError,
    /// The safety backup taken before applying, if one was written
    pub restore_point: Option<BackupFile>,
    /// Whether the pre-restore state was re-applied after a failed apply
    pub rolled_back: bool,
}

impl RestoreError {
    /// A failure that happened before anything was touched
    pub(crate) fn untouched(error: BackupError) -> Self {
        Self {
            error,
            restore_point: None,
            rolled_back: false,
        }
    }

    /// Whether a restore point exists that can be restored manually
    pub fn can_roll_back(&self) -> bool {
        self.restore_point.is_some()
    }
}

/// The main error type for FlowKey Vault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for user input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Erase(#[from] EraseError),

    #[error(transparent)]
    Backup(#[from] BackupError),

    #[error(transparent)]
    Restore(#[from] RestoreError),

    #[error(transparent)]
    DataStore(#[from] StoreError),

    /// The background worker exited before delivering a result
    #[error("Background worker stopped before the job completed")]
    WorkerStopped,
}

impl VaultError {
    /// Create a "not found" error for backups
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Backup(BackupError::FileNotFound(_))
        )
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for FlowKey Vault operations
pub type VaultResult<T> = Result<T, VaultError>;
