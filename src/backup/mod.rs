//! Backup and restore of user data
//!
//! # Architecture
//!
//! - `SnapshotCollector`: reads the data store into a `BackupSnapshot`
//! - `BackupCodec`: turns snapshots into backup file bytes and back
//! - `BackupStore`: names, writes, lists, prunes and deletes backup files
//! - `RestoreCoordinator`: validates a backup and applies it, with a restore point
//!
//! # Backup Format
//!
//! One format byte (`0` plaintext, `1` encrypted) followed by the snapshot
//! JSON, encrypted with AES-256-GCM when the flag is `1`. Files are named
//! `Backup_<YYYY-MM-DD_HH-MM-SS>.flowkeybackup`.
//!
//! # Retention Policy
//!
//! After each new backup the oldest files beyond `max_backup_files` (default
//! 10) are removed, securely erased unless configured otherwise.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowkey_vault::backup::{BackupStore, RestoreCoordinator, SnapshotCollector};
//!
//! let snapshot = collector.collect()?;
//! let backup = store.create(&snapshot, true)?;
//!
//! // Later
//! let result = coordinator.restore(&backup.path)?;
//! println!("{}", result.summary());
//! ```

mod codec;
mod collector;
mod restore;
mod store;

pub use codec::{probe_version, BackupCodec, BackupFormat};
pub use collector::{SnapshotCollector, SnapshotLimits};
pub use restore::{
    validate, BackupInspection, RestoreCoordinator, RestoreOptions, RestoreResult, RestoreState,
};
pub use store::{
    read_backup, BackupFile, BackupStore, BackupStoreConfig, BACKUP_EXTENSION,
    DEFAULT_MAX_BACKUP_FILES,
};
