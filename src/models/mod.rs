//! Data models for FlowKey Vault
//!
//! The DTOs exchanged with the user data store and the snapshot that groups
//! them into one backup.

pub mod records;
pub mod snapshot;

pub use records::{DocumentDto, HabitDto, SettingsDto, TranslationDto};
pub use snapshot::{BackupSnapshot, SchemaVersion};
