//! Path management for FlowKey Vault
//!
//! ## Path Resolution Order
//!
//! 1. `FLOWKEY_DATA_DIR` environment variable (if set)
//! 2. The platform application-support directory (`directories::ProjectDirs`)
//!    - macOS: `~/Library/Application Support/app.FlowKey.FlowKey`
//!    - Linux: `$XDG_DATA_HOME/flowkey` or `~/.local/share/flowkey`
//!    - Windows: `%APPDATA%\FlowKey\FlowKey\data`

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::error::VaultError;

/// Name of the backup subfolder inside the base directory
pub const BACKUP_DIR_NAME: &str = "FlowKeyBackups";

/// Manages all paths used by FlowKey Vault
#[derive(Debug, Clone)]
pub struct FlowKeyPaths {
    /// Base directory for all FlowKey data
    base_dir: PathBuf,
}

impl FlowKeyPaths {
    /// Resolve the base directory from the environment or the platform default
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn new() -> Result<Self, VaultError> {
        let base_dir = if let Ok(custom) = std::env::var("FLOWKEY_DATA_DIR") {
            PathBuf::from(custom)
        } else {
            ProjectDirs::from("app", "FlowKey", "FlowKey")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .ok_or_else(|| {
                    VaultError::Config("Could not determine application support directory".into())
                })?
        };

        Ok(Self { base_dir })
    }

    /// Create FlowKeyPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Directory holding `.flowkeybackup` files
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join(BACKUP_DIR_NAME)
    }

    /// Key-value preferences file (holds the privacy settings blob)
    pub fn preferences_file(&self) -> PathBuf {
        self.base_dir.join("preferences.json")
    }

    /// Passphrase-sealed credential store
    pub fn credentials_file(&self) -> PathBuf {
        self.base_dir.join("credentials.json")
    }

    /// File-backed user data store used by the command-line front end
    pub fn user_data_file(&self) -> PathBuf {
        self.base_dir.join("userdata.json")
    }

    /// Ensure the base directory exists
    ///
    /// The backup directory is owned by `BackupStore::ensure_directory`.
    pub fn ensure_directories(&self) -> Result<(), VaultError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| VaultError::Io(format!("Failed to create base directory: {}", e)))
    }
}
