//! Privacy settings for FlowKey Vault
//!
//! Settings live in the key-value preferences file under a single key. The
//! stored value is an envelope `{ "encrypted": bool, "data": string }` where
//! `data` is either the settings JSON or its `encrypt_string` output.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::paths::FlowKeyPaths;
use crate::backup::BackupStoreConfig;
use crate::crypto::CipherService;
use crate::error::{VaultError, VaultResult};
use crate::storage::secure_erase::DEFAULT_PASSES;
use crate::storage::{KeyValueStore, SecureEraser};

/// Preferences key holding the settings envelope
pub const SETTINGS_KEY: &str = "privacySettings";

/// User-facing privacy and backup preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettings {
    /// Encrypt backup files with the master key
    #[serde(default = "default_true")]
    pub encrypt_backups: bool,

    /// Overwrite pruned and deleted backups before unlinking
    #[serde(default = "default_true")]
    pub secure_delete: bool,

    /// Overwrite passes for secure deletion
    #[serde(default = "default_erase_passes")]
    pub erase_passes: u32,

    /// Number of backup files to keep
    #[serde(default = "default_max_backup_files")]
    pub max_backup_files: usize,

    #[serde(default = "default_true")]
    pub auto_backup_enabled: bool,

    #[serde(default = "default_auto_backup_interval_hours")]
    pub auto_backup_interval_hours: u32,
}

fn default_true() -> bool {
    true
}

fn default_erase_passes() -> u32 {
    DEFAULT_PASSES
}

fn default_max_backup_files() -> usize {
    crate::backup::DEFAULT_MAX_BACKUP_FILES
}

fn default_auto_backup_interval_hours() -> u32 {
    24
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            encrypt_backups: true,
            secure_delete: true,
            erase_passes: default_erase_passes(),
            max_backup_files: default_max_backup_files(),
            auto_backup_enabled: true,
            auto_backup_interval_hours: default_auto_backup_interval_hours(),
        }
    }
}

impl PrivacySettings {
    pub fn validate(&self) -> VaultResult<()> {
        if self.erase_passes < 1 {
            return Err(VaultError::Validation(
                "erasePasses must be at least 1".into(),
            ));
        }
        if self.max_backup_files < 1 {
            return Err(VaultError::Validation(
                "maxBackupFiles must be at least 1".into(),
            ));
        }
        if self.auto_backup_interval_hours < 1 {
            return Err(VaultError::Validation(
                "autoBackupIntervalHours must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Whether an automatic backup should be taken at `now`
    pub fn backup_due(&self, latest: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        if !self.auto_backup_enabled {
            return false;
        }
        match latest {
            Some(latest) => now - latest >= Duration::hours(i64::from(self.auto_backup_interval_hours)),
            None => true,
        }
    }

    pub fn eraser(&self) -> SecureEraser {
        SecureEraser::new(self.erase_passes)
    }

    pub fn store_config(&self) -> BackupStoreConfig {
        BackupStoreConfig {
            max_backup_files: self.max_backup_files,
            secure_prune: self.secure_delete,
        }
    }

    /// Set one field from its command-line spelling
    pub fn set_field(&mut self, field: &str, value: &str) -> VaultResult<()> {
        fn parse<T: std::str::FromStr>(field: &str, value: &str) -> VaultResult<T> {
            value.parse().map_err(|_| {
                VaultError::Validation(format!("Invalid value '{}' for {}", value, field))
            })
        }

        match field {
            "encrypt-backups" | "encryptBackups" => self.encrypt_backups = parse(field, value)?,
            "secure-delete" | "secureDelete" => self.secure_delete = parse(field, value)?,
            "erase-passes" | "erasePasses" => self.erase_passes = parse(field, value)?,
            "max-backup-files" | "maxBackupFiles" => self.max_backup_files = parse(field, value)?,
            "auto-backup" | "autoBackupEnabled" => self.auto_backup_enabled = parse(field, value)?,
            "auto-backup-interval" | "autoBackupIntervalHours" => {
                self.auto_backup_interval_hours = parse(field, value)?
            }
            other => {
                return Err(VaultError::Validation(format!(
                    "Unknown setting '{}'",
                    other
                )))
            }
        }
        self.validate()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsEnvelope {
    encrypted: bool,
    data: String,
}

/// Loads and saves `PrivacySettings` in the preferences file
pub struct SettingsStore {
    prefs: KeyValueStore,
    cipher: Option<Arc<CipherService>>,
}

impl SettingsStore {
    /// Store that writes settings in the clear
    pub fn new(paths: &FlowKeyPaths) -> Self {
        Self {
            prefs: KeyValueStore::new(paths.preferences_file()),
            cipher: None,
        }
    }

    /// Store that encrypts settings with `cipher`
    pub fn with_cipher(paths: &FlowKeyPaths, cipher: Arc<CipherService>) -> Self {
        Self {
            prefs: KeyValueStore::new(paths.preferences_file()),
            cipher: Some(cipher),
        }
    }

    /// Load settings, or defaults if none have been saved
    pub fn load(&self) -> VaultResult<PrivacySettings> {
        let Some(envelope) = self.prefs.get::<SettingsEnvelope>(SETTINGS_KEY)? else {
            return Ok(PrivacySettings::default());
        };

        let json = if envelope.encrypted {
            let cipher = self.cipher.as_ref().ok_or_else(|| {
                VaultError::Config("Settings are encrypted; the master key is required".into())
            })?;
            cipher.decrypt_string(&envelope.data)?
        } else {
            envelope.data
        };

        let settings: PrivacySettings = serde_json::from_str(&json)
            .map_err(|e| VaultError::Config(format!("Failed to parse privacy settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, settings: &PrivacySettings) -> VaultResult<()> {
        settings.validate()?;
        let json = serde_json::to_string(settings)?;

        let envelope = match &self.cipher {
            Some(cipher) => SettingsEnvelope {
                encrypted: true,
                data: cipher.encrypt_string(&json)?,
            },
            None => SettingsEnvelope {
                encrypted: false,
                data: json,
            },
        };

        self.prefs.set(SETTINGS_KEY, &envelope)?;
        debug!(encrypted = envelope.encrypted, "privacy settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyManager, MemoryCredentialStore};
    use tempfile::TempDir;

    fn test_cipher() -> Arc<CipherService> {
        let keys = Arc::new(KeyManager::new(Arc::new(MemoryCredentialStore::new())));
        keys.initialize().unwrap();
        Arc::new(CipherService::new(keys))
    }

    #[test]
    fn test_default_settings() {
        let settings = PrivacySettings::default();
        assert!(settings.encrypt_backups);
        assert!(settings.secure_delete);
        assert_eq!(settings.erase_passes, 3);
        assert_eq!(settings.max_backup_files, 10);
        assert_eq!(settings.auto_backup_interval_hours, 24);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: PrivacySettings = serde_json::from_str(r#"{"maxBackupFiles":4}"#).unwrap();
        assert_eq!(settings.max_backup_files, 4);
        assert!(settings.encrypt_backups);
    }

    #[test]
    fn test_save_and_load_plain() {
        let temp_dir = TempDir::new().unwrap();
        let paths = FlowKeyPaths::with_base_dir(temp_dir.path().to_path_buf());
        let store = SettingsStore::new(&paths);

        assert_eq!(store.load().unwrap(), PrivacySettings::default());

        let settings = PrivacySettings {
            max_backup_files: 3,
            ..PrivacySettings::default()
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn test_save_and_load_encrypted() {
        let temp_dir = TempDir::new().unwrap();
        let paths = FlowKeyPaths::with_base_dir(temp_dir.path().to_path_buf());
        let cipher = test_cipher();
        let store = SettingsStore::with_cipher(&paths, cipher.clone());

        let settings = PrivacySettings {
            erase_passes: 7,
            ..PrivacySettings::default()
        };
        store.save(&settings).unwrap();

        let raw = std::fs::read_to_string(paths.preferences_file()).unwrap();
        assert!(raw.contains("\"encrypted\": true"));
        assert!(!raw.contains("erasePasses"));
        assert_eq!(store.load().unwrap(), settings);

        let without_key = SettingsStore::new(&paths);
        assert!(matches!(without_key.load(), Err(VaultError::Config(_))));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let paths = FlowKeyPaths::with_base_dir(temp_dir.path().to_path_buf());
        let store = SettingsStore::new(&paths);

        let settings = PrivacySettings {
            erase_passes: 0,
            ..PrivacySettings::default()
        };
        assert!(matches!(store.save(&settings), Err(VaultError::Validation(_))));
    }

    #[test]
    fn test_set_field() {
        let mut settings = PrivacySettings::default();
        settings.set_field("max-backup-files", "5").unwrap();
        settings.set_field("encryptBackups", "false").unwrap();
        assert_eq!(settings.max_backup_files, 5);
        assert!(!settings.encrypt_backups);

        assert!(settings.set_field("max-backup-files", "0").is_err());
        assert!(settings.set_field("erase-passes", "many").is_err());
        assert!(settings.set_field("colour", "blue").is_err());
    }

    #[test]
    fn test_backup_due() {
        let settings = PrivacySettings::default();
        let now = Utc::now();

        assert!(settings.backup_due(None, now));
        assert!(!settings.backup_due(Some(now - Duration::hours(23)), now));
        assert!(settings.backup_due(Some(now - Duration::hours(24)), now));

        let disabled = PrivacySettings {
            auto_backup_enabled: false,
            ..PrivacySettings::default()
        };
        assert!(!disabled.backup_due(None, now));
    }
}
