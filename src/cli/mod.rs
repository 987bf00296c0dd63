//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the vault facade.

pub mod backup;
pub mod erase;
pub mod key;
pub mod settings;

pub use backup::{handle_backup_command, BackupCommands};
pub use erase::handle_erase_command;
pub use key::{handle_key_command, KeyCommands};
pub use settings::{handle_settings_command, SettingsCommands};

use std::sync::Arc;

use crate::config::{FlowKeyPaths, SettingsStore};
use crate::crypto::{CipherService, KeyDerivationParams, KeyManager, PassphraseCredentialStore, SecureString};
use crate::datastore::JsonDataStore;
use crate::error::{VaultError, VaultResult};
use crate::vault::FlowKeyVault;

/// Environment variable supplying the credential store passphrase
pub const PASSPHRASE_ENV: &str = "FLOWKEY_PASSPHRASE";
/// Environment variable selecting Argon2 cost for new credential stores (`standard` or `light`)
pub const KDF_PROFILE_ENV: &str = "FLOWKEY_KDF_PROFILE";

const MIN_PASSPHRASE_LEN: usize = 8;

/// Shared state for command handlers
pub struct CliContext {
    paths: FlowKeyPaths,
}

impl CliContext {
    pub fn new(paths: FlowKeyPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &FlowKeyPaths {
        &self.paths
    }

    /// Whether a credential store has been created
    pub fn has_credentials(&self) -> bool {
        self.paths.credentials_file().exists()
    }

    /// Unlock (or create) the passphrase credential store
    pub fn credentials(&self) -> VaultResult<Arc<PassphraseCredentialStore>> {
        let creating = !self.has_credentials();
        let passphrase = read_passphrase(creating)?;
        self.paths.ensure_directories()?;

        let store = PassphraseCredentialStore::open(
            self.paths.credentials_file(),
            &passphrase,
            kdf_params()?,
        )?;
        Ok(Arc::new(store))
    }

    /// Key manager with the master key loaded, created on first use
    pub fn key_manager(&self) -> VaultResult<Arc<KeyManager>> {
        let keys = Arc::new(KeyManager::new(self.credentials()?));
        keys.initialize()?;
        Ok(keys)
    }

    pub fn settings_store(&self, keys: &Arc<KeyManager>) -> SettingsStore {
        SettingsStore::with_cipher(&self.paths, Arc::new(CipherService::new(keys.clone())))
    }

    /// Fully wired vault over the file-backed user data store
    pub fn open_vault(&self) -> VaultResult<FlowKeyVault> {
        let keys = self.key_manager()?;
        let settings = self.settings_store(&keys).load()?;
        let data = Arc::new(JsonDataStore::new(self.paths.user_data_file()));
        FlowKeyVault::new(&self.paths, keys, data, settings)
    }
}

fn kdf_params() -> VaultResult<KeyDerivationParams> {
    match std::env::var(KDF_PROFILE_ENV).as_deref() {
        Err(_) | Ok("standard") => Ok(KeyDerivationParams::new()),
        Ok("light") => Ok(KeyDerivationParams::light()),
        Ok(other) => Err(VaultError::Config(format!(
            "Unknown {} '{}': expected 'standard' or 'light'",
            KDF_PROFILE_ENV, other
        ))),
    }
}

/// Passphrase from the environment, or prompted on the terminal
fn read_passphrase(confirm: bool) -> VaultResult<SecureString> {
    if let Ok(passphrase) = std::env::var(PASSPHRASE_ENV) {
        if passphrase.is_empty() {
            return Err(VaultError::Validation(format!("{} is empty", PASSPHRASE_ENV)));
        }
        return Ok(SecureString::from(passphrase));
    }

    if !confirm {
        return prompt_passphrase("Passphrase: ");
    }

    println!("Creating a new credential store for the master key.");
    println!("IMPORTANT: If you forget this passphrase, encrypted backups cannot be recovered!");
    loop {
        let first = prompt_passphrase("Enter new passphrase: ")?;
        if first.len() < MIN_PASSPHRASE_LEN {
            println!(
                "Passphrase must be at least {} characters. Please try again.",
                MIN_PASSPHRASE_LEN
            );
            continue;
        }

        let second = prompt_passphrase("Confirm passphrase: ")?;
        if first.as_str() != second.as_str() {
            println!("Passphrases do not match. Please try again.");
            continue;
        }
        return Ok(first);
    }
}

fn prompt_passphrase(prompt: &str) -> VaultResult<SecureString> {
    rpassword::prompt_password(prompt)
        .map(SecureString::from)
        .map_err(|e| VaultError::Io(format!("Failed to read passphrase: {}", e)))
}

/// Format a file size in human-readable form
pub(crate) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
