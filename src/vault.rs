//! Application facade
//!
//! `FlowKeyVault` wires the key manager, cipher, backup store and restore
//! coordinator together from explicitly supplied dependencies. Embedders and
//! the command-line front end both go through it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::backup::{
    BackupCodec, BackupFile, BackupInspection, BackupStore, RestoreCoordinator, RestoreOptions,
    RestoreResult, SnapshotCollector,
};
use crate::config::{FlowKeyPaths, PrivacySettings};
use crate::crypto::{CipherService, KeyManager};
use crate::datastore::DataStore;
use crate::error::{BackupError, VaultError, VaultResult};
use crate::executor::{JobHandle, SerialExecutor};
use crate::storage::SecureEraser;

/// Everything backup and restore needs, built once per process
pub struct FlowKeyVault {
    keys: Arc<KeyManager>,
    cipher: Arc<CipherService>,
    collector: Arc<SnapshotCollector>,
    store: Arc<BackupStore>,
    restorer: Arc<RestoreCoordinator>,
    eraser: SecureEraser,
    settings: PrivacySettings,
    executor: SerialExecutor,
}

impl FlowKeyVault {
    /// Build the component graph around `keys`
    ///
    /// The key does not have to be loaded yet; see `initialize_key`.
    pub fn new(
        paths: &FlowKeyPaths,
        keys: Arc<KeyManager>,
        data: Arc<dyn DataStore>,
        settings: PrivacySettings,
    ) -> VaultResult<Self> {
        settings.validate()?;

        let cipher = Arc::new(CipherService::new(keys.clone()));
        let codec = Arc::new(BackupCodec::new(cipher.clone()));
        let eraser = settings.eraser();
        let store = Arc::new(BackupStore::new(
            paths.backup_dir(),
            codec.clone(),
            eraser,
            settings.store_config(),
        ));
        let collector = Arc::new(SnapshotCollector::new(data.clone()));
        let restorer = Arc::new(RestoreCoordinator::new(
            store.clone(),
            codec,
            collector.clone(),
            data,
        ));

        Ok(Self {
            keys,
            cipher,
            collector,
            store,
            restorer,
            eraser,
            settings,
            executor: SerialExecutor::new("flowkey-backup")?,
        })
    }

    /// Load or create the master key
    pub fn initialize_key(&self) -> VaultResult<()> {
        self.keys.initialize()?;
        Ok(())
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn cipher(&self) -> &Arc<CipherService> {
        &self.cipher
    }

    pub fn store(&self) -> &Arc<BackupStore> {
        &self.store
    }

    pub fn restorer(&self) -> &Arc<RestoreCoordinator> {
        &self.restorer
    }

    pub fn settings(&self) -> &PrivacySettings {
        &self.settings
    }

    /// Back up the current data, encrypted per the settings
    pub fn create_backup(&self) -> VaultResult<BackupFile> {
        self.create_backup_with(self.settings.encrypt_backups)
    }

    pub fn create_backup_with(&self, encrypt: bool) -> VaultResult<BackupFile> {
        Ok(run_backup(&self.collector, &self.store, encrypt)?)
    }

    pub fn list_backups(&self) -> VaultResult<Vec<BackupFile>> {
        Ok(self.store.list()?)
    }

    pub fn prune_backups(&self) -> VaultResult<Vec<BackupFile>> {
        Ok(self.store.prune()?)
    }

    pub fn delete_backup(&self, id: &str) -> VaultResult<()> {
        match self.store.delete(id) {
            Err(BackupError::FileNotFound(_)) => Err(VaultError::backup_not_found(id)),
            other => Ok(other?),
        }
    }

    /// Find a backup by id, file path, or `latest`
    pub fn resolve_backup(&self, reference: &str) -> VaultResult<PathBuf> {
        if reference == "latest" {
            return self
                .store
                .latest()?
                .map(|backup| backup.path)
                .ok_or_else(|| VaultError::backup_not_found(reference));
        }

        let as_path = Path::new(reference);
        if as_path.is_file() {
            return Ok(as_path.to_path_buf());
        }

        let id = reference
            .strip_suffix(&format!(".{}", crate::backup::BACKUP_EXTENSION))
            .unwrap_or(reference);
        match self.store.get(id) {
            Ok(Some(backup)) => Ok(backup.path),
            Ok(None) | Err(_) => Err(VaultError::backup_not_found(reference)),
        }
    }

    pub fn restore_backup(&self, path: &Path, options: RestoreOptions) -> VaultResult<RestoreResult> {
        Ok(self.restorer.restore_with(path, options)?)
    }

    pub fn inspect_backup(&self, path: &Path) -> VaultResult<BackupInspection> {
        Ok(self.restorer.inspect(path)?)
    }

    /// Take a backup if automatic backups are on and the interval has passed
    pub fn run_auto_backup(&self) -> VaultResult<Option<BackupFile>> {
        let latest = self.store.latest()?.map(|backup| backup.created_at);
        if !self.settings.backup_due(latest, Utc::now()) {
            debug!("automatic backup not due");
            return Ok(None);
        }
        info!("automatic backup due");
        self.create_backup().map(Some)
    }

    /// Overwrite and unlink a file with the configured pass count
    pub fn securely_delete(&self, path: &Path) -> VaultResult<()> {
        Ok(self.eraser.securely_delete(path)?)
    }

    pub fn initialize_key_in_background(&self) -> JobHandle<VaultResult<()>> {
        let keys = self.keys.clone();
        self.executor.submit(move || -> VaultResult<()> {
            keys.initialize()?;
            Ok(())
        })
    }

    pub fn create_backup_in_background(&self) -> JobHandle<VaultResult<BackupFile>> {
        let collector = self.collector.clone();
        let store = self.store.clone();
        let encrypt = self.settings.encrypt_backups;
        self.executor
            .submit(move || -> VaultResult<BackupFile> {
                Ok(run_backup(&collector, &store, encrypt)?)
            })
    }

    pub fn restore_in_background(
        &self,
        path: PathBuf,
        options: RestoreOptions,
    ) -> JobHandle<VaultResult<RestoreResult>> {
        let restorer = self.restorer.clone();
        self.executor
            .submit(move || -> VaultResult<RestoreResult> {
                Ok(restorer.restore_with(&path, options)?)
            })
    }

    pub fn securely_delete_in_background(&self, path: PathBuf) -> JobHandle<VaultResult<()>> {
        let eraser = self.eraser;
        self.executor
            .submit(move || -> VaultResult<()> { Ok(eraser.securely_delete(&path)?) })
    }
}

fn run_backup(
    collector: &SnapshotCollector,
    store: &BackupStore,
    encrypt: bool,
) -> Result<BackupFile, BackupError> {
    let snapshot = collector.collect()?;
    store.create(&snapshot, encrypt)
}
