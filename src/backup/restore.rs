//! Backup restoration
//!
//! A restore runs `Validating -> SnapshottingCurrent -> Applying` and ends in
//! `Completed` or `Failed`. Nothing in the data store is touched until the
//! backup has decoded, passed validation, and a restore point of the current
//! data has been written. If applying fails part way, the restore point is
//! re-applied so the store is not left half restored.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::codec::{BackupCodec, BackupFormat};
use super::collector::SnapshotCollector;
use super::store::{read_backup, BackupFile, BackupStore};
use crate::datastore::{DataStore, UserData};
use crate::error::{BackupError, RestoreError};
use crate::models::{BackupSnapshot, SchemaVersion, SettingsDto};

/// Where a restore currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreState {
    #[default]
    Idle,
    Validating,
    SnapshottingCurrent,
    Applying,
    Completed,
    Failed,
}

/// Per-call restore options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Write a backup of the current data before applying (and roll back to it on failure)
    pub create_restore_point: bool,
    /// Encrypt the restore point
    pub encrypt_restore_point: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            create_restore_point: true,
            encrypt_restore_point: true,
        }
    }
}

/// Result of a successful restore
#[derive(Debug, Clone)]
pub struct RestoreResult {
    /// Id of the snapshot that was restored
    pub backup_id: Uuid,
    /// When that snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Records written back, counting settings as one
    pub items_restored: usize,
    pub success: bool,
    /// Backup of the data as it was before the restore
    pub restore_point: Option<BackupFile>,
}

impl RestoreResult {
    pub fn summary(&self) -> String {
        match &self.restore_point {
            Some(point) => format!(
                "Restored {} item(s) from snapshot taken {}; previous data saved as {}",
                self.items_restored,
                self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                point.file_name
            ),
            None => format!(
                "Restored {} item(s) from snapshot taken {}",
                self.items_restored,
                self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        }
    }
}

/// What a backup contains, without restoring it
#[derive(Debug, Clone)]
pub struct BackupInspection {
    pub snapshot_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub schema_version: SchemaVersion,
    pub encrypted: bool,
    pub translations: usize,
    pub has_settings: bool,
    pub documents: usize,
    pub habits: usize,
}

impl BackupInspection {
    pub fn summary(&self) -> String {
        format!(
            "v{} {}: {} translation(s), {} document(s), {} habit(s), settings {}",
            self.schema_version,
            if self.encrypted { "encrypted" } else { "plaintext" },
            self.translations,
            self.documents,
            self.habits,
            if self.has_settings { "included" } else { "not included" }
        )
    }
}

/// Validates backups and applies them to the data store
pub struct RestoreCoordinator {
    store: Arc<BackupStore>,
    codec: Arc<BackupCodec>,
    collector: Arc<SnapshotCollector>,
    data: Arc<dyn DataStore>,
    expected_major: u32,
    state: Mutex<RestoreState>,
    run_lock: Mutex<()>,
}

impl RestoreCoordinator {
    pub fn new(
        store: Arc<BackupStore>,
        codec: Arc<BackupCodec>,
        collector: Arc<SnapshotCollector>,
        data: Arc<dyn DataStore>,
    ) -> Self {
        Self {
            store,
            codec,
            collector,
            data,
            expected_major: SchemaVersion::CURRENT.major,
            state: Mutex::new(RestoreState::Idle),
            run_lock: Mutex::new(()),
        }
    }

    /// Accept backups of a different major schema version
    pub fn with_expected_major(mut self, major: u32) -> Self {
        self.expected_major = major;
        self
    }

    pub fn state(&self) -> RestoreState {
        *self.state.lock()
    }

    fn set_state(&self, state: RestoreState) {
        debug!(?state, "restore state");
        *self.state.lock() = state;
    }

    /// Restore with a restore point taken first
    pub fn restore(&self, path: &Path) -> Result<RestoreResult, RestoreError> {
        self.restore_with(path, RestoreOptions::default())
    }

    pub fn restore_with(
        &self,
        path: &Path,
        options: RestoreOptions,
    ) -> Result<RestoreResult, RestoreError> {
        let _running = self.run_lock.lock();

        let result = self.run(path, options);
        match &result {
            Ok(restored) => {
                self.set_state(RestoreState::Completed);
                info!(
                    snapshot_id = %restored.backup_id,
                    items = restored.items_restored,
                    "restore completed"
                );
            }
            Err(err) => {
                self.set_state(RestoreState::Failed);
                error!(
                    error = %err.error,
                    restore_point = err.restore_point.as_ref().map(|p| p.id.as_str()),
                    rolled_back = err.rolled_back,
                    "restore failed"
                );
            }
        }
        result
    }

    fn run(&self, path: &Path, options: RestoreOptions) -> Result<RestoreResult, RestoreError> {
        self.set_state(RestoreState::Validating);
        let bytes = read_backup(path).map_err(RestoreError::untouched)?;
        let snapshot = self
            .codec
            .decode(&bytes, self.expected_major)
            .map_err(RestoreError::untouched)?;
        validate(&snapshot).map_err(RestoreError::untouched)?;

        let safety_net = if options.create_restore_point {
            self.set_state(RestoreState::SnapshottingCurrent);
            let current = self
                .collector
                .collect()
                .map_err(|e| RestoreError::untouched(e.into()))?;
            let file = self
                .store
                .create_keeping(&current, options.encrypt_restore_point, path)
                .map_err(RestoreError::untouched)?;
            info!(restore_point = %file.id, "restore point created");
            Some((file, current))
        } else {
            warn!("restoring without a restore point");
            None
        };

        self.set_state(RestoreState::Applying);
        match self.apply(&snapshot) {
            Ok(items_restored) => Ok(RestoreResult {
                backup_id: snapshot.id,
                timestamp: snapshot.timestamp,
                items_restored,
                success: true,
                restore_point: safety_net.map(|(file, _)| file),
            }),
            Err(apply_error) => {
                let (restore_point, rolled_back) = match safety_net {
                    Some((file, previous)) => {
                        let rolled_back = match self.roll_back(&previous) {
                            Ok(_) => {
                                warn!(restore_point = %file.id, "apply failed; previous data re-applied");
                                true
                            }
                            Err(e) => {
                                error!(error = %e, restore_point = %file.id, "rollback failed; restore the restore point manually");
                                false
                            }
                        };
                        (Some(file), rolled_back)
                    }
                    None => (None, false),
                };
                Err(RestoreError {
                    error: apply_error,
                    restore_point,
                    rolled_back,
                })
            }
        }
    }

    /// Replace the store's collections with the snapshot's
    ///
    /// Settings are only replaced when the snapshot carries them.
    fn apply(&self, snapshot: &BackupSnapshot) -> Result<usize, BackupError> {
        let settings = match &snapshot.settings {
            Some(settings) => Some(settings.clone()),
            None => self.data.get_settings()?,
        };
        self.data.replace_all(&user_data(snapshot, settings))?;

        Ok(snapshot.item_count())
    }

    /// Put the restore point back exactly, clearing settings it did not have
    fn roll_back(&self, previous: &BackupSnapshot) -> Result<(), BackupError> {
        self.data
            .replace_all(&user_data(previous, previous.settings.clone()))?;
        Ok(())
    }

    /// Check a decoded snapshot before it is applied
    pub fn validate(&self, snapshot: &BackupSnapshot) -> Result<(), BackupError> {
        validate(snapshot)
    }

    /// Decode and validate a backup without touching any data
    pub fn inspect(&self, path: &Path) -> Result<BackupInspection, BackupError> {
        let bytes = read_backup(path)?;
        let encrypted = BackupFormat::detect(&bytes)? == BackupFormat::Encrypted;
        let snapshot = self.codec.decode(&bytes, self.expected_major)?;
        validate(&snapshot)?;

        Ok(BackupInspection {
            snapshot_id: snapshot.id,
            timestamp: snapshot.timestamp,
            schema_version: snapshot.schema_version,
            encrypted,
            translations: snapshot.translation_records.len(),
            has_settings: snapshot.settings.is_some(),
            documents: snapshot.knowledge_documents.len(),
            habits: snapshot.habits.len(),
        })
    }
}

fn user_data(snapshot: &BackupSnapshot, settings: Option<SettingsDto>) -> UserData {
    UserData {
        translations: snapshot.translation_records.clone(),
        settings,
        documents: snapshot.knowledge_documents.clone(),
        habits: snapshot.habits.clone(),
    }
}

/// Check that a snapshot is complete enough to restore
pub fn validate(snapshot: &BackupSnapshot) -> Result<(), BackupError> {
    if snapshot.id.is_nil() {
        return Err(BackupError::InvalidBackupData("snapshot has an empty id".into()));
    }

    let invalid = BackupError::InvalidBackupData;
    for record in &snapshot.translation_records {
        record.validate().map_err(invalid)?;
    }
    if let Some(settings) = &snapshot.settings {
        settings.validate().map_err(invalid)?;
    }
    for document in &snapshot.knowledge_documents {
        document.validate().map_err(invalid)?;
    }
    for habit in &snapshot.habits {
        habit.validate().map_err(invalid)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::store::{BackupStoreConfig, DEFAULT_MAX_BACKUP_FILES};
    use crate::crypto::{CipherService, KeyManager, MemoryCredentialStore};
    use crate::datastore::InMemoryDataStore;
    use crate::error::{EncryptionError, StoreError};
    use crate::models::{DocumentDto, HabitDto, SettingsDto, TranslationDto};
    use crate::storage::SecureEraser;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// Delegates to an in-memory store; fails the next `create_habit` when armed
    struct FlakyStore {
        inner: InMemoryDataStore,
        fail_next_habit: AtomicBool,
    }

    impl DataStore for FlakyStore {
        fn fetch_translation_history(&self, limit: usize) -> Result<Vec<TranslationDto>, StoreError> {
            self.inner.fetch_translation_history(limit)
        }
        fn get_settings(&self) -> Result<Option<SettingsDto>, StoreError> {
            self.inner.get_settings()
        }
        fn fetch_knowledge_documents(&self, limit: usize) -> Result<Vec<DocumentDto>, StoreError> {
            self.inner.fetch_knowledge_documents(limit)
        }
        fn get_habits(&self, limit: usize) -> Result<Vec<HabitDto>, StoreError> {
            self.inner.get_habits(limit)
        }
        fn create_translation(&self, record: &TranslationDto) -> Result<(), StoreError> {
            self.inner.create_translation(record)
        }
        fn update_settings(&self, settings: &SettingsDto) -> Result<(), StoreError> {
            self.inner.update_settings(settings)
        }
        fn create_knowledge_document(&self, document: &DocumentDto) -> Result<(), StoreError> {
            self.inner.create_knowledge_document(document)
        }
        fn create_habit(&self, habit: &HabitDto) -> Result<(), StoreError> {
            if self.fail_next_habit.swap(false, Ordering::SeqCst) {
                return Err(StoreError("disk full".into()));
            }
            self.inner.create_habit(habit)
        }
        fn clear_translation_history(&self) -> Result<(), StoreError> {
            self.inner.clear_translation_history()
        }
        fn clear_knowledge_documents(&self) -> Result<(), StoreError> {
            self.inner.clear_knowledge_documents()
        }
        fn clear_habits(&self) -> Result<(), StoreError> {
            self.inner.clear_habits()
        }
        fn clear_settings(&self) -> Result<(), StoreError> {
            self.inner.clear_settings()
        }
    }

    struct TestEnv {
        coordinator: RestoreCoordinator,
        store: Arc<BackupStore>,
        codec: Arc<BackupCodec>,
        _temp: TempDir,
    }

    fn current_data() -> UserData {
        UserData {
            translations: vec![TranslationDto::new("current", "actuel", "en", "fr")],
            settings: Some(SettingsDto::default()),
            documents: vec![DocumentDto::new("Current doc", "")],
            habits: vec![HabitDto::new("current-habit", "", 1)],
        }
    }

    fn backup_snapshot() -> BackupSnapshot {
        let mut snapshot = BackupSnapshot::empty();
        snapshot.translation_records = vec![
            TranslationDto::new("uno", "one", "es", "en"),
            TranslationDto::new("dos", "two", "es", "en"),
        ];
        snapshot.settings = Some(SettingsDto {
            theme: "dark".into(),
            ..SettingsDto::default()
        });
        snapshot.knowledge_documents = vec![DocumentDto::new("Backup doc", "content")];
        snapshot.habits = vec![HabitDto::new("restored-habit", "Notes", 7)];
        snapshot
    }

    fn create_test_env(data: Arc<dyn DataStore>) -> TestEnv {
        create_test_env_with_limit(data, DEFAULT_MAX_BACKUP_FILES)
    }

    fn create_test_env_with_limit(data: Arc<dyn DataStore>, max_backup_files: usize) -> TestEnv {
        let temp = TempDir::new().unwrap();
        let keys = Arc::new(KeyManager::new(Arc::new(MemoryCredentialStore::new())));
        keys.initialize().unwrap();
        let codec = Arc::new(BackupCodec::new(Arc::new(CipherService::new(keys))));
        let store = Arc::new(BackupStore::new(
            temp.path().join("FlowKeyBackups"),
            codec.clone(),
            SecureEraser::new(1),
            BackupStoreConfig {
                max_backup_files,
                ..BackupStoreConfig::default()
            },
        ));
        let collector = Arc::new(SnapshotCollector::new(data.clone()));
        let coordinator = RestoreCoordinator::new(store.clone(), codec.clone(), collector, data);

        TestEnv {
            coordinator,
            store,
            codec,
            _temp: temp,
        }
    }

    #[test]
    fn test_restore_replaces_data_and_creates_restore_point() {
        let data = Arc::new(InMemoryDataStore::with_data(current_data()));
        let env = create_test_env(data.clone());
        let backup = env.store.create(&backup_snapshot(), true).unwrap();

        let result = env.coordinator.restore(&backup.path).unwrap();

        assert!(result.success);
        assert_eq!(result.items_restored, 5);
        assert_eq!(env.coordinator.state(), RestoreState::Completed);

        let restored = data.data();
        assert_eq!(restored.translations.len(), 2);
        assert_eq!(restored.settings.unwrap().theme, "dark");
        assert_eq!(restored.documents[0].title, "Backup doc");
        assert_eq!(restored.habits[0].action, "restored-habit");

        let point = result.restore_point.unwrap();
        assert!(point.path.exists());
        let saved = env.codec.decode(&fs::read(&point.path).unwrap(), 1).unwrap();
        assert_eq!(saved.translation_records[0].original_text, "current");
        assert_eq!(env.store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_version_gate_touches_nothing() {
        let data = Arc::new(InMemoryDataStore::with_data(current_data()));
        let env = create_test_env(data.clone());

        let mut snapshot = backup_snapshot();
        snapshot.schema_version = SchemaVersion::new(2, 0);
        let backup = env.store.create(&snapshot, true).unwrap();

        let err = env.coordinator.restore(&backup.path).unwrap_err();

        assert!(matches!(
            err.error,
            BackupError::IncompatibleVersion { expected: 1, .. }
        ));
        assert!(err.restore_point.is_none());
        assert_eq!(data.mutation_count(), 0);
        assert_eq!(env.store.list().unwrap().len(), 1);
        assert_eq!(env.coordinator.state(), RestoreState::Failed);
    }

    #[test]
    fn test_missing_file() {
        let env = create_test_env(Arc::new(InMemoryDataStore::new()));
        let err = env
            .coordinator
            .restore(Path::new("/nonexistent/Backup_x.flowkeybackup"))
            .unwrap_err();
        assert!(matches!(err.error, BackupError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_record_rejected_before_mutation() {
        let data = Arc::new(InMemoryDataStore::with_data(current_data()));
        let env = create_test_env(data.clone());

        let mut snapshot = backup_snapshot();
        snapshot.translation_records[1].original_text = String::new();
        let backup = env.store.create(&snapshot, false).unwrap();

        let err = env.coordinator.restore(&backup.path).unwrap_err();
        assert!(matches!(err.error, BackupError::InvalidBackupData(_)));
        assert_eq!(data.mutation_count(), 0);
        assert_eq!(env.store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_nil_snapshot_id_rejected() {
        let mut snapshot = backup_snapshot();
        snapshot.id = Uuid::nil();
        assert!(matches!(
            validate(&snapshot),
            Err(BackupError::InvalidBackupData(_))
        ));
    }

    #[test]
    fn test_tampered_backup_keeps_tamper_signal() {
        let data = Arc::new(InMemoryDataStore::new());
        let env = create_test_env(data.clone());
        let backup = env.store.create(&backup_snapshot(), true).unwrap();

        let mut bytes = fs::read(&backup.path).unwrap();
        bytes[20] ^= 0x01;
        fs::write(&backup.path, bytes).unwrap();

        let err = env.coordinator.restore(&backup.path).unwrap_err();
        assert_eq!(
            err.error,
            BackupError::Encryption(EncryptionError::AuthenticationFailure)
        );
        assert_eq!(data.mutation_count(), 0);
    }

    #[test]
    fn test_apply_failure_rolls_back_to_restore_point() {
        let flaky = Arc::new(FlakyStore {
            inner: InMemoryDataStore::with_data(current_data()),
            fail_next_habit: AtomicBool::new(false),
        });
        let env = create_test_env(flaky.clone());
        let backup = env.store.create(&backup_snapshot(), true).unwrap();
        let before = env.store.list().unwrap().len();

        flaky.fail_next_habit.store(true, Ordering::SeqCst);
        let err = env.coordinator.restore(&backup.path).unwrap_err();

        assert!(matches!(err.error, BackupError::DataStore(_)));
        assert!(err.can_roll_back());
        assert!(err.rolled_back);
        assert_eq!(env.store.list().unwrap().len(), before + 1);

        let after = flaky.inner.data();
        assert_eq!(after.translations[0].original_text, "current");
        assert_eq!(after.habits[0].action, "current-habit");
    }

    #[test]
    fn test_rollback_clears_settings_the_store_did_not_have() {
        let flaky = Arc::new(FlakyStore {
            inner: InMemoryDataStore::with_data(UserData {
                settings: None,
                ..current_data()
            }),
            fail_next_habit: AtomicBool::new(false),
        });
        let env = create_test_env(flaky.clone());
        let backup = env.store.create(&backup_snapshot(), true).unwrap();

        flaky.fail_next_habit.store(true, Ordering::SeqCst);
        let err = env.coordinator.restore(&backup.path).unwrap_err();

        assert!(err.rolled_back);
        let after = flaky.inner.data();
        assert!(after.settings.is_none());
        assert_eq!(after.translations[0].original_text, "current");
    }

    #[test]
    fn test_snapshot_without_settings_keeps_current_settings() {
        let data = Arc::new(InMemoryDataStore::with_data(current_data()));
        let env = create_test_env(data.clone());
        let mut snapshot = backup_snapshot();
        snapshot.settings = None;
        let backup = env.store.create(&snapshot, false).unwrap();

        let result = env.coordinator.restore(&backup.path).unwrap();

        assert_eq!(result.items_restored, 4);
        assert_eq!(data.data().settings, Some(SettingsDto::default()));
    }

    #[test]
    fn test_restore_point_never_prunes_the_backup_being_restored() {
        let data = Arc::new(InMemoryDataStore::with_data(current_data()));
        let env = create_test_env_with_limit(data.clone(), 2);
        let oldest = env.store.create(&backup_snapshot(), true).unwrap();
        let newer = env.store.create(&BackupSnapshot::empty(), true).unwrap();

        let result = env.coordinator.restore(&oldest.path).unwrap();

        assert!(oldest.path.exists());
        assert!(newer.path.exists());
        assert!(result.restore_point.unwrap().path.exists());
        assert_eq!(data.data().habits[0].action, "restored-habit");

        // The next backup brings the directory back under the limit
        env.store.create(&BackupSnapshot::empty(), true).unwrap();
        assert_eq!(env.store.list().unwrap().len(), 2);
        assert!(!oldest.path.exists());
    }

    #[test]
    fn test_opt_out_of_restore_point() {
        let data = Arc::new(InMemoryDataStore::with_data(current_data()));
        let env = create_test_env(data.clone());
        let backup = env.store.create(&backup_snapshot(), false).unwrap();

        let result = env
            .coordinator
            .restore_with(
                &backup.path,
                RestoreOptions {
                    create_restore_point: false,
                    ..RestoreOptions::default()
                },
            )
            .unwrap();

        assert!(result.restore_point.is_none());
        assert_eq!(env.store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_inspect_does_not_mutate() {
        let data = Arc::new(InMemoryDataStore::with_data(current_data()));
        let env = create_test_env(data.clone());
        let backup = env.store.create(&backup_snapshot(), true).unwrap();

        let inspection = env.coordinator.inspect(&backup.path).unwrap();

        assert!(inspection.encrypted);
        assert_eq!(inspection.translations, 2);
        assert!(inspection.has_settings);
        assert!(inspection.summary().contains("2 translation(s)"));
        assert_eq!(data.mutation_count(), 0);
        assert_eq!(env.coordinator.state(), RestoreState::Idle);
    }
}
