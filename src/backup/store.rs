//! On-disk backup directory
//!
//! Files are named `Backup_<yyyy-MM-dd_HH-mm-ss>.flowkeybackup` from their
//! creation time in UTC. A second backup within the same second gets a `_<n>`
//! suffix. Every create is followed by a prune that keeps only the
//! `max_backup_files` newest files. A file that cannot be pruned is logged
//! and skipped; it does not fail the create. Create, prune and delete hold
//! the same lock, so a prune never races a half-listed directory.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::codec::{probe_version, BackupCodec, BackupFormat};
use crate::error::BackupError;
use crate::models::{BackupSnapshot, SchemaVersion};
use crate::storage::file_io::write_atomic;
use crate::storage::SecureEraser;

/// File extension of backup files
pub const BACKUP_EXTENSION: &str = "flowkeybackup";
/// File name prefix of backup files
pub const BACKUP_PREFIX: &str = "Backup_";
/// Default retention limit
pub const DEFAULT_MAX_BACKUP_FILES: usize = 10;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const TIMESTAMP_LEN: usize = 19;

/// Metadata about a backup file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupFile {
    /// File stem, used to address the backup
    pub id: String,
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub encrypted: bool,
    /// Unknown for encrypted files until they are decrypted
    pub schema_version: Option<SchemaVersion>,
    #[serde(skip)]
    sequence: u32,
}

/// Retention and deletion policy for a `BackupStore`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupStoreConfig {
    pub max_backup_files: usize,
    /// Erase pruned files with `SecureEraser` instead of a plain unlink
    pub secure_prune: bool,
}

impl Default for BackupStoreConfig {
    fn default() -> Self {
        Self {
            max_backup_files: DEFAULT_MAX_BACKUP_FILES,
            secure_prune: true,
        }
    }
}

/// Owns the backup directory
pub struct BackupStore {
    dir: PathBuf,
    codec: Arc<BackupCodec>,
    eraser: SecureEraser,
    config: BackupStoreConfig,
    lock: Mutex<()>,
}

impl BackupStore {
    pub fn new(
        dir: PathBuf,
        codec: Arc<BackupCodec>,
        eraser: SecureEraser,
        config: BackupStoreConfig,
    ) -> Self {
        Self {
            dir,
            codec,
            eraser,
            config: BackupStoreConfig {
                max_backup_files: config.max_backup_files.max(1),
                ..config
            },
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config(&self) -> BackupStoreConfig {
        self.config
    }

    /// Create the backup directory and its parents if missing
    pub fn ensure_directory(&self) -> Result<(), BackupError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            BackupError::Io(format!(
                "Failed to create backup directory {}: {}",
                self.dir.display(),
                e
            ))
        })
    }

    /// Encode `snapshot`, write it atomically, then enforce retention
    pub fn create(&self, snapshot: &BackupSnapshot, encrypt: bool) -> Result<BackupFile, BackupError> {
        self.create_inner(snapshot, encrypt, None)
    }

    /// Like `create`, but the retention pass leaves `keep` alone
    ///
    /// Used for restore points, so the backup being restored is never pruned
    /// while it is in use. The directory may hold one file over the limit
    /// until the next create.
    pub fn create_keeping(
        &self,
        snapshot: &BackupSnapshot,
        encrypt: bool,
        keep: &Path,
    ) -> Result<BackupFile, BackupError> {
        self.create_inner(snapshot, encrypt, Some(keep))
    }

    fn create_inner(
        &self,
        snapshot: &BackupSnapshot,
        encrypt: bool,
        keep: Option<&Path>,
    ) -> Result<BackupFile, BackupError> {
        let _guard = self.lock.lock();
        self.ensure_directory()?;

        let bytes = self.codec.encode(snapshot, encrypt)?;
        let created_at = Utc::now();
        let (file_name, sequence) = self.unused_file_name(&created_at);
        let path = self.dir.join(&file_name);

        write_atomic(&path, &bytes)
            .map_err(|e| BackupError::Io(format!("Failed to write backup file: {}", e)))?;

        let file = BackupFile {
            id: file_stem(&file_name),
            file_name,
            path,
            size_bytes: bytes.len() as u64,
            created_at: truncate_to_seconds(created_at),
            encrypted: encrypt,
            schema_version: Some(snapshot.schema_version),
            sequence,
        };
        info!(
            backup = %file.id,
            snapshot_id = %snapshot.id,
            encrypted = encrypt,
            size = file.size_bytes,
            "backup written"
        );

        if let Err(e) = self.prune_locked(keep) {
            warn!(backup = %file.id, error = %e, "backup written but retention not fully enforced");
        }
        Ok(file)
    }

    /// All backups, newest first
    pub fn list(&self) -> Result<Vec<BackupFile>, BackupError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir)
            .map_err(|e| BackupError::Io(format!("Failed to read backup directory: {}", e)))?;

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| BackupError::Io(format!("Failed to read directory entry: {}", e)))?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == BACKUP_EXTENSION) {
                if let Some(info) = read_backup_info(&path) {
                    backups.push(info);
                }
            }
        }

        backups.sort_by(|a, b| {
            (b.created_at, b.sequence).cmp(&(a.created_at, a.sequence))
        });
        Ok(backups)
    }

    /// Delete all but the newest `max_backup_files` backups
    ///
    /// Returns the backups that were removed. Every excess file is attempted;
    /// if any could not be removed, the first such error is returned.
    pub fn prune(&self) -> Result<Vec<BackupFile>, BackupError> {
        let _guard = self.lock.lock();
        self.prune_locked(None)
    }

    fn prune_locked(&self, keep: Option<&Path>) -> Result<Vec<BackupFile>, BackupError> {
        let excess: Vec<BackupFile> = self
            .list()?
            .into_iter()
            .skip(self.config.max_backup_files)
            .filter(|backup| keep.map_or(true, |keep| !same_file(&backup.path, keep)))
            .collect();

        remove_each(excess, |path| self.remove_file(path))
    }

    /// Delete the backup with the given id
    pub fn delete(&self, id: &str) -> Result<(), BackupError> {
        let _guard = self.lock.lock();
        let path = self.path_for_id(id)?;
        if !path.exists() {
            return Err(BackupError::FileNotFound(path));
        }
        self.remove_file(&path)?;
        info!(backup = %id, "backup deleted");
        Ok(())
    }

    /// Look up a backup by id
    pub fn get(&self, id: &str) -> Result<Option<BackupFile>, BackupError> {
        let path = self.path_for_id(id)?;
        Ok(read_backup_info(&path))
    }

    /// The most recent backup, if any
    pub fn latest(&self) -> Result<Option<BackupFile>, BackupError> {
        Ok(self.list()?.into_iter().next())
    }

    fn remove_file(&self, path: &Path) -> Result<(), BackupError> {
        if self.config.secure_prune {
            self.eraser.securely_delete(path)?;
        } else {
            fs::remove_file(path)
                .map_err(|e| BackupError::Io(format!("Failed to delete backup: {}", e)))?;
        }
        Ok(())
    }

    fn path_for_id(&self, id: &str) -> Result<PathBuf, BackupError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(BackupError::InvalidBackupData(format!(
                "'{}' is not a backup id",
                id
            )));
        }
        Ok(self.dir.join(format!("{}.{}", id, BACKUP_EXTENSION)))
    }

    fn unused_file_name(&self, created_at: &DateTime<Utc>) -> (String, u32) {
        let stem = format!("{}{}", BACKUP_PREFIX, created_at.format(TIMESTAMP_FORMAT));
        let mut sequence = 0;
        loop {
            let name = if sequence == 0 {
                format!("{}.{}", stem, BACKUP_EXTENSION)
            } else {
                format!("{}_{}.{}", stem, sequence, BACKUP_EXTENSION)
            };
            if !self.dir.join(&name).exists() {
                return (name, sequence);
            }
            sequence += 1;
        }
    }
}

/// Remove every backup in `excess`, carrying on past failures
fn remove_each<F>(excess: Vec<BackupFile>, mut remove: F) -> Result<Vec<BackupFile>, BackupError>
where
    F: FnMut(&Path) -> Result<(), BackupError>,
{
    let mut removed = Vec::with_capacity(excess.len());
    let mut first_error = None;

    for backup in excess {
        match remove(&backup.path) {
            Ok(()) => {
                info!(backup = %backup.id, "pruned old backup");
                removed.push(backup);
            }
            Err(e) => {
                warn!(backup = %backup.id, error = %e, "failed to prune old backup");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(removed),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Read a backup file's contents
pub fn read_backup(path: &Path) -> Result<Vec<u8>, BackupError> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(BackupError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(BackupError::Io(format!(
            "Failed to read backup {}: {}",
            path.display(),
            e
        ))),
    }
}

fn file_stem(file_name: &str) -> String {
    file_name
        .strip_suffix(&format!(".{}", BACKUP_EXTENSION))
        .unwrap_or(file_name)
        .to_string()
}

fn truncate_to_seconds(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp.timestamp(), 0).unwrap_or(timestamp)
}

/// Parse `Backup_<timestamp>[_<n>].flowkeybackup` into (created_at, sequence)
fn parse_backup_name(file_name: &str) -> Option<(DateTime<Utc>, u32)> {
    let stem = file_name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(&format!(".{}", BACKUP_EXTENSION))?;

    if stem.len() < TIMESTAMP_LEN || !stem.is_char_boundary(TIMESTAMP_LEN) {
        return None;
    }
    let (timestamp, rest) = stem.split_at(TIMESTAMP_LEN);
    let created_at = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();

    let sequence = match rest {
        "" => 0,
        suffix => suffix.strip_prefix('_')?.parse().ok()?,
    };
    Some((created_at, sequence))
}

/// Build a `BackupFile` from a path, or `None` if it is not a readable backup
fn read_backup_info(path: &Path) -> Option<BackupFile> {
    let file_name = path.file_name()?.to_str()?.to_string();
    let (created_at, sequence) = parse_backup_name(&file_name)?;
    let size_bytes = fs::metadata(path).ok()?.len();

    let mut file = File::open(path).ok()?;
    let mut flag = [0u8; 1];
    file.read_exact(&mut flag).ok()?;
    let format = BackupFormat::from_flag(flag[0]).ok()?;

    let schema_version = match format {
        BackupFormat::Encrypted => None,
        BackupFormat::Plaintext => {
            let mut json = Vec::new();
            file.read_to_end(&mut json).ok()?;
            probe_version(&json).ok()
        }
    };

    debug!(file = %file_name, "found backup");
    Some(BackupFile {
        id: file_stem(&file_name),
        file_name,
        path: path.to_path_buf(),
        size_bytes,
        created_at,
        encrypted: format == BackupFormat::Encrypted,
        schema_version,
        sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CipherService, KeyManager, MemoryCredentialStore};
    use chrono::{Datelike, Timelike};
    use tempfile::TempDir;

    fn create_test_store(max_backup_files: usize) -> (BackupStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let keys = Arc::new(KeyManager::new(Arc::new(MemoryCredentialStore::new())));
        keys.initialize().unwrap();
        let codec = Arc::new(BackupCodec::new(Arc::new(CipherService::new(keys))));

        let store = BackupStore::new(
            temp_dir.path().join("FlowKeyBackups"),
            codec,
            SecureEraser::new(1),
            BackupStoreConfig {
                max_backup_files,
                secure_prune: true,
            },
        );
        (store, temp_dir)
    }

    #[test]
    fn test_ensure_directory_is_idempotent() {
        let (store, _temp) = create_test_store(10);
        store.ensure_directory().unwrap();
        store.ensure_directory().unwrap();
        assert!(store.dir().is_dir());
    }

    #[test]
    fn test_create_backup() {
        let (store, _temp) = create_test_store(10);

        let file = store.create(&BackupSnapshot::empty(), true).unwrap();

        assert!(file.path.exists());
        assert!(file.file_name.starts_with("Backup_"));
        assert!(file.file_name.ends_with(".flowkeybackup"));
        assert!(file.encrypted);
        assert_eq!(fs::read(&file.path).unwrap()[0], 1);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let (store, _temp) = create_test_store(10);
        store.create(&BackupSnapshot::empty(), false).unwrap();

        let leftovers: Vec<_> = fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_list_backups_newest_first() {
        let (store, _temp) = create_test_store(10);

        let first = store.create(&BackupSnapshot::empty(), false).unwrap();
        let second = store.create(&BackupSnapshot::empty(), true).unwrap();

        let backups = store.list().unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(backups[0].id, second.id);
        assert_eq!(backups[1].id, first.id);
        assert!(backups[0].encrypted);
        assert_eq!(backups[0].schema_version, None);
        assert_eq!(backups[1].schema_version, Some(SchemaVersion::CURRENT));
    }

    #[test]
    fn test_same_second_names_do_not_collide() {
        let (store, _temp) = create_test_store(10);

        let names: Vec<String> = (0..3)
            .map(|_| store.create(&BackupSnapshot::empty(), false).unwrap().file_name)
            .collect();

        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_retention_keeps_most_recent() {
        let (store, _temp) = create_test_store(1);

        let first = store.create(&BackupSnapshot::empty(), true).unwrap();
        let second = store.create(&BackupSnapshot::empty(), true).unwrap();

        let backups = store.list().unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].id, second.id);
        assert!(!first.path.exists());
    }

    #[test]
    fn test_twelve_backups_capped_at_ten() {
        let (store, _temp) = create_test_store(10);

        let created: Vec<BackupFile> = (0..12)
            .map(|_| store.create(&BackupSnapshot::empty(), true).unwrap())
            .collect();

        let backups = store.list().unwrap();
        assert_eq!(backups.len(), 10);
        assert!(backups
            .windows(2)
            .all(|w| (w[0].created_at, w[0].sequence) > (w[1].created_at, w[1].sequence)));

        assert!(!created[0].path.exists());
        assert!(!created[1].path.exists());
        assert!(created[2..].iter().all(|b| b.path.exists()));
        assert_eq!(backups[0].id, created[11].id);
    }

    #[test]
    fn test_prune_with_plain_delete() {
        let (mut store, _temp) = create_test_store(10);
        for _ in 0..3 {
            store.create(&BackupSnapshot::empty(), false).unwrap();
        }

        store.config = BackupStoreConfig {
            max_backup_files: 1,
            secure_prune: false,
        };
        let deleted = store.prune().unwrap();
        assert_eq!(deleted.len(), 2);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_by_id() {
        let (store, _temp) = create_test_store(10);
        let file = store.create(&BackupSnapshot::empty(), true).unwrap();

        store.delete(&file.id).unwrap();
        assert!(!file.path.exists());
        assert!(matches!(
            store.delete(&file.id),
            Err(BackupError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_delete_rejects_path_traversal() {
        let (store, _temp) = create_test_store(10);
        assert!(matches!(
            store.delete("../secrets"),
            Err(BackupError::InvalidBackupData(_))
        ));
    }

    #[test]
    fn test_get_and_latest() {
        let (store, _temp) = create_test_store(10);
        assert!(store.latest().unwrap().is_none());

        let file = store.create(&BackupSnapshot::empty(), false).unwrap();
        assert_eq!(store.latest().unwrap().unwrap().id, file.id);
        assert_eq!(store.get(&file.id).unwrap().unwrap().path, file.path);
        assert!(store.get("Backup_1999-01-01_00-00-00").unwrap().is_none());
    }

    #[test]
    fn test_foreign_files_are_ignored() {
        let (store, _temp) = create_test_store(10);
        store.ensure_directory().unwrap();
        fs::write(store.dir().join("notes.txt"), b"hello").unwrap();
        fs::write(store.dir().join("Backup_garbage.flowkeybackup"), b"\0{}").unwrap();

        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_parse_backup_name() {
        let (created_at, sequence) =
            parse_backup_name("Backup_2025-11-27_14-30-22.flowkeybackup").unwrap();
        assert_eq!(created_at.year(), 2025);
        assert_eq!(created_at.month(), 11);
        assert_eq!(created_at.hour(), 14);
        assert_eq!(sequence, 0);

        let (_, sequence) =
            parse_backup_name("Backup_2025-11-27_14-30-22_4.flowkeybackup").unwrap();
        assert_eq!(sequence, 4);

        assert!(parse_backup_name("Backup_2025-11-27.flowkeybackup").is_none());
        assert!(parse_backup_name("backup-20251127-143022.json").is_none());
    }

    #[test]
    fn test_file_name_uses_utc_creation_time() {
        let (store, _temp) = create_test_store(10);
        let file = store.create(&BackupSnapshot::empty(), false).unwrap();

        let expected = format!(
            "Backup_{}",
            file.created_at.format("%Y-%m-%d_%H-%M-%S")
        );
        assert!(file.id.starts_with(&expected));
        assert_eq!(store.list().unwrap()[0].created_at, file.created_at);
    }

    #[test]
    fn test_remove_each_continues_past_failures() {
        let (store, _temp) = create_test_store(10);
        let files: Vec<BackupFile> = (0..3)
            .map(|_| store.create(&BackupSnapshot::empty(), false).unwrap())
            .collect();
        let stuck = files[0].path.clone();

        let result = remove_each(files.clone(), |path| {
            if path == stuck.as_path() {
                return Err(BackupError::Io("read-only".into()));
            }
            fs::remove_file(path).map_err(|e| BackupError::Io(e.to_string()))
        });

        assert!(matches!(result, Err(BackupError::Io(_))));
        assert!(files[0].path.exists());
        assert!(!files[1].path.exists());
        assert!(!files[2].path.exists());
    }

    #[test]
    fn test_create_keeping_leaves_file_in_place() {
        let (store, _temp) = create_test_store(1);
        let restoring = store.create(&BackupSnapshot::empty(), true).unwrap();

        let point = store
            .create_keeping(&BackupSnapshot::empty(), true, &restoring.path)
            .unwrap();

        assert!(restoring.path.exists());
        assert!(point.path.exists());
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_read_missing_backup() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            read_backup(&temp_dir.path().join("nope.flowkeybackup")),
            Err(BackupError::FileNotFound(_))
        ));
    }
}
