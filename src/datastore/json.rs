//! JSON file user data store
//!
//! Backs the command-line front end. The whole dataset lives in one JSON
//! file that is rewritten atomically on every mutation.

use std::path::PathBuf;

use parking_lot::Mutex;

use super::{DataStore, UserData};
use crate::error::StoreError;
use crate::models::{DocumentDto, HabitDto, SettingsDto, TranslationDto};
use crate::storage::file_io::{read_json, write_json_atomic};

pub struct JsonDataStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonDataStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn load(&self) -> Result<UserData, StoreError> {
        read_json(&self.path)
            .map_err(|e| StoreError(format!("Failed to read {}: {}", self.path.display(), e)))
    }

    fn read<T>(&self, f: impl FnOnce(&UserData) -> T) -> Result<T, StoreError> {
        let _guard = self.lock.lock();
        Ok(f(&self.load()?))
    }

    fn mutate(&self, f: impl FnOnce(&mut UserData)) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut data = self.load()?;
        f(&mut data);
        write_json_atomic(&self.path, &data)
            .map_err(|e| StoreError(format!("Failed to write {}: {}", self.path.display(), e)))
    }
}

impl DataStore for JsonDataStore {
    fn fetch_translation_history(&self, limit: usize) -> Result<Vec<TranslationDto>, StoreError> {
        self.read(|data| data.recent_translations(limit))
    }

    fn get_settings(&self) -> Result<Option<SettingsDto>, StoreError> {
        self.read(|data| data.settings.clone())
    }

    fn fetch_knowledge_documents(&self, limit: usize) -> Result<Vec<DocumentDto>, StoreError> {
        self.read(|data| data.recent_documents(limit))
    }

    fn get_habits(&self, limit: usize) -> Result<Vec<HabitDto>, StoreError> {
        self.read(|data| data.top_habits(limit))
    }

    fn create_translation(&self, record: &TranslationDto) -> Result<(), StoreError> {
        self.mutate(|data| data.translations.push(record.clone()))
    }

    fn update_settings(&self, settings: &SettingsDto) -> Result<(), StoreError> {
        self.mutate(|data| data.settings = Some(settings.clone()))
    }

    fn create_knowledge_document(&self, document: &DocumentDto) -> Result<(), StoreError> {
        self.mutate(|data| data.documents.push(document.clone()))
    }

    fn create_habit(&self, habit: &HabitDto) -> Result<(), StoreError> {
        self.mutate(|data| data.habits.push(habit.clone()))
    }

    fn clear_translation_history(&self) -> Result<(), StoreError> {
        self.mutate(|data| data.translations.clear())
    }

    fn clear_knowledge_documents(&self) -> Result<(), StoreError> {
        self.mutate(|data| data.documents.clear())
    }

    fn clear_habits(&self) -> Result<(), StoreError> {
        self.mutate(|data| data.habits.clear())
    }

    fn clear_settings(&self) -> Result<(), StoreError> {
        self.mutate(|data| data.settings = None)
    }

    /// One atomic write for the whole dataset
    fn replace_all(&self, data: &UserData) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        write_json_atomic(&self.path, data)
            .map_err(|e| StoreError(format!("Failed to write {}: {}", self.path.display(), e)))
    }
}
