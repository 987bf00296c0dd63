//! In-memory user data store

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::{DataStore, UserData};
use crate::error::StoreError;
use crate::models::{DocumentDto, HabitDto, SettingsDto, TranslationDto};

/// A `DataStore` kept entirely in memory
///
/// Counts every mutating call so callers can assert that an operation left
/// the store untouched.
#[derive(Default)]
pub struct InMemoryDataStore {
    data: Mutex<UserData>,
    mutations: AtomicUsize,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: UserData) -> Self {
        Self {
            data: Mutex::new(data),
            mutations: AtomicUsize::new(0),
        }
    }

    /// A copy of everything currently stored
    pub fn data(&self) -> UserData {
        self.data.lock().clone()
    }

    /// Number of mutating calls made so far
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    fn mutate<F: FnOnce(&mut UserData)>(&self, f: F) -> Result<(), StoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        f(&mut self.data.lock());
        Ok(())
    }
}

impl DataStore for InMemoryDataStore {
    fn fetch_translation_history(&self, limit: usize) -> Result<Vec<TranslationDto>, StoreError> {
        Ok(self.data.lock().recent_translations(limit))
    }

    fn get_settings(&self) -> Result<Option<SettingsDto>, StoreError> {
        Ok(self.data.lock().settings.clone())
    }

    fn fetch_knowledge_documents(&self, limit: usize) -> Result<Vec<DocumentDto>, StoreError> {
        Ok(self.data.lock().recent_documents(limit))
    }

    fn get_habits(&self, limit: usize) -> Result<Vec<HabitDto>, StoreError> {
        Ok(self.data.lock().top_habits(limit))
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

    fn replace_all(&self, data: &UserData) -> Result<(), StoreError> {
        self.mutate(|current| *current = data.clone())
    }
}
