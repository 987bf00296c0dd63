//! Boundary to the application's user data store
//!
//! Translation history, settings, knowledge documents, and habits are owned
//! by the surrounding application. Backup and restore only see them through
//! the `DataStore` trait. Individual calls are expected to be internally
//! consistent; nothing here spans calls with a transaction.

mod json;
mod memory;

pub use json::JsonDataStore;
pub use memory::InMemoryDataStore;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::{DocumentDto, HabitDto, SettingsDto, TranslationDto};

/// Read and write access to the user data collections
pub trait DataStore: Send + Sync {
    /// Most recent translations first, at most `limit`
    fn fetch_translation_history(&self, limit: usize) -> Result<Vec<TranslationDto>, StoreError>;

    fn get_settings(&self) -> Result<Option<SettingsDto>, StoreError>;

    /// Most recently updated documents first, at most `limit`
    fn fetch_knowledge_documents(&self, limit: usize) -> Result<Vec<DocumentDto>, StoreError>;

    /// Most frequently used habits first, at most `limit`
    fn get_habits(&self, limit: usize) -> Result<Vec<HabitDto>, StoreError>;

    fn create_translation(&self, record: &TranslationDto) -> Result<(), StoreError>;

    fn update_settings(&self, settings: &SettingsDto) -> Result<(), StoreError>;

    fn create_knowledge_document(&self, document: &DocumentDto) -> Result<(), StoreError>;

    fn create_habit(&self, habit: &HabitDto) -> Result<(), StoreError>;

    fn clear_translation_history(&self) -> Result<(), StoreError>;

    fn clear_knowledge_documents(&self) -> Result<(), StoreError>;

    fn clear_habits(&self) -> Result<(), StoreError>;

    /// Remove the stored settings, if any
    fn clear_settings(&self) -> Result<(), StoreError>;

    /// Replace every collection, settings included, with `data`
    ///
    /// The default goes through the per-record calls. Stores that can write
    /// the whole dataset at once should override it.
    fn replace_all(&self, data: &UserData) -> Result<(), StoreError> {
        self.clear_translation_history()?;
        self.clear_knowledge_documents()?;
        self.clear_habits()?;

        for record in &data.translations {
            self.create_translation(record)?;
        }
        match &data.settings {
            Some(settings) => self.update_settings(settings)?,
            None => self.clear_settings()?,
        }
        for document in &data.documents {
            self.create_knowledge_document(document)?;
        }
        for habit in &data.habits {
            self.create_habit(habit)?;
        }
        Ok(())
    }
}

/// All user data collections, as held by the bundled store implementations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default)]
    pub translations: Vec<TranslationDto>,
    #[serde(default)]
    pub settings: Option<SettingsDto>,
    #[serde(default)]
    pub documents: Vec<DocumentDto>,
    #[serde(default)]
    pub habits: Vec<HabitDto>,
}

impl UserData {
    fn recent_translations(&self, limit: usize) -> Vec<TranslationDto> {
        let mut records = self.translations.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        records
    }

    fn recent_documents(&self, limit: usize) -> Vec<DocumentDto> {
        let mut documents = self.documents.clone();
        documents.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        documents.truncate(limit);
        documents
    }

    fn top_habits(&self, limit: usize) -> Vec<HabitDto> {
        let mut habits = self.habits.clone();
        habits.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        habits.truncate(limit);
        habits
    }
}
