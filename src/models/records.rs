//! Flat record DTOs moved in and out of the user data store
//!
//! Each DTO carries only what a restore needs: a stable external id and the
//! user-visible fields. Store-internal identifiers never leave the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A past translation from the history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationDto {
    pub id: String,
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl TranslationDto {
    pub fn new(
        original_text: impl Into<String>,
        translated_text: impl Into<String>,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            original_text: original_text.into(),
            translated_text: translated_text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            created_at: Utc::now(),
            is_favorite: false,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("translation record has an empty id".into());
        }
        if self.original_text.trim().is_empty() {
            return Err(format!("translation {} has empty original text", self.id));
        }
        Ok(())
    }
}

/// Application settings owned by the data store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDto {
    pub interface_language: String,
    pub default_target_language: String,
    #[serde(default)]
    pub auto_detect_language: bool,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub translate_hotkey: String,
    #[serde(default)]
    pub launch_at_login: bool,
}

impl Default for SettingsDto {
    fn default() -> Self {
        Self {
            interface_language: "en".into(),
            default_target_language: "en".into(),
            auto_detect_language: true,
            theme: "system".into(),
            translate_hotkey: "Cmd+Shift+T".into(),
            launch_at_login: false,
        }
    }
}

impl SettingsDto {
    pub fn validate(&self) -> Result<(), String> {
        if self.interface_language.trim().is_empty() {
            return Err("settings have an empty interface language".into());
        }
        if self.default_target_language.trim().is_empty() {
            return Err("settings have an empty default target language".into());
        }
        Ok(())
    }
}

/// A document in the personal knowledge base
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDto {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentDto {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("knowledge document has an empty id".into());
        }
        if self.title.trim().is_empty() {
            return Err(format!("knowledge document {} has an empty title", self.id));
        }
        Ok(())
    }
}

/// A learned usage habit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitDto {
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub context: String,
    pub frequency: u32,
    pub last_used: DateTime<Utc>,
}

impl HabitDto {
    pub fn new(action: impl Into<String>, context: impl Into<String>, frequency: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action: action.into(),
            context: context.into(),
            frequency,
            last_used: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("habit record has an empty id".into());
        }
        if self.action.trim().is_empty() {
            return Err(format!("habit {} has an empty action", self.id));
        }
        Ok(())
    }
}
