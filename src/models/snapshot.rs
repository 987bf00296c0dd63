//! Backup snapshot and schema versioning

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::records::{DocumentDto, HabitDto, SettingsDto, TranslationDto};

/// A `major.minor` schema version
///
/// Readers accept any minor version of their own major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    /// The version this build writes
    pub const CURRENT: SchemaVersion = SchemaVersion { major: 1, minor: 0 };

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn is_compatible_with(&self, expected_major: u32) -> bool {
        self.major == expected_major
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| format!("schema version '{}' is not major.minor", s))?;
        let major = major
            .parse()
            .map_err(|_| format!("invalid major version in '{}'", s))?;
        let minor = minor
            .parse()
            .map_err(|_| format!("invalid minor version in '{}'", s))?;
        Ok(Self { major, minor })
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A point-in-time copy of the user's data
///
/// `schema_version` is declared first so it is the first field written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub schema_version: SchemaVersion,
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub translation_records: Vec<TranslationDto>,
    #[serde(default)]
    pub settings: Option<SettingsDto>,
    #[serde(default)]
    pub knowledge_documents: Vec<DocumentDto>,
    #[serde(default)]
    pub habits: Vec<HabitDto>,
}

impl BackupSnapshot {
    /// An empty snapshot stamped with a new id and the current time
    pub fn empty() -> Self {
        Self {
            schema_version: SchemaVersion::CURRENT,
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            translation_records: Vec::new(),
            settings: None,
            knowledge_documents: Vec::new(),
            habits: Vec::new(),
        }
    }

    /// Total number of records, counting settings as one
    pub fn item_count(&self) -> usize {
        self.translation_records.len()
            + self.knowledge_documents.len()
            + self.habits.len()
            + usize::from(self.settings.is_some())
    }
}
