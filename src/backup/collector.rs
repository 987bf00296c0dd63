//! Snapshot collection from the user data store
//!
//! The four collections are read one after another with no transaction
//! around them. If the application writes while a snapshot is being taken,
//! the collections may reflect slightly different instants. Callers that need
//! a consistent cut must pause writers first.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::datastore::DataStore;
use crate::error::StoreError;
use crate::models::{BackupSnapshot, SchemaVersion};

/// Upper bounds on how many records of each kind go into a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLimits {
    pub translations: usize,
    pub documents: usize,
    pub habits: usize,
}

impl Default for SnapshotLimits {
    fn default() -> Self {
        Self {
            translations: 10_000,
            documents: 1_000,
            habits: 5_000,
        }
    }
}

/// Builds `BackupSnapshot`s from the live data store
pub struct SnapshotCollector {
    store: Arc<dyn DataStore>,
    limits: SnapshotLimits,
}

impl SnapshotCollector {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self::with_limits(store, SnapshotLimits::default())
    }

    pub fn with_limits(store: Arc<dyn DataStore>, limits: SnapshotLimits) -> Self {
        Self { store, limits }
    }

    /// Read every collection into a new snapshot
    pub fn collect(&self) -> Result<BackupSnapshot, StoreError> {
        let snapshot = BackupSnapshot {
            schema_version: SchemaVersion::CURRENT,
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            translation_records: self
                .store
                .fetch_translation_history(self.limits.translations)?,
            settings: self.store.get_settings()?,
            knowledge_documents: self
                .store
                .fetch_knowledge_documents(self.limits.documents)?,
            habits: self.store.get_habits(self.limits.habits)?,
        };

        debug!(
            snapshot_id = %snapshot.id,
            translations = snapshot.translation_records.len(),
            documents = snapshot.knowledge_documents.len(),
            habits = snapshot.habits.len(),
            "collected snapshot"
        );
        Ok(snapshot)
    }
}
