//! In-memory subject record store.
//!
//! Backs tests and the replay CLI when no database path is given.

use crate::error::Result;
use crate::marker::FieldUpdate;
use crate::store::{FieldStore, merge_update};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

/// In-memory implementation of [`FieldStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Subject id to field map.
    records: Mutex<HashMap<String, Map<String, Value>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of subject records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no records exist.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Map<String, Value>>> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl FieldStore for MemoryStore {
    fn insert_subject(&self, subject_id: &str) -> Result<()> {
        self.lock().entry(subject_id.to_string()).or_default();
        Ok(())
    }

    fn apply_update(&self, subject_id: &str, update: &FieldUpdate) -> Result<bool> {
        let mut records = self.lock();
        let Some(fields) = records.get_mut(subject_id) else {
            warn!(subject = subject_id, field = %update.field,
                "subject record not found, skipping update");
            return Ok(false);
        };
        merge_update(fields, update);
        Ok(true)
    }

    fn get_fields(&self, subject_id: &str) -> Result<Option<Value>> {
        Ok(self
            .lock()
            .get(subject_id)
            .map(|fields| Value::Object(fields.clone())))
    }
}
