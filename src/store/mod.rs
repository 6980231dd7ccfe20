//! Subject record persistence.
//!
//! The dispatcher writes decoded field updates to an external key-value
//! record keyed by subject id. Writes are read-modify-write ("set field X
//! to value Y"), never full-record replacement, and a missing record is a
//! logged warning rather than a turn failure.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::marker::FieldUpdate;
use serde_json::{Map, Value};

/// Field name whose updates may carry a currency alongside the amount.
pub const BUDGET_FIELD: &str = "estimated_budget";

/// Trait for subject record storage backends.
///
/// Implementations persist per-subject field maps. All methods take `&self`
/// so a store can be shared behind an `Arc` across dispatch tasks.
pub trait FieldStore: Send + Sync {
    /// Creates an empty record for the subject if none exists.
    ///
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn insert_subject(&self, subject_id: &str) -> Result<()>;

    /// Applies one field update to the subject's record.
    ///
    /// Returns `Ok(true)` if the update was applied, `Ok(false)` if the
    /// subject record does not exist (the update is skipped with a
    /// warning, not an error).
    ///
    /// # Errors
    ///
    /// Returns an error if the read or write fails.
    fn apply_update(&self, subject_id: &str, update: &FieldUpdate) -> Result<bool>;

    /// Returns the subject's field map, or `None` if no record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get_fields(&self, subject_id: &str) -> Result<Option<Value>>;
}

/// Merges one update into a subject's field map.
///
/// Sets the named field to the new value; a budget update carrying a
/// currency also records the currency field.
pub(crate) fn merge_update(fields: &mut Map<String, Value>, update: &FieldUpdate) {
    fields.insert(update.field.clone(), update.value.clone());
    if update.field == BUDGET_FIELD
        && let Some(currency) = &update.currency
    {
        fields.insert("currency".to_string(), Value::String(currency.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(field: &str, value: Value, currency: Option<&str>) -> FieldUpdate {
        FieldUpdate {
            field: field.to_string(),
            value,
            currency: currency.map(ToString::to_string),
        }
    }

    #[test]
    fn test_merge_sets_field() {
        let mut fields = Map::new();
        merge_update(&mut fields, &update("optimal_season", json!("spring"), None));
        assert_eq!(fields["optimal_season"], "spring");
    }

    #[test]
    fn test_merge_budget_records_currency() {
        let mut fields = Map::new();
        merge_update(&mut fields, &update(BUDGET_FIELD, json!(1500), Some("EUR")));
        assert_eq!(fields[BUDGET_FIELD], 1500);
        assert_eq!(fields["currency"], "EUR");
    }

    #[test]
    fn test_merge_currency_ignored_for_other_fields() {
        let mut fields = Map::new();
        merge_update(&mut fields, &update("highlights", json!(["a"]), Some("EUR")));
        assert!(!fields.contains_key("currency"));
    }

    #[test]
    fn test_merge_overwrites_existing_value() {
        let mut fields = Map::new();
        merge_update(&mut fields, &update("optimal_season", json!("spring"), None));
        merge_update(&mut fields, &update("optimal_season", json!("autumn"), None));
        assert_eq!(fields["optimal_season"], "autumn");
    }
}
