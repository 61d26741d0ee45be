use std::sync::Arc;

use serde_json::{Map, Value};

use finsync_core::{sort_periods, AggregateState, ConfigKey};

use crate::{
    error::SyncError,
    storage::{StorageError, StoreConnector},
};

/// Builds the client-visible state from the store on every call.
///
/// Each source defaults independently: an absent period slot or config row
/// reads as an empty container. All sources come from one store snapshot,
/// so a concurrent write is seen whole or not at all. Any store failure
/// fails the whole read.
pub struct ReadAggregator {
    connector: Arc<dyn StoreConnector>,
}

impl ReadAggregator {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self { connector }
    }

    pub fn read(&self) -> Result<AggregateState, SyncError> {
        self.compose().map_err(|e| {
            tracing::error!(backend = self.connector.name(), error = %e, "Failed to retrieve data");
            SyncError::Retrieval(e)
        })
    }

    fn compose(&self) -> Result<AggregateState, StorageError> {
        let mut conn = self.connector.connect()?;
        let stored = conn.load_snapshot()?;

        let mut periods = periods_from(stored.periods);
        let subcategories = subcategories_from(stored.subcategories);
        let bank_accounts = bank_accounts_from(stored.bank_accounts);

        // Sorted here, not in SQL: JSON path comparisons fail on mixed date formats.
        sort_periods(&mut periods);

        tracing::debug!(
            periods = periods.len(),
            subcategories = subcategories.len(),
            bank_accounts = bank_accounts.len(),
            "Aggregate state composed"
        );

        Ok(AggregateState {
            periods,
            subcategories,
            bank_accounts,
        })
    }
}

fn periods_from(document: Option<Value>) -> Vec<Value> {
    match document {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(periods)) => periods,
        Some(other) => {
            tracing::warn!(kind = kind_of(&other), "Stored periods are not an array, reading as empty");
            Vec::new()
        }
    }
}

fn subcategories_from(document: Option<Value>) -> Map<String, Value> {
    match section(document, ConfigKey::Subcategories) {
        None => Map::new(),
        Some(Value::Object(subcategories)) => subcategories,
        Some(other) => {
            tracing::warn!(kind = kind_of(&other), "Stored subcategories are not an object, reading as empty");
            Map::new()
        }
    }
}

fn bank_accounts_from(document: Option<Value>) -> Vec<Value> {
    match section(document, ConfigKey::BankAccounts) {
        None => Vec::new(),
        Some(Value::Array(accounts)) => accounts,
        Some(other) => {
            tracing::warn!(kind = kind_of(&other), "Stored bank accounts are not an array, reading as empty");
            Vec::new()
        }
    }
}

/// Unwraps `{field: section}`. A missing wrapper or field, or a `null`
/// section, is treated as absent.
fn section(document: Option<Value>, key: ConfigKey) -> Option<Value> {
    match document? {
        Value::Object(mut wrapper) => wrapper.remove(key.field()).filter(|v| !v.is_null()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_periods_null_or_absent_read_as_empty() {
        assert!(periods_from(None).is_empty());
        assert!(periods_from(Some(Value::Null)).is_empty());
        assert!(periods_from(Some(json!({ "startDate": "2024-01-01" }))).is_empty());
        assert_eq!(periods_from(Some(json!([1, 2]))).len(), 2);
    }

    #[test]
    fn test_section_unwrapping() {
        assert!(subcategories_from(None).is_empty());
        assert!(subcategories_from(Some(json!({}))).is_empty());
        assert!(subcategories_from(Some(json!({ "subcategories": null }))).is_empty());
        assert!(subcategories_from(Some(json!({ "subcategories": ["wrong"] }))).is_empty());
        assert_eq!(
            subcategories_from(Some(json!({ "subcategories": { "Food": [] } })))
                .get("Food"),
            Some(&json!([]))
        );

        assert!(bank_accounts_from(Some(json!({ "subcategories": {} }))).is_empty());
        assert!(bank_accounts_from(Some(json!("not a wrapper"))).is_empty());
        assert_eq!(
            bank_accounts_from(Some(json!({ "bankAccounts": ["Checking", "Savings"] }))),
            vec![json!("Checking"), json!("Savings")]
        );
    }
}
