use serde_json::Value;
use thiserror::Error;

use crate::models::ConfigKey;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("invalid document in {table}: {reason}")]
    Decode { table: &'static str, reason: String },
    #[error("store lock poisoned")]
    Poisoned,
    #[error("{0}")]
    Other(String),
}

/// Every stored document, read from one consistent view of the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredDocuments {
    pub periods: Option<Value>,
    pub subcategories: Option<Value>,
    pub bank_accounts: Option<Value>,
}

/// Opens short-lived connections to a document store.
///
/// A connector holds only immutable settings. Every request opens its own
/// connection and drops it when done.
pub trait StoreConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn StoreConnection>, StorageError>;

    /// Backend name used in logs.
    fn name(&self) -> &'static str;
}

/// One open connection. Dropping it releases the underlying resource.
pub trait StoreConnection: Send {
    /// The stored period collection. `None` when the slot is empty.
    fn load_periods(&mut self) -> Result<Option<Value>, StorageError>;

    /// The stored document for `key`, still wrapped in its field.
    fn load_config(&mut self, key: ConfigKey) -> Result<Option<Value>, StorageError>;

    /// The period slot and both config rows as of a single point in time.
    /// A commit landing mid-read is either fully visible or not at all.
    fn load_snapshot(&mut self) -> Result<StoredDocuments, StorageError>;

    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>, StorageError>;
}

/// Write context scoped to one transaction.
///
/// Dropping a transaction without calling `commit` discards every change
/// made through it.
pub trait StoreTransaction {
    /// Clears the period slot and stores `periods` as its only value.
    fn replace_periods(&mut self, periods: &[Value]) -> Result<(), StorageError>;

    /// Inserts or overwrites the single row for `key`.
    fn upsert_config(&mut self, key: ConfigKey, document: &Value) -> Result<(), StorageError>;

    fn commit(self: Box<Self>) -> Result<(), StorageError>;
    fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
