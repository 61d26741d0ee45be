use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{Arc, RwLock},
};

use serde_json::Value;

use finsync_core::ConfigKey;

// Re-export core storage types so existing code using crate::storage::* still works
pub use finsync_core::storage::{
    StorageError, StoreConnection, StoreConnector, StoreTransaction, StoredDocuments,
};

use crate::{
    config::{Backend, StorageConfig},
    error::SyncError,
    postgres_storage::PostgresConnector,
    sqlite_storage::SqliteConnector,
};

/// Builds the connector selected by `config`.
///
/// Fails with `SyncError::Configuration` when a database backend has no
/// connection string. Schema bootstrap failures are logged, not returned,
/// so the server can still start and report store errors per request.
pub fn open_connector(config: &StorageConfig) -> Result<Arc<dyn StoreConnector>, SyncError> {
    let connector: Arc<dyn StoreConnector> = match config.backend {
        Backend::Memory => {
            tracing::warn!("Using in-memory storage, data will not survive a restart");
            Arc::new(InMemoryStorage::new())
        }
        Backend::Postgres => {
            let url = config.connection_string().ok_or(SyncError::Configuration)?;
            let connector = PostgresConnector::new(&url);
            if config.init_schema {
                if let Err(e) = connector.init_schema() {
                    tracing::error!(error = %e, "PostgreSQL schema bootstrap failed");
                }
            }
            Arc::new(connector)
        }
        Backend::Sqlite => {
            let url = config.connection_string().ok_or(SyncError::Configuration)?;
            let connector = SqliteConnector::new(PathBuf::from(url));
            if config.init_schema {
                if let Err(e) = connector.init_schema() {
                    tracing::error!(error = %e, "SQLite schema bootstrap failed");
                }
            }
            Arc::new(connector)
        }
    };
    tracing::info!(backend = connector.name(), "Storage connector ready");
    Ok(connector)
}

/// Runs `work` inside one transaction on `connection`.
///
/// Commits when `work` succeeds. Otherwise rolls back explicitly and returns
/// the original error; a failed rollback is logged and the transaction is
/// still discarded when dropped.
pub fn in_transaction<T, F>(connection: &mut dyn StoreConnection, work: F) -> Result<T, StorageError>
where
    F: FnOnce(&mut dyn StoreTransaction) -> Result<T, StorageError>,
{
    let mut tx = connection.begin()?;
    match work(tx.as_mut()) {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_error) = tx.rollback() {
                tracing::error!(error = %rollback_error, "Rollback failed");
            }
            Err(e)
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Documents {
    periods: Option<Value>,
    configs: BTreeMap<ConfigKey, Value>,
}

/// Process-local store for tests and demos.
///
/// Transactions stage changes on a private copy and publish it as a whole
/// on commit. `load_snapshot` reads every document under one lock, so a
/// read sees either the old or the new state as a whole.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    documents: Arc<RwLock<Documents>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored period document, as a connection would load it.
    pub fn periods_document(&self) -> Result<Option<Value>, StorageError> {
        Ok(read(&self.documents)?.periods.clone())
    }

    /// Stored config document for `key`, as a connection would load it.
    pub fn config_document(&self, key: ConfigKey) -> Result<Option<Value>, StorageError> {
        Ok(read(&self.documents)?.configs.get(&key).cloned())
    }
}

fn read(documents: &RwLock<Documents>) -> Result<std::sync::RwLockReadGuard<'_, Documents>, StorageError> {
    documents.read().map_err(|_| StorageError::Poisoned)
}

impl StoreConnector for InMemoryStorage {
    fn connect(&self) -> Result<Box<dyn StoreConnection>, StorageError> {
        Ok(Box::new(MemoryConnection {
            documents: self.documents.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryConnection {
    documents: Arc<RwLock<Documents>>,
}

impl StoreConnection for MemoryConnection {
    fn load_periods(&mut self) -> Result<Option<Value>, StorageError> {
        Ok(read(&self.documents)?.periods.clone())
    }

    fn load_config(&mut self, key: ConfigKey) -> Result<Option<Value>, StorageError> {
        Ok(read(&self.documents)?.configs.get(&key).cloned())
    }

    fn load_snapshot(&mut self) -> Result<StoredDocuments, StorageError> {
        let documents = read(&self.documents)?;
        Ok(StoredDocuments {
            periods: documents.periods.clone(),
            subcategories: documents.configs.get(&ConfigKey::Subcategories).cloned(),
            bank_accounts: documents.configs.get(&ConfigKey::BankAccounts).cloned(),
        })
    }

    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>, StorageError> {
        let staged = read(&self.documents)?.clone();
        tracing::debug!("Memory transaction started");
        Ok(Box::new(MemoryTransaction {
            documents: &self.documents,
            staged,
        }))
    }
}

struct MemoryTransaction<'a> {
    documents: &'a RwLock<Documents>,
    staged: Documents,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn replace_periods(&mut self, periods: &[Value]) -> Result<(), StorageError> {
        self.staged.periods = Some(Value::Array(periods.to_vec()));
        Ok(())
    }

    fn upsert_config(&mut self, key: ConfigKey, document: &Value) -> Result<(), StorageError> {
        self.staged.configs.insert(key, document.clone());
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let MemoryTransaction { documents, staged } = *self;
        *documents.write().map_err(|_| StorageError::Poisoned)? = staged;
        tracing::debug!("Memory transaction committed");
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        tracing::debug!("Memory transaction rolled back");
        Ok(())
    }
}
