use std::path::PathBuf;

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::Value;

use finsync_core::ConfigKey;

use crate::storage::{StorageError, StoreConnection, StoreConnector, StoreTransaction, StoredDocuments};

/// Connector for a single-file SQLite deployment.
///
/// Same layout as the PostgreSQL backend, with documents kept as JSON text.
pub struct SqliteConnector {
    path: PathBuf,
}

impl SqliteConnector {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn open(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path)
            .map_err(|e| StorageError::Connection(format!("SQLite open failed: {}", e)))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(conn)
    }

    pub fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.open()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS finance_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                periods TEXT
            );

            CREATE TABLE IF NOT EXISTS subcategories_data (
                id INTEGER PRIMARY KEY,
                app_config TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }
}

impl StoreConnector for SqliteConnector {
    fn connect(&self) -> Result<Box<dyn StoreConnection>, StorageError> {
        Ok(Box::new(SqliteConnection { conn: self.open()? }))
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

fn decode(table: &'static str, text: Option<String>) -> Result<Option<Value>, StorageError> {
    match text {
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StorageError::Decode {
                table,
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn encode<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Other(e.to_string()))
}

struct SqliteConnection {
    conn: Connection,
}

fn load_periods_with(conn: &Connection) -> Result<Option<Value>, StorageError> {
    let text = conn
        .query_row(
            "SELECT periods FROM finance_data ORDER BY id LIMIT 1",
            [],
            |r| r.get::<_, Option<String>>(0),
        )
        .optional()
        .map_err(|e| StorageError::Query(e.to_string()))?;
    decode("finance_data", text.flatten())
}

fn load_config_with(conn: &Connection, key: ConfigKey) -> Result<Option<Value>, StorageError> {
    let text = conn
        .query_row(
            "SELECT app_config FROM subcategories_data WHERE id = ?1",
            params![key.storage_id()],
            |r| r.get::<_, Option<String>>(0),
        )
        .optional()
        .map_err(|e| StorageError::Query(e.to_string()))?;
    decode("subcategories_data", text.flatten())
}

impl StoreConnection for SqliteConnection {
    fn load_periods(&mut self) -> Result<Option<Value>, StorageError> {
        load_periods_with(&self.conn)
    }

    fn load_config(&mut self, key: ConfigKey) -> Result<Option<Value>, StorageError> {
        load_config_with(&self.conn, key)
    }

    fn load_snapshot(&mut self) -> Result<StoredDocuments, StorageError> {
        // In WAL mode one read transaction sees a single database snapshot.
        let tx = self
            .conn
            .transaction()
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let documents = StoredDocuments {
            periods: load_periods_with(&tx)?,
            subcategories: load_config_with(&tx, ConfigKey::Subcategories)?,
            bank_accounts: load_config_with(&tx, ConfigKey::BankAccounts)?,
        };
        tx.commit().map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(documents)
    }

    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>, StorageError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| StorageError::Query(e.to_string()))?;
        tracing::debug!("SQLite transaction started");
        Ok(Box::new(SqliteTransaction { tx }))
    }
}

struct SqliteTransaction<'a> {
    tx: Transaction<'a>,
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn replace_periods(&mut self, periods: &[Value]) -> Result<(), StorageError> {
        let text = encode(periods)?;
        self.tx
            .execute_batch(
                "DELETE FROM finance_data;
                 DELETE FROM sqlite_sequence WHERE name = 'finance_data';",
            )
            .map_err(|e| StorageError::Query(e.to_string()))?;
        self.tx
            .execute(
                "INSERT INTO finance_data (periods) VALUES (?1)",
                params![text],
            )
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    fn upsert_config(&mut self, key: ConfigKey, document: &Value) -> Result<(), StorageError> {
        let text = encode(document)?;
        self.tx
            .execute(
                "INSERT INTO subcategories_data (id, app_config) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET app_config = excluded.app_config",
                params![key.storage_id(), text],
            )
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx
            .commit()
            .map_err(|e| StorageError::Query(e.to_string()))?;
        tracing::debug!("SQLite transaction committed");
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.tx
            .rollback()
            .map_err(|e| StorageError::Query(e.to_string()))?;
        tracing::debug!("SQLite transaction rolled back");
        Ok(())
    }
}
