use postgres::{types::Json, Client, GenericClient, IsolationLevel, NoTls, Transaction};
use serde_json::Value;

use finsync_core::ConfigKey;

use crate::storage::{StorageError, StoreConnection, StoreConnector, StoreTransaction, StoredDocuments};

/// Connector for the PostgreSQL JSONB layout.
///
/// `finance_data` holds the period collection in a single row and
/// `subcategories_data` holds one row per `ConfigKey`.
pub struct PostgresConnector {
    connection_string: String,
}

impl PostgresConnector {
    pub fn new(connection_string: &str) -> Self {
        Self {
            connection_string: connection_string.to_string(),
        }
    }

    fn open(&self) -> Result<Client, StorageError> {
        Client::connect(&self.connection_string, NoTls)
            .map_err(|e| StorageError::Connection(format!("PostgreSQL connection failed: {}", e)))
    }

    pub fn init_schema(&self) -> Result<(), StorageError> {
        let mut client = self.open()?;
        client
            .batch_execute(
                "
            CREATE TABLE IF NOT EXISTS finance_data (
                id SERIAL PRIMARY KEY,
                periods JSONB
            );

            CREATE TABLE IF NOT EXISTS subcategories_data (
                id INTEGER PRIMARY KEY,
                app_config JSONB NOT NULL
            );
            ",
            )
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }
}

impl StoreConnector for PostgresConnector {
    fn connect(&self) -> Result<Box<dyn StoreConnection>, StorageError> {
        Ok(Box::new(PostgresConnection { client: self.open()? }))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

struct PostgresConnection {
    client: Client,
}

fn load_periods_with(client: &mut impl GenericClient) -> Result<Option<Value>, StorageError> {
    let row = client
        .query_opt("SELECT periods FROM finance_data ORDER BY id LIMIT 1", &[])
        .map_err(|e| StorageError::Query(e.to_string()))?;
    match row {
        Some(row) => row
            .try_get::<_, Option<Value>>(0)
            .map_err(|e| StorageError::Decode {
                table: "finance_data",
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn load_config_with(client: &mut impl GenericClient, key: ConfigKey) -> Result<Option<Value>, StorageError> {
    let row = client
        .query_opt(
            "SELECT app_config FROM subcategories_data WHERE id = $1",
            &[&key.storage_id()],
        )
        .map_err(|e| StorageError::Query(e.to_string()))?;
    match row {
        Some(row) => row
            .try_get::<_, Option<Value>>(0)
            .map_err(|e| StorageError::Decode {
                table: "subcategories_data",
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

impl StoreConnection for PostgresConnection {
    fn load_periods(&mut self) -> Result<Option<Value>, StorageError> {
        load_periods_with(&mut self.client)
    }

    fn load_config(&mut self, key: ConfigKey) -> Result<Option<Value>, StorageError> {
        load_config_with(&mut self.client, key)
    }

    fn load_snapshot(&mut self) -> Result<StoredDocuments, StorageError> {
        // REPEATABLE READ pins one snapshot for all three statements.
        let mut tx = self
            .client
            .build_transaction()
            .isolation_level(IsolationLevel::RepeatableRead)
            .read_only(true)
            .start()
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let documents = StoredDocuments {
            periods: load_periods_with(&mut tx)?,
            subcategories: load_config_with(&mut tx, ConfigKey::Subcategories)?,
            bank_accounts: load_config_with(&mut tx, ConfigKey::BankAccounts)?,
        };
        tx.commit().map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(documents)
    }

    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>, StorageError> {
        let tx = self
            .client
            .transaction()
            .map_err(|e| StorageError::Query(e.to_string()))?;
        tracing::debug!("PostgreSQL transaction started");
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

struct PostgresTransaction<'a> {
    tx: Transaction<'a>,
}

impl StoreTransaction for PostgresTransaction<'_> {
    fn replace_periods(&mut self, periods: &[Value]) -> Result<(), StorageError> {
        self.tx
            .batch_execute("TRUNCATE TABLE finance_data RESTART IDENTITY")
            .map_err(|e| StorageError::Query(e.to_string()))?;
        self.tx
            .execute(
                "INSERT INTO finance_data (periods) VALUES ($1)",
                &[&Json(periods)],
            )
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    fn upsert_config(&mut self, key: ConfigKey, document: &Value) -> Result<(), StorageError> {
        self.tx
            .execute(
                "INSERT INTO subcategories_data (id, app_config) VALUES ($1, $2)
                 ON CONFLICT (id) DO UPDATE SET app_config = EXCLUDED.app_config",
                &[&key.storage_id(), &Json(document)],
            )
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx
            .commit()
            .map_err(|e| StorageError::Query(e.to_string()))?;
        tracing::debug!("PostgreSQL transaction committed");
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.tx
            .rollback()
            .map_err(|e| StorageError::Query(e.to_string()))?;
        tracing::debug!("PostgreSQL transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::storage::in_transaction;

    /// Runs against a live server only when `FINSYNC_TEST_POSTGRES_URL` is set.
    fn test_connector() -> Option<PostgresConnector> {
        let url = std::env::var("FINSYNC_TEST_POSTGRES_URL").ok()?;
        let connector = PostgresConnector::new(&url);
        connector.init_schema().unwrap();
        Some(connector)
    }

    #[test]
    fn test_postgres_replace_keeps_single_row() {
        let Some(connector) = test_connector() else { return };
        let mut conn = connector.connect().unwrap();
        for label in ["first", "second"] {
            in_transaction(conn.as_mut(), |tx| {
                tx.replace_periods(&[json!([{ "startDate": "2024-01-01", "label": label }])])
            })
            .unwrap();
        }

        let mut client = connector.open().unwrap();
        let count: i64 = client
            .query_one("SELECT COUNT(*) FROM finance_data", &[])
            .unwrap()
            .get(0);
        assert_eq!(count, 1);
        let id: i32 = client
            .query_one("SELECT id FROM finance_data", &[])
            .unwrap()
            .get(0);
        assert_eq!(id, 1, "identity should restart on every replace");
        assert_eq!(
            conn.load_periods().unwrap(),
            Some(json!([[{ "startDate": "2024-01-01", "label": "second" }]]))
        );
    }

    #[test]
    fn test_postgres_rollback_discards_upsert() {
        let Some(connector) = test_connector() else { return };
        let mut conn = connector.connect().unwrap();
        let before = conn.load_config(ConfigKey::BankAccounts).unwrap();

        let mut tx = conn.begin().unwrap();
        tx.upsert_config(ConfigKey::BankAccounts, &json!({ "bankAccounts": ["rolled back"] }))
            .unwrap();
        tx.rollback().unwrap();

        assert_eq!(conn.load_config(ConfigKey::BankAccounts).unwrap(), before);
    }

    #[test]
    fn test_postgres_snapshot_matches_committed_state() {
        let Some(connector) = test_connector() else { return };
        let mut conn = connector.connect().unwrap();
        in_transaction(conn.as_mut(), |tx| {
            tx.replace_periods(&[json!({ "startDate": "2024-06-01" })])?;
            tx.upsert_config(ConfigKey::Subcategories, &json!({ "subcategories": {} }))?;
            tx.upsert_config(ConfigKey::BankAccounts, &json!({ "bankAccounts": ["Checking"] }))
        })
        .unwrap();

        let snapshot = conn.load_snapshot().unwrap();
        assert_eq!(snapshot.periods, conn.load_periods().unwrap());
        assert_eq!(
            snapshot.bank_accounts,
            Some(json!({ "bankAccounts": ["Checking"] }))
        );
    }
}
