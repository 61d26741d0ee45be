use std::sync::Arc;

use finsync_core::{AggregateState, ConfigKey};

use crate::{
    error::SyncError,
    storage::{in_transaction, StorageError, StoreConnector, StoreTransaction},
};

/// Replaces the whole stored state with a submitted snapshot.
///
/// All three documents are written in one transaction. Either every one of
/// them is replaced or none is.
pub struct WriteReplacer {
    connector: Arc<dyn StoreConnector>,
}

impl WriteReplacer {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self { connector }
    }

    /// Decodes a request body. Runs before any store access.
    pub fn parse(body: &[u8]) -> Result<AggregateState, SyncError> {
        serde_json::from_slice(body).map_err(|e| {
            tracing::warn!(error = %e, "Rejected save request body");
            SyncError::BadRequest(e)
        })
    }

    pub fn replace(&self, state: &AggregateState) -> Result<(), SyncError> {
        self.persist(state).map_err(|e| {
            tracing::error!(backend = self.connector.name(), error = %e, "Failed to save data, transaction rolled back");
            SyncError::Save(e)
        })?;
        tracing::info!(
            periods = state.periods.len(),
            bank_accounts = state.bank_accounts.len(),
            "All data saved"
        );
        Ok(())
    }

    fn persist(&self, state: &AggregateState) -> Result<(), StorageError> {
        let mut conn = self.connector.connect()?;
        in_transaction(conn.as_mut(), |tx| apply(tx, state))
    }
}

fn apply(tx: &mut dyn StoreTransaction, state: &AggregateState) -> Result<(), StorageError> {
    tx.replace_periods(&state.periods)?;
    for key in ConfigKey::ALL {
        tx.upsert_config(key, &state.config_document(key))?;
    }
    Ok(())
}
