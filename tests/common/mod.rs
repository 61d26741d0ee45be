use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use serde_json::Value;

use finsync::storage::{StorageError, StoreConnection, StoreConnector, StoreTransaction, StoredDocuments};
use finsync::ConfigKey;

/// Connects opened and connections dropped through a `CountingConnector`.
#[derive(Default)]
pub struct Counts {
    connects: AtomicUsize,
    releases: AtomicUsize,
}

impl Counts {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Wraps a connector and records every connection it hands out.
pub struct CountingConnector {
    inner: Arc<dyn StoreConnector>,
    counts: Arc<Counts>,
}

impl CountingConnector {
    pub fn wrap(inner: Arc<dyn StoreConnector>) -> (Arc<Self>, Arc<Counts>) {
        let counts = Arc::new(Counts::default());
        let connector = Arc::new(Self {
            inner,
            counts: counts.clone(),
        });
        (connector, counts)
    }
}

impl StoreConnector for CountingConnector {
    fn connect(&self) -> Result<Box<dyn StoreConnection>, StorageError> {
        let inner = self.inner.connect()?;
        self.counts.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingConnection {
            inner,
            counts: self.counts.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

struct CountingConnection {
    inner: Box<dyn StoreConnection>,
    counts: Arc<Counts>,
}

impl Drop for CountingConnection {
    fn drop(&mut self) {
        self.counts.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl StoreConnection for CountingConnection {
    fn load_periods(&mut self) -> Result<Option<Value>, StorageError> {
        self.inner.load_periods()
    }

    fn load_config(&mut self, key: ConfigKey) -> Result<Option<Value>, StorageError> {
        self.inner.load_config(key)
    }

    fn load_snapshot(&mut self) -> Result<StoredDocuments, StorageError> {
        self.inner.load_snapshot()
    }

    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>, StorageError> {
        self.inner.begin()
    }
}
