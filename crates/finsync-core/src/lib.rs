//! Core types and traits for finsync storage backends.
//!
//! This crate provides the `StoreConnector` family of traits and the
//! document model shared by the read and write paths, so that store
//! implementations can live outside the server crate.

pub mod models;
pub mod storage;

// Re-export key types at crate root for convenience
pub use models::{AggregateState, ConfigKey};
pub use models::period::{sort_periods, PeriodShape};
pub use storage::{StorageError, StoreConnection, StoreConnector, StoreTransaction, StoredDocuments};
