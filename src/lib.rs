//! finsync: full-state synchronization for the finance tracker.
//!
//! Reads compose the stored documents into one `AggregateState`; writes
//! replace every stored document in a single transaction.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod postgres_storage;
pub mod replacer;
pub mod sqlite_storage;
pub mod storage;

pub use finsync_core::{AggregateState, ConfigKey};
