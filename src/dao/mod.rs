//! Persistence of career statistics across matches.

pub mod stats;
pub mod storage;

pub use stats::{CareerStats, MemoryStatsStore, StatsStore};
pub use storage::{StorageError, StorageResult};
