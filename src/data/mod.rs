//! Records, the storage trait and its PostgreSQL implementation.

pub mod models;
pub mod pg;
pub mod store;

pub use pg::PgStore;
pub use store::{FlagCounts, SyncStore};
