//! Storage layer

pub mod memory;
pub mod schema;
pub mod store;
pub mod tables;
pub mod traits;

pub use memory::MemoryRecordStore;
pub use schema::{JsonMap, ListQuery, TableSpec};
pub use store::PostgresRecordStore;
pub use traits::{BalanceRefresh, RecordStore, RideTransition, TransitionOutcome};
