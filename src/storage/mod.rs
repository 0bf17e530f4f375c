pub mod kv_store;
pub mod migration;
mod models;
mod workspace;

pub use kv_store::{KvStore, Persisted};
pub use models::*;
pub use workspace::{Result, StorageError, Workspace};
