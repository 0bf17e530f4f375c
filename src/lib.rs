//! Cornell-style note taking: a local workspace of notes and folders,
//! explicit saving to a single document in Google Drive, and plain-text
//! export.

pub mod config;
pub mod export;
pub mod storage;
pub mod sync;

pub use config::{AppConfig, ConfigError};
pub use storage::{Folder, Note, NoteBlock, Workspace};
pub use sync::{RemoteSync, SaveScheduler};
