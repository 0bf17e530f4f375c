//! Google Drive sync: token handling, the remote document adapter, and the
//! save scheduler that ties local edits to explicit uploads.

pub mod auth;
pub mod config;
pub mod drive;
pub mod remote;
pub mod scheduler;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AccessToken, AuthError, ConsentFlow, LoopbackConsent, StoredToken, TokenCache, TokenResponse};
pub use config::{SaveStatus, SavingStatus, SyncSettings};
pub use drive::{DriveApi, DriveClient, DriveError};
pub use remote::{InitError, RemoteDocument, RemoteSync, SyncError};
pub use scheduler::{SaveError, SaveOutcome, SaveScheduler, SharedWorkspace, SyncOutcome};
pub use session::{start_session, SessionHandle, SessionMessage};
