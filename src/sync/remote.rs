use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use super::auth::{AccessToken, ConsentFlow, LoopbackConsent, TokenCache};
use super::config::SyncSettings;
use super::drive::{file_query, folder_query, DriveApi, DriveClient, DriveError, FileMetadata};
use crate::config::AppConfig;
use crate::storage::{Folder, KvStore, Note, StorageError};

#[derive(Error, Debug)]
pub enum InitError {
    #[error("Google client id is not configured")]
    MissingCredentialConfiguration,
    #[error("Failed to initialize Drive client: {0}")]
    Generic(String),
}

impl InitError {
    /// Message suitable for showing to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            InitError::MissingCredentialConfiguration => {
                "Google Client ID is not configured. Set client_id in config.toml or CORNELL_CLIENT_ID to enable Google Drive sync."
            }
            InitError::Generic(_) => "Failed to connect to Google Drive. Please try again later.",
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Not signed in to Google Drive")]
    NotSignedIn,
    #[error("Drive error: {0}")]
    Drive(#[from] DriveError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// The single remote document holding every note and folder
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RemoteDocument {
    pub notes: Vec<Note>,
    pub folders: Vec<Folder>,
}

/// Parsing shape: either collection may be missing or null
#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    #[serde(default)]
    notes: Option<Vec<Note>>,
    #[serde(default)]
    folders: Option<Vec<Folder>>,
}

impl RemoteDocument {
    pub fn parse(body: &str) -> Result<Self, serde_json::Error> {
        let raw: RawDocument = serde_json::from_str(body)?;
        Ok(Self {
            notes: raw.notes.unwrap_or_default(),
            folders: raw.folders.unwrap_or_default(),
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Remote ids resolved once per session
#[derive(Debug, Default)]
struct ResourceIds {
    folder_id: Option<String>,
    file_id: Option<String>,
}

/// Bridges local state to the remote document in the user's Drive.
///
/// Auth state changes are published on a watch channel: `true` once a
/// token is available, `false` after sign-out or a failed consent.
pub struct RemoteSync {
    drive: Arc<dyn DriveApi>,
    consent: Arc<dyn ConsentFlow>,
    tokens: TokenCache,
    settings: SyncSettings,
    client_configured: bool,
    token: RwLock<Option<AccessToken>>,
    ids: Mutex<ResourceIds>,
    auth_tx: watch::Sender<bool>,
    initialized: AtomicBool,
}

impl RemoteSync {
    pub fn new(
        config: &AppConfig,
        store: KvStore,
        drive: Arc<dyn DriveApi>,
        consent: Arc<dyn ConsentFlow>,
    ) -> Self {
        let (auth_tx, _) = watch::channel(false);
        Self {
            drive,
            consent,
            tokens: TokenCache::new(store),
            settings: config.sync.clone(),
            client_configured: config.has_client_id(),
            token: RwLock::new(None),
            ids: Mutex::new(ResourceIds::default()),
            auth_tx,
            initialized: AtomicBool::new(false),
        }
    }

    /// Adapter wired to the real Drive API and the loopback consent flow
    pub fn google(
        config: &AppConfig,
        store: KvStore,
        on_authorize_url: impl Fn(&str) + Send + Sync + 'static,
    ) -> Result<Self, InitError> {
        let drive = DriveClient::new().map_err(|e| InitError::Generic(e.to_string()))?;
        let consent = LoopbackConsent::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.redirect_port,
        )
        .with_url_handler(on_authorize_url);
        Ok(Self::new(config, store, Arc::new(drive), Arc::new(consent)))
    }

    /// Validate configuration and restore a cached token.
    ///
    /// Publishes signed-in right away when an unexpired token is cached.
    /// Returns a receiver for auth state changes.
    pub fn initialize(&self) -> Result<watch::Receiver<bool>, InitError> {
        if !self.client_configured {
            return Err(InitError::MissingCredentialConfiguration);
        }

        if let Some(stored) = self.tokens.restore() {
            self.set_token(Some(stored.access_token()));
            self.auth_tx.send_replace(true);
            log::info!("Drive sync: restored cached session");
        }

        self.initialized.store(true, Ordering::SeqCst);
        Ok(self.auth_tx.subscribe())
    }

    /// Another receiver for auth state changes
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.auth_tx.subscribe()
    }

    pub fn is_signed_in(&self) -> bool {
        *self.auth_tx.borrow()
    }

    /// Run the consent flow. The outcome is published on the auth channel.
    pub async fn sign_in(&self) {
        if !self.initialized.load(Ordering::SeqCst) {
            log::warn!("Drive sync: sign-in requested before initialize");
            return;
        }

        match self.consent.request_token().await {
            Ok(response) if !response.access_token.is_empty() => {
                let stored = self.tokens.save(response);
                self.set_token(Some(stored.access_token()));
                self.auth_tx.send_replace(true);
                log::info!("Drive sync: signed in");
            }
            outcome => {
                if let Err(e) = outcome {
                    log::error!("Drive sync: sign-in failed: {}", e);
                } else {
                    log::error!("Drive sync: token response had no access token");
                }
                self.tokens.clear();
                self.set_token(None);
                if self.is_signed_in() {
                    self.auth_tx.send_replace(false);
                }
            }
        }
    }

    /// Forget the token and cached ids, revoke the token remotely (best
    /// effort), then publish signed-out. Without a held token nothing is
    /// published. Returns whether a session was ended.
    pub async fn sign_out(&self) -> bool {
        self.tokens.clear();
        let Some(token) = self.take_token() else {
            log::debug!("Drive sync: sign-out requested without a session");
            return false;
        };
        *self.ids.lock().await = ResourceIds::default();

        if let Err(e) = self.drive.revoke(&token).await {
            log::warn!("Drive sync: token revocation failed: {}", e);
        }

        self.auth_tx.send_replace(false);
        log::info!("Drive sync: signed out");
        true
    }

    /// Download the remote document.
    ///
    /// Failing to resolve the app folder is an error. Failing to resolve,
    /// download or parse the data file yields an empty document instead.
    pub async fn fetch_remote_state(&self) -> Result<RemoteDocument, SyncError> {
        let token = self.current_token()?;
        let mut ids = self.ids.lock().await;
        let folder_id = self.resolve_folder_id(&mut ids, &token).await?;

        match self.download_document(&mut ids, &token, &folder_id).await {
            Ok(document) => {
                log::info!(
                    "Drive sync: fetched {} note(s), {} folder(s)",
                    document.notes.len(),
                    document.folders.len()
                );
                Ok(document)
            }
            Err(e) => {
                log::error!(
                    "Drive sync: could not fetch or parse data file, starting with empty state: {}",
                    e
                );
                Ok(RemoteDocument::default())
            }
        }
    }

    /// Overwrite the remote document with the given collections
    pub async fn push_local_state(&self, document: &RemoteDocument) -> Result<(), SyncError> {
        let token = self.current_token()?;
        let body = document.to_json()?;

        let mut ids = self.ids.lock().await;
        let folder_id = self.resolve_folder_id(&mut ids, &token).await?;
        let file_id = self.resolve_file_id(&mut ids, &token, &folder_id).await?;
        drop(ids);

        self.drive.upload(&token, &file_id, body).await?;
        log::info!(
            "Drive sync: saved {} note(s), {} folder(s)",
            document.notes.len(),
            document.folders.len()
        );
        Ok(())
    }

    async fn download_document(
        &self,
        ids: &mut ResourceIds,
        token: &AccessToken,
        folder_id: &str,
    ) -> Result<RemoteDocument, SyncError> {
        let file_id = self.resolve_file_id(ids, token, folder_id).await?;
        let body = self.drive.download(token, &file_id).await?;
        Ok(RemoteDocument::parse(&body)?)
    }

    async fn resolve_folder_id(
        &self,
        ids: &mut ResourceIds,
        token: &AccessToken,
    ) -> Result<String, DriveError> {
        if let Some(ref id) = ids.folder_id {
            return Ok(id.clone());
        }

        let query = folder_query(&self.settings.folder_name);
        let id = match self.drive.find_files(token, &query).await?.into_iter().next() {
            Some(folder) => folder.id,
            None => {
                let metadata = FileMetadata::folder(&self.settings.folder_name);
                self.drive.create_file(token, &metadata).await?.id
            }
        };

        ids.folder_id = Some(id.clone());
        Ok(id)
    }

    async fn resolve_file_id(
        &self,
        ids: &mut ResourceIds,
        token: &AccessToken,
        folder_id: &str,
    ) -> Result<String, DriveError> {
        if let Some(ref id) = ids.file_id {
            return Ok(id.clone());
        }

        let query = file_query(folder_id, &self.settings.file_name);
        let id = match self.drive.find_files(token, &query).await?.into_iter().next() {
            Some(file) => file.id,
            None => {
                let metadata = FileMetadata::json_file(&self.settings.file_name, folder_id);
                let created = self.drive.create_file(token, &metadata).await?;
                let initial = RemoteDocument::default()
                    .to_json()
                    .map_err(DriveError::Json)?;
                self.drive.upload(token, &created.id, initial).await?;
                created.id
            }
        };

        ids.file_id = Some(id.clone());
        Ok(id)
    }

    fn current_token(&self) -> Result<AccessToken, SyncError> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(SyncError::NotSignedIn)
    }

    fn set_token(&self, token: Option<AccessToken>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    fn take_token(&self) -> Option<AccessToken> {
        self.token.write().unwrap_or_else(|e| e.into_inner()).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{test_config, MemoryDrive, ScriptedConsent};
    use tempfile::TempDir;

    fn remote(drive: Arc<MemoryDrive>, consent: ScriptedConsent, dir: &TempDir) -> RemoteSync {
        RemoteSync::new(
            &test_config(),
            KvStore::new(dir.path().to_path_buf()),
            drive,
            Arc::new(consent),
        )
    }

    async fn signed_in(drive: Arc<MemoryDrive>, dir: &TempDir) -> RemoteSync {
        let remote = remote(drive, ScriptedConsent::granting(), dir);
        remote.initialize().unwrap();
        remote.sign_in().await;
        assert!(remote.is_signed_in());
        remote
    }

    #[test]
    fn test_initialize_requires_client_id() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            client_id: String::new(),
            ..test_config()
        };
        let remote = RemoteSync::new(
            &config,
            KvStore::new(dir.path().to_path_buf()),
            Arc::new(MemoryDrive::new()),
            Arc::new(ScriptedConsent::granting()),
        );

        assert!(matches!(
            remote.initialize(),
            Err(InitError::MissingCredentialConfiguration)
        ));
    }

    #[test]
    fn test_initialize_restores_cached_token() {
        let dir = TempDir::new().unwrap();
        let store = KvStore::new(dir.path().to_path_buf());
        TokenCache::new(store).save(ScriptedConsent::token_response());

        let remote = remote(Arc::new(MemoryDrive::new()), ScriptedConsent::granting(), &dir);
        let rx = remote.initialize().unwrap();
        assert!(*rx.borrow());
        assert!(remote.is_signed_in());
    }

    #[tokio::test]
    async fn test_sign_in_publishes_and_caches_token() {
        let dir = TempDir::new().unwrap();
        let remote = remote(Arc::new(MemoryDrive::new()), ScriptedConsent::granting(), &dir);
        let mut rx = remote.initialize().unwrap();
        assert!(!*rx.borrow());

        remote.sign_in().await;

        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        let cache = TokenCache::new(KvStore::new(dir.path().to_path_buf()));
        assert!(cache.restore().is_some());
    }

    #[tokio::test]
    async fn test_denied_sign_in_stays_signed_out() {
        let dir = TempDir::new().unwrap();
        let remote = remote(Arc::new(MemoryDrive::new()), ScriptedConsent::denying(), &dir);
        remote.initialize().unwrap();

        remote.sign_in().await;

        assert!(!remote.is_signed_in());
        assert!(matches!(
            remote.fetch_remote_state().await,
            Err(SyncError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_fetch_creates_folder_and_empty_document() {
        let dir = TempDir::new().unwrap();
        let drive = Arc::new(MemoryDrive::new());
        let remote = signed_in(drive.clone(), &dir).await;

        let document = remote.fetch_remote_state().await.unwrap();

        assert_eq!(document, RemoteDocument::default());
        assert_eq!(drive.create_calls.load(Ordering::SeqCst), 2);
        let body = drive.content_of("app-data.cornell").unwrap();
        assert_eq!(RemoteDocument::parse(&body).unwrap(), RemoteDocument::default());
    }

    #[tokio::test]
    async fn test_resource_ids_are_memoized() {
        let dir = TempDir::new().unwrap();
        let drive = Arc::new(MemoryDrive::new());
        let remote = signed_in(drive.clone(), &dir).await;

        remote.fetch_remote_state().await.unwrap();
        let lookups = drive.list_calls.load(Ordering::SeqCst);
        remote.fetch_remote_state().await.unwrap();
        remote.push_local_state(&RemoteDocument::default()).await.unwrap();

        assert_eq!(drive.list_calls.load(Ordering::SeqCst), lookups);
        assert_eq!(drive.create_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_existing_remote_document_is_reused() {
        let dir = TempDir::new().unwrap();
        let drive = Arc::new(MemoryDrive::new());
        drive.seed_document(
            r##"{"notes":[{"id":"n1","title":"Old","index":"Q","content":"","notes":"","createdAt":"2024-01-01T00:00:00.000Z","updatedAt":"2024-01-01T00:00:00.000Z","folderId":null}],"folders":[{"id":"f1","name":"F","color":"#fff"}]}"##,
        );
        let remote = signed_in(drive.clone(), &dir).await;

        let document = remote.fetch_remote_state().await.unwrap();

        assert_eq!(drive.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(document.folders.len(), 1);
        assert_eq!(document.notes[0].blocks[0].content, "Q");
    }

    #[tokio::test]
    async fn test_unparseable_document_degrades_to_empty() {
        let dir = TempDir::new().unwrap();
        let drive = Arc::new(MemoryDrive::new());
        drive.seed_document("this is not json");
        let remote = signed_in(drive, &dir).await;

        let document = remote.fetch_remote_state().await.unwrap();
        assert_eq!(document, RemoteDocument::default());
    }

    #[tokio::test]
    async fn test_null_collections_parse_as_empty() {
        let document = RemoteDocument::parse(r#"{"notes":null}"#).unwrap();
        assert!(document.notes.is_empty());
        assert!(document.folders.is_empty());
    }

    #[tokio::test]
    async fn test_push_overwrites_document() {
        let dir = TempDir::new().unwrap();
        let drive = Arc::new(MemoryDrive::new());
        let remote = signed_in(drive.clone(), &dir).await;

        let document = RemoteDocument {
            notes: vec![Note::new(None)],
            folders: vec![Folder::new("Physics".into(), None)],
        };
        remote.push_local_state(&document).await.unwrap();

        let body = drive.content_of("app-data.cornell").unwrap();
        assert_eq!(RemoteDocument::parse(&body).unwrap(), document);
    }

    #[tokio::test]
    async fn test_sign_out_revokes_and_clears() {
        let dir = TempDir::new().unwrap();
        let drive = Arc::new(MemoryDrive::new());
        let remote = signed_in(drive.clone(), &dir).await;
        remote.fetch_remote_state().await.unwrap();

        assert!(remote.sign_out().await);

        assert!(!remote.is_signed_in());
        assert!(drive.revoked.load(Ordering::SeqCst));
        let cache = TokenCache::new(KvStore::new(dir.path().to_path_buf()));
        assert!(cache.restore().is_none());
        assert!(remote.ids.lock().await.folder_id.is_none());
    }

    #[tokio::test]
    async fn test_sign_out_without_session_publishes_nothing() {
        let dir = TempDir::new().unwrap();
        let drive = Arc::new(MemoryDrive::new());
        let remote = remote(drive.clone(), ScriptedConsent::granting(), &dir);
        let auth = remote.initialize().unwrap();

        assert!(!remote.sign_out().await);

        assert!(!auth.has_changed().unwrap());
        assert!(!drive.revoked.load(Ordering::SeqCst));
    }
}
