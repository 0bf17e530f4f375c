//! In-memory Drive and consent doubles shared by the sync tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::auth::{AccessToken, AuthError, ConsentFlow, TokenResponse};
use super::config::{SyncSettings, DRIVE_SCOPE};
use super::drive::{
    file_query, folder_query, DriveApi, DriveError, DriveFile, FileMetadata, FOLDER_MIME_TYPE,
};
use crate::config::AppConfig;

pub fn test_config() -> AppConfig {
    AppConfig {
        client_id: "test-client.apps.googleusercontent.com".to_string(),
        client_secret: None,
        redirect_port: 0,
        sync: SyncSettings {
            saved_display_ms: 50,
            sync_grace_ms: 20,
            ..SyncSettings::default()
        },
    }
}

struct StoredFile {
    id: String,
    metadata: FileMetadata,
    content: String,
}

impl StoredFile {
    fn matches(&self, query: &str) -> bool {
        if self.metadata.mime_type == FOLDER_MIME_TYPE {
            folder_query(&self.metadata.name) == query
        } else {
            self.metadata
                .parents
                .iter()
                .any(|parent| file_query(parent, &self.metadata.name) == query)
        }
    }
}

/// Drive backed by a vector of files, counting every call
#[derive(Default)]
pub struct MemoryDrive {
    files: Mutex<Vec<StoredFile>>,
    next_id: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub revoked: AtomicBool,
    pub fail_uploads: AtomicBool,
    upload_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MemoryDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the app folder and data file with the given content
    pub fn seed_document(&self, body: &str) {
        let settings = SyncSettings::default();
        let folder_id = self.insert(FileMetadata::folder(&settings.folder_name), String::new());
        self.insert(
            FileMetadata::json_file(&settings.file_name, &folder_id),
            body.to_string(),
        );
    }

    pub fn content_of(&self, name: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|file| file.metadata.name == name)
            .map(|file| file.content.clone())
    }

    /// Block uploads until [`MemoryDrive::release_uploads`] is called
    pub fn hold_uploads(&self) {
        *self.upload_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_uploads(&self) {
        if let Some(gate) = self.upload_gate.lock().unwrap().as_ref() {
            gate.add_permits(1024);
        }
    }

    fn insert(&self, metadata: FileMetadata, content: String) -> String {
        let id = format!("file-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.files.lock().unwrap().push(StoredFile {
            id: id.clone(),
            metadata,
            content,
        });
        id
    }
}

#[async_trait]
impl DriveApi for MemoryDrive {
    async fn find_files(&self, _token: &AccessToken, query: &str) -> Result<Vec<DriveFile>, DriveError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|file| file.matches(query))
            .map(|file| DriveFile {
                id: file.id.clone(),
                name: Some(file.metadata.name.clone()),
            })
            .collect())
    }

    async fn create_file(&self, _token: &AccessToken, metadata: &FileMetadata) -> Result<DriveFile, DriveError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let id = self.insert(metadata.clone(), String::new());
        Ok(DriveFile {
            id,
            name: Some(metadata.name.clone()),
        })
    }

    async fn download(&self, _token: &AccessToken, file_id: &str) -> Result<String, DriveError> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|file| file.id == file_id)
            .map(|file| file.content.clone())
            .ok_or_else(|| DriveError::NotFound(file_id.to_string()))
    }

    async fn upload(&self, _token: &AccessToken, file_id: &str, body: String) -> Result<(), DriveError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(DriveError::Server {
                status: 500,
                message: "backend unavailable".to_string(),
            });
        }

        let mut files = self.files.lock().unwrap();
        let file = files
            .iter_mut()
            .find(|file| file.id == file_id)
            .ok_or_else(|| DriveError::NotFound(file_id.to_string()))?;
        file.content = body;
        Ok(())
    }

    async fn revoke(&self, _token: &AccessToken) -> Result<(), DriveError> {
        self.revoked.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Consent flow returning a fixed outcome
pub struct ScriptedConsent {
    grant: bool,
}

impl ScriptedConsent {
    pub fn granting() -> Self {
        Self { grant: true }
    }

    pub fn denying() -> Self {
        Self { grant: false }
    }

    pub fn token_response() -> TokenResponse {
        TokenResponse {
            access_token: "ya29.test".to_string(),
            expires_in: 3600,
            scope: Some(DRIVE_SCOPE.to_string()),
            token_type: Some("Bearer".to_string()),
        }
    }
}

#[async_trait]
impl ConsentFlow for ScriptedConsent {
    async fn request_token(&self) -> Result<TokenResponse, AuthError> {
        if self.grant {
            Ok(Self::token_response())
        } else {
            Err(AuthError::ConsentDenied("access_denied".to_string()))
        }
    }
}
