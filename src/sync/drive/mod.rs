//! Narrow typed boundary over the Google Drive v3 API.
//!
//! Only the calls the sync adapter needs are modeled: listing files by
//! query, creating a file or folder, downloading and overwriting a file's
//! content, and revoking the access token.

mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::auth::AccessToken;

pub use client::DriveClient;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const JSON_MIME_TYPE: &str = "application/json";

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication failed")]
    AuthFailed,
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// File entry as returned by `files.list` / `files.create`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriveFile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `files.list` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
}

/// Request body for `files.create`
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

impl FileMetadata {
    pub fn folder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            parents: Vec::new(),
        }
    }

    pub fn json_file(name: &str, parent_id: &str) -> Self {
        Self {
            name: name.to_string(),
            mime_type: JSON_MIME_TYPE.to_string(),
            parents: vec![parent_id.to_string()],
        }
    }
}

/// The Drive operations used by sync
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// `files.list` with a search query, returning matching files
    async fn find_files(&self, token: &AccessToken, query: &str) -> Result<Vec<DriveFile>, DriveError>;

    /// `files.create` with metadata only
    async fn create_file(&self, token: &AccessToken, metadata: &FileMetadata) -> Result<DriveFile, DriveError>;

    /// `files.get?alt=media`
    async fn download(&self, token: &AccessToken, file_id: &str) -> Result<String, DriveError>;

    /// Media upload replacing the file's whole content
    async fn upload(&self, token: &AccessToken, file_id: &str, body: String) -> Result<(), DriveError>;

    /// Revoke the access token
    async fn revoke(&self, token: &AccessToken) -> Result<(), DriveError>;
}

/// Escape a value for use inside a single-quoted Drive query string
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Query for the app folder by name
pub fn folder_query(folder_name: &str) -> String {
    format!(
        "mimeType='{}' and name='{}' and trashed=false",
        FOLDER_MIME_TYPE,
        escape_query_value(folder_name)
    )
}

/// Query for the data file inside the app folder
pub fn file_query(folder_id: &str, file_name: &str) -> String {
    format!(
        "'{}' in parents and name='{}' and trashed=false",
        escape_query_value(folder_id),
        escape_query_value(file_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_query() {
        assert_eq!(
            folder_query("Cornell Notes"),
            "mimeType='application/vnd.google-apps.folder' and name='Cornell Notes' and trashed=false"
        );
    }

    #[test]
    fn test_file_query_escapes_quotes() {
        assert_eq!(
            file_query("abc123", "it's.cornell"),
            "'abc123' in parents and name='it\\'s.cornell' and trashed=false"
        );
    }

    #[test]
    fn test_file_metadata_shape() {
        let value = serde_json::to_value(FileMetadata::json_file("app-data.cornell", "f1")).unwrap();
        assert_eq!(value["mimeType"], "application/json");
        assert_eq!(value["parents"][0], "f1");

        let folder = serde_json::to_value(FileMetadata::folder("Cornell Notes")).unwrap();
        assert!(folder.get("parents").is_none());
    }

    #[test]
    fn test_file_list_tolerates_missing_files() {
        let list: FileList = serde_json::from_str("{}").unwrap();
        assert!(list.files.is_empty());

        let list: FileList = serde_json::from_str(r#"{"files":[{"id":"x","name":"n"}]}"#).unwrap();
        assert_eq!(list.files[0].id, "x");
    }
}
