use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};

use super::{DriveApi, DriveError, DriveFile, FileList, FileMetadata, JSON_MIME_TYPE};
use crate::sync::auth::AccessToken;

const API_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const REVOKE_URL: &str = "https://oauth2.googleapis.com/revoke";

/// Google Drive v3 client for sync operations
pub struct DriveClient {
    client: Client,
    api_base: String,
    upload_base: String,
    revoke_url: String,
}

impl DriveClient {
    /// Create a new Drive client against the public endpoints
    pub fn new() -> Result<Self, DriveError> {
        Self::with_endpoints(API_BASE, UPLOAD_BASE, REVOKE_URL)
    }

    /// Create a client against custom endpoints (e.g. a local emulator)
    pub fn with_endpoints(api_base: &str, upload_base: &str, revoke_url: &str) -> Result<Self, DriveError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
            revoke_url: revoke_url.to_string(),
        })
    }

    fn files_url(&self) -> String {
        format!("{}/files", self.api_base)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.api_base, urlencoding::encode(file_id))
    }

    fn upload_url(&self, file_id: &str) -> String {
        format!(
            "{}/files/{}?uploadType=media",
            self.upload_base,
            urlencoding::encode(file_id)
        )
    }
}

/// Map error statuses onto [`DriveError`], passing successful responses through
async fn check_status(response: Response, resource: &str) -> Result<Response, DriveError> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DriveError::AuthFailed),
        StatusCode::NOT_FOUND => Err(DriveError::NotFound(resource.to_string())),
        status if !status.is_success() => Err(DriveError::Server {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        }),
        _ => Ok(response),
    }
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn find_files(&self, token: &AccessToken, query: &str) -> Result<Vec<DriveFile>, DriveError> {
        let response = self
            .client
            .get(self.files_url())
            .bearer_auth(token.secret())
            .query(&[("q", query), ("fields", "files(id, name)"), ("spaces", "drive")])
            .send()
            .await?;

        let response = check_status(response, "files").await?;
        let body = response.text().await?;
        let list: FileList = serde_json::from_str(&body)?;
        Ok(list.files)
    }

    async fn create_file(&self, token: &AccessToken, metadata: &FileMetadata) -> Result<DriveFile, DriveError> {
        let response = self
            .client
            .post(self.files_url())
            .bearer_auth(token.secret())
            .query(&[("fields", "id")])
            .json(metadata)
            .send()
            .await?;

        let response = check_status(response, &metadata.name).await?;
        let body = response.text().await?;
        let created: DriveFile = serde_json::from_str(&body)?;
        log::info!("Drive: created '{}' ({})", metadata.name, created.id);
        Ok(created)
    }

    async fn download(&self, token: &AccessToken, file_id: &str) -> Result<String, DriveError> {
        let response = self
            .client
            .get(self.file_url(file_id))
            .bearer_auth(token.secret())
            .query(&[("alt", "media")])
            .send()
            .await?;

        let response = check_status(response, file_id).await?;
        Ok(response.text().await?)
    }

    async fn upload(&self, token: &AccessToken, file_id: &str, body: String) -> Result<(), DriveError> {
        let size = body.len();
        let response = self
            .client
            .patch(self.upload_url(file_id))
            .bearer_auth(token.secret())
            .header(reqwest::header::CONTENT_TYPE, JSON_MIME_TYPE)
            .body(body)
            .send()
            .await?;

        check_status(response, file_id).await?;
        log::debug!("Drive: uploaded {} bytes to {}", size, file_id);
        Ok(())
    }

    async fn revoke(&self, token: &AccessToken) -> Result<(), DriveError> {
        let response = self
            .client
            .post(&self.revoke_url)
            .query(&[("token", token.secret())])
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await?;

        match response.status() {
            // Revoking an already-invalid token is not worth reporting
            StatusCode::BAD_REQUEST => Ok(()),
            _ => check_status(response, "token").await.map(|_| ()),
        }
    }
}
