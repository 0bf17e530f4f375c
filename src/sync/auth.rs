//! OAuth token lifecycle: the cached token, and the interactive consent flow
//! that obtains a new one.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::oneshot;

use super::config::DRIVE_SCOPE;
use crate::storage::kv_store::TOKEN_KEY;
use crate::storage::KvStore;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// How long to wait for the browser redirect
const CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Consent was not granted: {0}")]
    ConsentDenied(String),
    #[error("OAuth state mismatch")]
    StateMismatch,
    #[error("Timed out waiting for consent")]
    Timeout,
    #[error("Token exchange failed: {status} - {message}")]
    TokenExchange { status: u16, message: String },
}

/// Bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// Token endpoint response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Cached token with its absolute expiry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredToken {
    #[serde(flatten)]
    pub response: TokenResponse,
    /// Expiry as epoch milliseconds
    pub expires_at: i64,
}

impl StoredToken {
    pub fn from_response(response: TokenResponse, now_ms: i64) -> Self {
        let expires_at = now_ms + (response.expires_in as i64) * 1000;
        Self {
            response,
            expires_at,
        }
    }

    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        !self.response.access_token.is_empty() && now_ms < self.expires_at
    }

    pub fn access_token(&self) -> AccessToken {
        AccessToken::new(self.response.access_token.clone())
    }
}

/// Token persisted in the local store under a fixed key
#[derive(Debug, Clone)]
pub struct TokenCache {
    store: KvStore,
}

impl TokenCache {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Return the cached token if it has not expired. An expired or
    /// unreadable entry is deleted.
    pub fn restore(&self) -> Option<StoredToken> {
        let token: StoredToken = self.store.load_opt(TOKEN_KEY)?;
        if token.is_valid_at(Utc::now().timestamp_millis()) {
            Some(token)
        } else {
            log::info!("Auth: cached token expired, discarding");
            self.clear();
            None
        }
    }

    pub fn save(&self, response: TokenResponse) -> StoredToken {
        let token = StoredToken::from_response(response, Utc::now().timestamp_millis());
        if let Err(e) = self.store.save(TOKEN_KEY, &token) {
            log::warn!("Auth: failed to cache token: {}", e);
        }
        token
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(TOKEN_KEY) {
            log::warn!("Auth: failed to remove cached token: {}", e);
        }
    }
}

/// Interactive consent that yields a fresh access token
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    async fn request_token(&self) -> Result<TokenResponse, AuthError>;
}

/// PKCE verifier and its S256 challenge
#[derive(Debug, Clone)]
struct Pkce {
    verifier: String,
    challenge: String,
}

impl Pkce {
    fn generate() -> Self {
        let verifier = random_string(64);
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Query parameters Google appends to the redirect
#[derive(Debug, Clone, Default, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

type UrlHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Installed-app consent: the user opens the authorization URL in a
/// browser, and Google redirects back to a listener on 127.0.0.1.
pub struct LoopbackConsent {
    client_id: String,
    client_secret: Option<String>,
    port: u16,
    http: reqwest::Client,
    on_url: UrlHandler,
}

impl LoopbackConsent {
    pub fn new(client_id: String, client_secret: Option<String>, port: u16) -> Self {
        Self {
            client_id,
            client_secret,
            port,
            http: reqwest::Client::new(),
            on_url: Arc::new(|url| log::info!("Auth: open this URL to grant access: {}", url)),
        }
    }

    /// Called with the authorization URL once the listener is ready
    pub fn with_url_handler(mut self, handler: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_url = Arc::new(handler);
        self
    }

    fn authorization_url(&self, redirect_uri: &str, state: &str, challenge: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&code_challenge={}&code_challenge_method=S256&state={}&prompt=consent",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(DRIVE_SCOPE),
            challenge,
            state,
        )
    }

    async fn wait_for_redirect(
        &self,
        listener: tokio::net::TcpListener,
    ) -> Result<CallbackParams, AuthError> {
        let (tx, rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let sender: CallbackSender = Arc::new(Mutex::new(Some(tx)));

        let app = Router::new()
            .route("/", get(handle_redirect))
            .with_state(sender);

        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let result = tokio::time::timeout(CONSENT_TIMEOUT, rx).await;
        let _ = shutdown_tx.send(());
        let _ = server.await;

        match result {
            Ok(Ok(params)) => Ok(params),
            Ok(Err(_)) => Err(AuthError::ConsentDenied("redirect listener closed".to_string())),
            Err(_) => Err(AuthError::Timeout),
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        verifier: &str,
    ) -> Result<TokenResponse, AuthError> {
        let mut form = vec![
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
            ("code_verifier", verifier),
        ];
        if let Some(ref secret) = self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self.http.post(TOKEN_URL).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::TokenExchange {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

async fn handle_redirect(
    State(sender): State<CallbackSender>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let tx = sender.lock().ok().and_then(|mut slot| slot.take());
    if let Some(tx) = tx {
        let _ = tx.send(params);
    }
    Html("<html><body>Cornell Notes: you can close this window.</body></html>")
}

#[async_trait]
impl ConsentFlow for LoopbackConsent {
    async fn request_token(&self) -> Result<TokenResponse, AuthError> {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", self.port)).await?;
        let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());

        let pkce = Pkce::generate();
        let state = random_string(32);
        (self.on_url)(&self.authorization_url(&redirect_uri, &state, &pkce.challenge));

        let params = self.wait_for_redirect(listener).await?;
        if let Some(error) = params.error {
            return Err(AuthError::ConsentDenied(error));
        }
        if params.state.as_deref() != Some(state.as_str()) {
            return Err(AuthError::StateMismatch);
        }
        let code = params
            .code
            .ok_or_else(|| AuthError::ConsentDenied("no authorization code".to_string()))?;

        self.exchange_code(&code, &redirect_uri, &pkce.verifier).await
    }
}
