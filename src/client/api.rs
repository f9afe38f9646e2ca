use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::models::{ImageSyncProgress, ImageSyncResult, ProgressEnvelope};

const PROGRESS_PATH: &str = "/api/sync/images/progress";
const TRIGGER_PATH: &str = "/api/sync/images";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// Transport or decoding failure
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The server answered with `success: false`
    #[error("{0}")]
    Job(String),

    #[error("Polling stopped: {0}")]
    PollTimeout(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

/// Operations the poller needs from the server
#[async_trait]
pub trait SyncApi: Send + Sync {
    /// Current image sync progress. A `success: false` envelope is an error.
    async fn fetch_progress(&self) -> Result<ImageSyncProgress, ClientError>;

    /// Ask the server to start a run. A `success: false` answer is returned
    /// as-is so the caller can read its `error`.
    async fn start_sync(&self) -> Result<ImageSyncResult, ClientError>;
}

/// reqwest implementation talking to a running server
#[derive(Clone)]
pub struct HttpSyncApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSyncApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

/// Pull the `error`/`details` fields out of an error body when it is JSON
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };

    match (value["error"].as_str(), value["details"].as_str()) {
        (Some(error), Some(details)) => format!("{}: {}", error, details),
        (Some(error), None) => error.to_string(),
        _ => body.to_string(),
    }
}

#[async_trait]
impl SyncApi for HttpSyncApi {
    async fn fetch_progress(&self) -> Result<ImageSyncProgress, ClientError> {
        let response = self
            .authorize(self.client.get(self.url(PROGRESS_PATH)))
            .send()
            .await?;

        let envelope: ProgressEnvelope = Self::read_json(response).await?;
        match envelope {
            ProgressEnvelope {
                success: true,
                progress: Some(progress),
                ..
            } => Ok(progress),
            ProgressEnvelope { error, .. } => Err(ClientError::Job(
                error.unwrap_or_else(|| "Failed to fetch sync status".to_string()),
            )),
        }
    }

    async fn start_sync(&self) -> Result<ImageSyncResult, ClientError> {
        let response = self
            .authorize(self.client.post(self.url(TRIGGER_PATH)))
            .send()
            .await?;

        Self::read_json(response).await
    }
}
