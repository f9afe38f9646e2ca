use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::header::ACCEPT;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{Card, ImageSyncReport, SyncDataType, SyncState};
use crate::repositories::{CardRepository, SyncStatusRepository};

const ACCEPT_IMAGES: &str = "image/jpeg,image/png,image/webp,image/*";
const MAX_SAFE_NAME_LEN: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {0} when downloading image")]
    Status(u16),

    #[error("Image request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Request(err.to_string())
    }
}

/// Source of image bytes, by URL
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed fetcher with bounded retries
pub struct HttpImageFetcher {
    client: reqwest::Client,
    retries: u32,
    retry_delay: Duration,
}

impl HttpImageFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            retries: 2,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(
            &config.image_user_agent,
            Duration::from_secs(config.image_fetch_timeout_seconds),
        )
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, ACCEPT_IMAGES)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if attempt < self.retries => {
                    let delay = self.retry_delay * 2u32.pow(attempt);
                    tracing::debug!(url, attempt, error = %e, "Image download failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardOutcome {
    Downloaded,
    Skipped,
    Failed,
}

/// Downloads missing card images into the image directory
pub struct ImageSyncService {
    db: DatabaseConnection,
    fetcher: Arc<dyn ImageFetcher>,
    image_dir: PathBuf,
    batch_size: u64,
    concurrency: usize,
}

impl ImageSyncService {
    pub fn new(
        db: DatabaseConnection,
        fetcher: Arc<dyn ImageFetcher>,
        image_dir: PathBuf,
        batch_size: u64,
        concurrency: usize,
    ) -> Self {
        Self {
            db,
            fetcher,
            image_dir,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(
        db: DatabaseConnection,
        fetcher: Arc<dyn ImageFetcher>,
        config: &Config,
    ) -> Self {
        Self::new(
            db,
            fetcher,
            config.image_dir.clone(),
            config.image_sync_batch_size,
            config.image_sync_concurrency,
        )
    }

    /// Walk every card that has image URLs but no local file, in id order,
    /// and record the outcome in the `images` sync status row.
    pub async fn run(&self) -> AppResult<ImageSyncReport> {
        tokio::fs::create_dir_all(&self.image_dir)
            .await
            .map_err(|e| AppError::Internal(format!("Cannot create image directory: {}", e)))?;

        SyncStatusRepository::upsert_status(&self.db, SyncDataType::Images, SyncState::InProgress, 0, None)
            .await?;

        let mut report = ImageSyncReport::default();
        let mut after: Option<Uuid> = None;

        loop {
            let batch =
                CardRepository::list_needing_images(&self.db, after, self.batch_size).await?;
            let Some(last) = batch.last() else {
                break;
            };
            after = Some(last.id);

            let outcomes: Vec<CardOutcome> = stream::iter(batch.iter())
                .map(|card| self.sync_card(card))
                .boxed()
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

            for outcome in outcomes {
                match outcome {
                    CardOutcome::Downloaded => report.processed += 1,
                    CardOutcome::Skipped => report.skipped += 1,
                    CardOutcome::Failed => report.failed += 1,
                }
            }

            SyncStatusRepository::upsert_status(
                &self.db,
                SyncDataType::Images,
                SyncState::InProgress,
                report.processed,
                None,
            )
            .await?;

            tracing::info!(
                processed = report.processed,
                failed = report.failed,
                skipped = report.skipped,
                "Image sync batch done"
            );
        }

        let error_message = (report.failed > 0).then(|| {
            format!(
                "{} of {} image downloads failed",
                report.failed,
                report.processed + report.failed
            )
        });
        SyncStatusRepository::upsert_status(
            &self.db,
            SyncDataType::Images,
            report.final_state(),
            report.processed,
            error_message.as_deref(),
        )
        .await?;

        Ok(report)
    }

    async fn sync_card(&self, card: &Card) -> CardOutcome {
        let Some(url) = card.download_uri() else {
            return CardOutcome::Skipped;
        };

        let bytes = match self.fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(card_id = %card.id, url, error = %e, "Failed to download card image");
                return CardOutcome::Failed;
            }
        };

        let file_name = image_file_name(&card.name, card.id, url);
        if let Err(e) = tokio::fs::write(self.image_dir.join(&file_name), &bytes).await {
            tracing::warn!(card_id = %card.id, error = %e, "Failed to write card image");
            return CardOutcome::Failed;
        }

        if let Err(e) = CardRepository::set_image_file(&self.db, card.id, &file_name).await {
            tracing::warn!(card_id = %card.id, error = %e, "Failed to record card image");
            return CardOutcome::Failed;
        }

        CardOutcome::Downloaded
    }
}

/// `<safe name>_<first 8 of id>.<ext>`
pub fn image_file_name(card_name: &str, card_id: Uuid, url: &str) -> String {
    let name = if card_name.is_empty() { "unknown" } else { card_name };
    let safe_name: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(MAX_SAFE_NAME_LEN)
        .collect();
    let id_prefix: String = card_id.to_string().chars().take(8).collect();

    format!("{}_{}.{}", safe_name, id_prefix, image_extension(url))
}

fn image_extension(url: &str) -> &'static str {
    if url.contains(".png") {
        "png"
    } else if url.contains(".webp") {
        "webp"
    } else {
        "jpg"
    }
}
