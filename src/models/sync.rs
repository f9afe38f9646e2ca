use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of data a sync job refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncDataType {
    Cards,
    Sets,
    Prices,
    Images,
}

impl SyncDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cards => "cards",
            Self::Sets => "sets",
            Self::Prices => "prices",
            Self::Images => "images",
        }
    }
}

impl FromStr for SyncDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cards" => Ok(Self::Cards),
            "sets" => Ok(Self::Sets),
            "prices" => Ok(Self::Prices),
            "images" => Ok(Self::Images),
            other => Err(format!("unknown sync data type '{}'", other)),
        }
    }
}

/// Lifecycle of a sync run as seen by clients.
///
/// `NotStarted` is never stored; it stands for "no status row yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    NotStarted,
    InProgress,
    Success,
    Failed,
    Partial,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Partial => "partial",
        }
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl FromStr for SyncState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "partial" => Ok(Self::Partial),
            other => Err(format!("unknown sync state '{}'", other)),
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored status row, one per data type
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncStatusRecord {
    pub id: Uuid,
    pub data_type: SyncDataType,
    pub status: SyncState,
    #[serde(with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>)]
    pub last_sync: Option<OffsetDateTime>,
    pub records_processed: i32,
    pub error_message: Option<String>,
}

/// Progress of the image download job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImageSyncProgress {
    pub total_needing_images: u64,
    pub total_with_images: u64,
    pub status: SyncState,
    #[serde(default, with = "time::serde::rfc3339::option")]
    #[schema(value_type = Option<String>)]
    pub last_sync: Option<OffsetDateTime>,
    pub records_processed: u64,
    pub completion_percentage: f64,
}

impl ImageSyncProgress {
    /// Share of image-bearing cards that already have a local file, in percent
    /// rounded to two decimals. Zero when there are no such cards.
    pub fn percentage(with_images: u64, needing_images: u64) -> f64 {
        let total = with_images + needing_images;
        if total == 0 {
            return 0.0;
        }
        let raw = with_images as f64 / total as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    }
}

/// `GET /api/sync/images/progress` body
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgressEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ImageSyncProgress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /api/sync/images` body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ImageSyncResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Queue id of the background run, when one was started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
}

impl ImageSyncResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn queued(job_id: Uuid) -> Self {
        Self {
            success: true,
            message: Some(format!("Image sync queued as job {}", job_id)),
            job_id: Some(job_id),
            ..Default::default()
        }
    }
}

/// Counters produced by one image sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSyncReport {
    pub processed: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl ImageSyncReport {
    /// Status recorded when the run finishes
    pub fn final_state(&self) -> SyncState {
        match (self.processed, self.failed) {
            (_, 0) => SyncState::Success,
            (0, _) => SyncState::Failed,
            _ => SyncState::Partial,
        }
    }
}
