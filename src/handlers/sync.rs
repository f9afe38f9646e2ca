use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middlewares::AuthUser;
use crate::models::{
    ImageSyncProgress, ImageSyncReport, ImageSyncResult, ProgressEnvelope, SyncDataType,
    SyncState, SyncStatusRecord,
};
use crate::queue::SyncJob;
use crate::repositories::{CardRepository, SyncStatusRepository};
use crate::state::AppState;

const ALREADY_RUNNING: &str = "Image sync already in progress";

// ============ Response DTOs ============

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncStatusListResponse {
    pub items: Vec<SyncStatusRecord>,
}

/// Sync job status response
#[derive(Debug, Serialize, ToSchema)]
pub struct SyncJobResponse {
    pub job_id: Uuid,
    pub data_type: SyncDataType,
    pub status: String,
    pub retry_count: u32,
    pub max_retries: u32,
    #[schema(value_type = String)]
    pub created_at: time::OffsetDateTime,
    #[schema(value_type = Option<String>)]
    pub started_at: Option<time::OffsetDateTime>,
    #[schema(value_type = Option<String>)]
    pub completed_at: Option<time::OffsetDateTime>,
    pub error_message: Option<String>,
    pub processed: Option<u64>,
    pub failed: Option<u64>,
    pub skipped: Option<u64>,
}

impl From<SyncJob> for SyncJobResponse {
    fn from(job: SyncJob) -> Self {
        let report: Option<ImageSyncReport> = job.report;
        Self {
            job_id: job.id,
            data_type: job.data_type,
            status: job.status.as_str().to_string(),
            retry_count: job.retry_count,
            max_retries: job.max_retries,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error_message: job.error_message,
            processed: report.map(|r| r.processed),
            failed: report.map(|r| r.failed),
            skipped: report.map(|r| r.skipped),
        }
    }
}

// ============ Handlers ============

/// Start a background image download run (admin only).
///
/// At most one run is active at a time; a second trigger while one is in
/// progress answers `success: false` and queues nothing.
#[utoipa::path(
    post,
    path = "/api/sync/images",
    responses(
        (status = 200, description = "Run queued, or the reason it was not", body = ImageSyncResult),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Sync"
)]
pub async fn start_image_sync(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ImageSyncResult>> {
    user.require_admin()?;

    let stale_after = Duration::from_secs(state.config.sync_stale_after_seconds);
    let started = match SyncStatusRepository::try_begin(
        &state.pg_pool,
        SyncDataType::Images,
        stale_after,
    )
    .await
    {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start image sync");
            return Ok(Json(ImageSyncResult::failure(e.to_string())));
        }
    };

    if !started {
        tracing::info!(user_id = %user.id, "Image sync trigger ignored, run already active");
        return Ok(Json(ImageSyncResult::failure(ALREADY_RUNNING)));
    }

    let job = SyncJob::new(SyncDataType::Images, user.id);
    match state.job_queue.enqueue(job).await {
        Ok(job_id) => {
            tracing::info!(job_id = %job_id, user_id = %user.id, "Image sync queued");
            Ok(Json(ImageSyncResult::queued(job_id)))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to enqueue image sync");
            // Release the in_progress marker so the next trigger can run
            let message = format!("Failed to queue image sync: {}", e);
            SyncStatusRepository::upsert_status(
                &state.db,
                SyncDataType::Images,
                SyncState::Failed,
                0,
                Some(&message),
            )
            .await?;
            Ok(Json(ImageSyncResult::failure(message)))
        }
    }
}

/// Image download progress
#[utoipa::path(
    get,
    path = "/api/sync/images/progress",
    responses(
        (status = 200, description = "Progress, or the error that prevented reading it", body = ProgressEnvelope),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Sync"
)]
pub async fn image_sync_progress(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Json<ProgressEnvelope> {
    match load_progress(&state).await {
        Ok(progress) => Json(ProgressEnvelope {
            success: true,
            progress: Some(progress),
            error: None,
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read image sync progress");
            Json(ProgressEnvelope {
                success: false,
                progress: None,
                error: Some(e.to_string()),
            })
        }
    }
}

async fn load_progress(state: &AppState) -> AppResult<ImageSyncProgress> {
    let total_needing_images = CardRepository::count_needing_images(&state.db).await?;
    let total_with_images = CardRepository::count_with_images(&state.db).await?;
    let record = SyncStatusRepository::find(&state.db, SyncDataType::Images).await?;

    let (status, last_sync, records_processed) = match record {
        Some(record) => (
            record.status,
            record.last_sync,
            record.records_processed.max(0) as u64,
        ),
        None => (SyncState::NotStarted, None, 0),
    };

    Ok(ImageSyncProgress {
        total_needing_images,
        total_with_images,
        status,
        last_sync,
        records_processed,
        completion_percentage: ImageSyncProgress::percentage(
            total_with_images,
            total_needing_images,
        ),
    })
}

/// Status of every data set that has been synced
#[utoipa::path(
    get,
    path = "/api/sync/status",
    responses(
        (status = 200, description = "Sync status rows", body = SyncStatusListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Sync"
)]
pub async fn list_sync_status(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<SyncStatusListResponse>> {
    let items = SyncStatusRepository::list(&state.db).await?;
    Ok(Json(SyncStatusListResponse { items }))
}

/// Get a queued sync job (admin only)
#[utoipa::path(
    get,
    path = "/api/sync/jobs/{job_id}",
    params(
        ("job_id" = Uuid, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Job status", body = SyncJobResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Job not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Sync"
)]
pub async fn get_sync_job(
    user: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<SyncJobResponse>> {
    user.require_admin()?;

    let job = state
        .job_queue
        .get_job(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job".to_string()))?;

    Ok(Json(job.into()))
}
