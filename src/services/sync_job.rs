use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{ImageSyncReport, SyncDataType, SyncState};
use crate::queue::{JobQueue, JobStatus, SyncJob};
use crate::repositories::SyncStatusRepository;
use crate::services::{HttpImageFetcher, ImageFetcher, ImageSyncService};
use crate::state::AppState;

/// Runs the work behind one dequeued job
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, job: &SyncJob) -> AppResult<ImageSyncReport>;
}

/// Dispatches jobs by data type. Only image downloads run in the worker.
pub struct SyncJobExecutor {
    db: DatabaseConnection,
    config: Config,
    fetcher: Arc<dyn ImageFetcher>,
}

impl SyncJobExecutor {
    pub fn new(db: DatabaseConnection, config: Config, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { db, config, fetcher }
    }

    pub fn from_state(state: &AppState) -> AppResult<Self> {
        let fetcher = HttpImageFetcher::from_config(&state.config)
            .map_err(|e| AppError::Internal(format!("Cannot build image client: {}", e)))?;

        Ok(Self::new(state.db.clone(), state.config.clone(), Arc::new(fetcher)))
    }
}

#[async_trait]
impl JobHandler for SyncJobExecutor {
    async fn execute(&self, job: &SyncJob) -> AppResult<ImageSyncReport> {
        match job.data_type {
            SyncDataType::Images => {
                ImageSyncService::from_config(self.db.clone(), self.fetcher.clone(), &self.config)
                    .run()
                    .await
            }
            other => Err(AppError::Validation(format!(
                "No worker handles '{}' sync jobs",
                other.as_str()
            ))),
        }
    }
}

/// How a processed job ended
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(ImageSyncReport),
    /// Failed but went back on the queue; the status row stays `in_progress`
    Requeued,
    /// Failed for good; the status row is `failed`
    Failed,
    /// The queue could not mark the job as running
    Skipped,
}

/// Drives one job through the queue lifecycle and the sync status row
pub struct JobProcessor {
    db: DatabaseConnection,
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
}

impl JobProcessor {
    pub fn new(
        db: DatabaseConnection,
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn JobHandler>,
    ) -> Self {
        Self { db, queue, handler }
    }

    pub async fn process(&self, job: SyncJob) -> JobOutcome {
        let job_id = job.id;
        tracing::info!(
            job_id = %job_id,
            data_type = job.data_type.as_str(),
            attempt = job.retry_count + 1,
            "Processing job"
        );

        if let Err(e) = self.queue.update_status(job_id, JobStatus::Running).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to update job status");
            return JobOutcome::Skipped;
        }

        let err = match self.handler.execute(&job).await {
            Ok(report) => {
                tracing::info!(
                    job_id = %job_id,
                    processed = report.processed,
                    failed = report.failed,
                    skipped = report.skipped,
                    "Job completed"
                );
                if let Err(e) = self.queue.complete_job(job_id, report).await {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as complete");
                }
                return JobOutcome::Completed(report);
            }
            Err(err) => err,
        };

        let retryable = is_retryable_error(&err);
        tracing::error!(job_id = %job_id, error = %err, retryable, "Job failed");

        if let Err(e) = self.queue.fail_job(job_id, err.to_string(), retryable).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to mark job as failed");
            self.mark_failed(&job, &err).await;
            return JobOutcome::Failed;
        }

        let will_retry = matches!(
            self.queue.get_job(job_id).await,
            Ok(Some(SyncJob { status: JobStatus::Failed, .. }))
        );

        if will_retry {
            match self.queue.requeue(job_id).await {
                Ok(()) => {
                    tracing::info!(job_id = %job_id, "Job requeued for retry");
                    return JobOutcome::Requeued;
                }
                Err(e) => tracing::error!(job_id = %job_id, error = %e, "Failed to requeue job"),
            }
        }

        self.mark_failed(&job, &err).await;
        JobOutcome::Failed
    }

    async fn mark_failed(&self, job: &SyncJob, error: &AppError) {
        if let Err(e) = SyncStatusRepository::upsert_status(
            &self.db,
            job.data_type,
            SyncState::Failed,
            0,
            Some(&error.to_string()),
        )
        .await
        {
            tracing::error!(job_id = %job.id, error = %e, "Failed to record sync failure");
        }
    }
}

/// Transient infrastructure failures are worth another attempt
pub fn is_retryable_error(error: &AppError) -> bool {
    match error {
        AppError::Internal(msg) | AppError::Queue(msg) => {
            let msg = msg.to_ascii_lowercase();
            msg.contains("timeout") || msg.contains("connection") || msg.contains("network")
        }
        AppError::Database(_) => true,
        AppError::Validation(_)
        | AppError::InvalidParameter(_)
        | AppError::NotFound(_)
        | AppError::Conflict(_)
        | AppError::Forbidden(_)
        | AppError::Unauthorized
        | AppError::InvalidCredentials
        | AppError::InvalidToken
        | AppError::TokenExpired => false,
    }
}
