use async_trait::async_trait;
use redis::aio::ConnectionManager as RedisConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::ImageSyncReport;
use crate::queue::{JobQueue, JobStatus, SyncJob};

/// Redis keys structure:
/// - spell_binder:jobs:queue  - List for pending jobs (FIFO)
/// - spell_binder:jobs:{id}   - String for job data (JSON)
const QUEUE_KEY: &str = "spell_binder:jobs:queue";
const JOB_PREFIX: &str = "spell_binder:jobs:";

/// Finished jobs are kept for a week
const JOB_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

fn redis_err(e: redis::RedisError) -> AppError {
    AppError::Queue(format!("Redis error: {}", e))
}

/// Redis-backed job queue implementation
#[derive(Clone)]
pub struct RedisQueue {
    conn: RedisConnectionManager,
}

impl RedisQueue {
    pub fn new(conn: RedisConnectionManager) -> Self {
        Self { conn }
    }

    fn job_key(id: Uuid) -> String {
        format!("{}{}", JOB_PREFIX, id)
    }

    async fn save_job(&self, job: &SyncJob) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let job_json = serde_json::to_string(job)
            .map_err(|e| AppError::Internal(format!("Serialization error: {}", e)))?;

        if job.status.is_terminal() {
            let _: () = conn
                .set_ex(Self::job_key(job.id), &job_json, JOB_TTL_SECONDS)
                .await
                .map_err(redis_err)?;
        } else {
            let _: () = conn
                .set(Self::job_key(job.id), &job_json)
                .await
                .map_err(redis_err)?;
        }

        Ok(())
    }

    async fn load_job(&self, job_id: Uuid) -> AppResult<SyncJob> {
        self.get_job(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Job".to_string()))
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, job: SyncJob) -> AppResult<Uuid> {
        let mut conn = self.conn.clone();
        let job_id = job.id;

        self.save_job(&job).await?;

        let _: () = conn
            .rpush(QUEUE_KEY, job_id.to_string())
            .await
            .map_err(redis_err)?;

        tracing::info!(job_id = %job_id, data_type = job.data_type.as_str(), "Job enqueued");

        Ok(job_id)
    }

    async fn dequeue(&self, timeout_seconds: u64) -> AppResult<Option<SyncJob>> {
        let mut conn = self.conn.clone();

        // Blocking pop from queue
        let result: Option<(String, String)> = conn
            .blpop(QUEUE_KEY, timeout_seconds as f64)
            .await
            .map_err(redis_err)?;

        if let Some((_, job_id_str)) = result {
            let job_id = Uuid::parse_str(&job_id_str)
                .map_err(|e| AppError::Queue(format!("Invalid job id in queue: {}", e)))?;

            if let Some(mut job) = self.get_job(job_id).await? {
                job.status = JobStatus::Running;
                job.started_at = Some(time::OffsetDateTime::now_utc());
                self.save_job(&job).await?;

                tracing::info!(job_id = %job_id, "Job dequeued and started");
                return Ok(Some(job));
            }

            tracing::warn!(job_id = %job_id, "Queued job has no stored data, dropping it");
        }

        Ok(None)
    }

    async fn get_job(&self, job_id: Uuid) -> AppResult<Option<SyncJob>> {
        let mut conn = self.conn.clone();

        let job_json: Option<String> = conn.get(Self::job_key(job_id)).await.map_err(redis_err)?;

        job_json
            .map(|json| {
                serde_json::from_str(&json)
                    .map_err(|e| AppError::Internal(format!("Deserialization error: {}", e)))
            })
            .transpose()
    }

    async fn update_status(&self, job_id: Uuid, status: JobStatus) -> AppResult<()> {
        let mut job = self.load_job(job_id).await?;

        job.status = status;
        if status.is_terminal() {
            job.completed_at = Some(time::OffsetDateTime::now_utc());
        }

        self.save_job(&job).await?;

        tracing::debug!(job_id = %job_id, status = status.as_str(), "Job status updated");

        Ok(())
    }

    async fn complete_job(&self, job_id: Uuid, report: ImageSyncReport) -> AppResult<()> {
        let mut job = self.load_job(job_id).await?;

        job.status = JobStatus::Completed;
        job.completed_at = Some(time::OffsetDateTime::now_utc());
        job.report = Some(report);

        self.save_job(&job).await?;

        tracing::info!(
            job_id = %job_id,
            processed = report.processed,
            failed = report.failed,
            skipped = report.skipped,
            "Job completed"
        );

        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, error: String, retryable: bool) -> AppResult<()> {
        let mut job = self.load_job(job_id).await?;

        job.error_message = Some(error.clone());

        let new_status = if retryable && job.retry_count < job.max_retries {
            job.retry_count += 1;
            JobStatus::Failed
        } else {
            job.completed_at = Some(time::OffsetDateTime::now_utc());
            JobStatus::Dead
        };

        job.status = new_status;
        self.save_job(&job).await?;

        tracing::warn!(
            job_id = %job_id,
            status = new_status.as_str(),
            retry_count = job.retry_count,
            error = %error,
            "Job failed"
        );

        Ok(())
    }

    async fn requeue(&self, job_id: Uuid) -> AppResult<()> {
        let mut job = self.load_job(job_id).await?;

        if job.status != JobStatus::Failed {
            return Err(AppError::Validation(
                "Only failed jobs can be requeued".to_string(),
            ));
        }

        job.status = JobStatus::Pending;
        job.started_at = None;
        self.save_job(&job).await?;

        let mut conn = self.conn.clone();
        let _: () = conn
            .rpush(QUEUE_KEY, job_id.to_string())
            .await
            .map_err(redis_err)?;

        tracing::info!(job_id = %job_id, retry_count = job.retry_count, "Job requeued");

        Ok(())
    }

    async fn queue_length(&self) -> AppResult<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen(QUEUE_KEY).await.map_err(redis_err)?;
        Ok(len)
    }
}
