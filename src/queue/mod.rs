pub mod job;
pub mod memory_queue;
pub mod redis_queue;

pub use job::{JobStatus, SyncJob};
pub use memory_queue::InMemoryQueue;
pub use redis_queue::RedisQueue;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::ImageSyncReport;

/// Job queue trait for abstracting queue backends
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Push a job onto the queue
    async fn enqueue(&self, job: SyncJob) -> AppResult<Uuid>;

    /// Pop the next job from the queue (blocking with timeout)
    async fn dequeue(&self, timeout_seconds: u64) -> AppResult<Option<SyncJob>>;

    /// Get job by ID
    async fn get_job(&self, job_id: Uuid) -> AppResult<Option<SyncJob>>;

    /// Update job status
    async fn update_status(&self, job_id: Uuid, status: JobStatus) -> AppResult<()>;

    /// Mark job as completed with its run counters
    async fn complete_job(&self, job_id: Uuid, report: ImageSyncReport) -> AppResult<()>;

    /// Mark job as failed with error message
    async fn fail_job(&self, job_id: Uuid, error: String, retryable: bool) -> AppResult<()>;

    /// Put a failed job back on the queue
    async fn requeue(&self, job_id: Uuid) -> AppResult<()>;

    /// Get queue length
    async fn queue_length(&self) -> AppResult<u64>;
}
