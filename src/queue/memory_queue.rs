use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::ImageSyncReport;
use crate::queue::{JobQueue, JobStatus, SyncJob};

/// In-memory queue for tests and single-process setups
#[derive(Clone)]
pub struct InMemoryQueue {
    inner: Arc<Mutex<InMemoryQueueInner>>,
    notify: Arc<Notify>,
}

struct InMemoryQueueInner {
    queue: VecDeque<Uuid>,
    jobs: HashMap<Uuid, SyncJob>,
}

impl InMemoryQueueInner {
    fn job_mut(&mut self, job_id: Uuid) -> AppResult<&mut SyncJob> {
        self.jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::NotFound("Job".to_string()))
    }

    fn pop_next(&mut self) -> Option<SyncJob> {
        let job_id = self.queue.pop_front()?;
        let job = self.jobs.get_mut(&job_id)?;
        job.status = JobStatus::Running;
        job.started_at = Some(time::OffsetDateTime::now_utc());
        Some(job.clone())
    }
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(InMemoryQueueInner {
                queue: VecDeque::new(),
                jobs: HashMap::new(),
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Every job ever enqueued, oldest first
    pub async fn jobs(&self) -> Vec<SyncJob> {
        let inner = self.inner.lock().await;
        let mut jobs: Vec<SyncJob> = inner.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        jobs
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, job: SyncJob) -> AppResult<Uuid> {
        let job_id = job.id;
        let mut inner = self.inner.lock().await;
        inner.jobs.insert(job_id, job);
        inner.queue.push_back(job_id);
        drop(inner);
        self.notify.notify_one();
        Ok(job_id)
    }

    async fn dequeue(&self, timeout_seconds: u64) -> AppResult<Option<SyncJob>> {
        let timeout = std::time::Duration::from_secs(timeout_seconds);

        if let Some(job) = self.inner.lock().await.pop_next() {
            return Ok(Some(job));
        }

        tokio::select! {
            _ = tokio::time::sleep(timeout) => Ok(None),
            _ = self.notify.notified() => Ok(self.inner.lock().await.pop_next()),
        }
    }

    async fn get_job(&self, job_id: Uuid) -> AppResult<Option<SyncJob>> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(&job_id).cloned())
    }

    async fn update_status(&self, job_id: Uuid, status: JobStatus) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let job = inner.job_mut(job_id)?;
        job.status = status;
        if status.is_terminal() {
            job.completed_at = Some(time::OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn complete_job(&self, job_id: Uuid, report: ImageSyncReport) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let job = inner.job_mut(job_id)?;
        job.status = JobStatus::Completed;
        job.completed_at = Some(time::OffsetDateTime::now_utc());
        job.report = Some(report);
        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, error: String, retryable: bool) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let job = inner.job_mut(job_id)?;

        job.error_message = Some(error);

        if retryable && job.retry_count < job.max_retries {
            job.retry_count += 1;
            job.status = JobStatus::Failed;
        } else {
            job.status = JobStatus::Dead;
            job.completed_at = Some(time::OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn requeue(&self, job_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let job = inner.job_mut(job_id)?;

        if job.status != JobStatus::Failed {
            return Err(AppError::Validation(
                "Only failed jobs can be requeued".to_string(),
            ));
        }

        job.status = JobStatus::Pending;
        job.started_at = None;
        inner.queue.push_back(job_id);
        drop(inner);
        self.notify.notify_one();
        Ok(())
    }

    async fn queue_length(&self) -> AppResult<u64> {
        let inner = self.inner.lock().await;
        Ok(inner.queue.len() as u64)
    }
}
