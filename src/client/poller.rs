use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::api::{ClientError, SyncApi};
use crate::models::{ImageSyncProgress, ImageSyncResult};

/// What the controller currently knows about the image sync
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSnapshot {
    /// Last progress fetched successfully; kept across failed fetches
    pub status: Option<ImageSyncProgress>,
    /// A trigger request is outstanding
    pub is_loading: bool,
    /// Message from the most recent failure, cleared on the next success
    pub error: Option<String>,
}

impl SyncSnapshot {
    pub fn is_in_progress(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|status| status.status.is_in_progress())
    }
}

/// Polling cadence while a sync runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_backoff: Duration,
    /// Give up after this many fetch failures in a row
    pub max_consecutive_failures: u32,
    /// Give up after this many polls in one run
    pub max_polls: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            max_consecutive_failures: 5,
            max_polls: 1800,
        }
    }
}

impl PollPolicy {
    /// Delay before the next poll: the base interval, doubled per failure
    /// in a row and capped at `max_backoff`.
    pub fn delay_after(&self, consecutive_failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(consecutive_failures);
        self.interval
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// No request was sent
    Skipped(String),
    Started(ImageSyncResult),
    Failed(String),
}

/// Background poll task. Polling stops when this is dropped.
pub struct PollHandle {
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(self) {}

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Clears `is_loading` however the trigger future ends, cancellation included
struct LoadingGuard<'a>(&'a watch::Sender<SyncSnapshot>);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_if_modified(|snapshot| {
            let was_loading = snapshot.is_loading;
            snapshot.is_loading = false;
            was_loading
        });
    }
}

/// Triggers image syncs and tracks their progress.
///
/// State lives in a watch channel so any number of observers can follow
/// it. Cloning shares that state.
pub struct ImageSyncController<A> {
    api: Arc<A>,
    state: Arc<watch::Sender<SyncSnapshot>>,
    policy: PollPolicy,
}

impl<A> Clone for ImageSyncController<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            state: Arc::clone(&self.state),
            policy: self.policy,
        }
    }
}

impl<A: SyncApi + 'static> ImageSyncController<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self::with_policy(api, PollPolicy::default())
    }

    pub fn with_policy(api: Arc<A>, policy: PollPolicy) -> Self {
        let (state, _) = watch::channel(SyncSnapshot::default());
        Self {
            api,
            state: Arc::new(state),
            policy,
        }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.state.subscribe()
    }

    /// Fetch progress once. On failure the previous status is kept and
    /// only `error` changes.
    pub async fn refresh_status(&self) -> Result<ImageSyncProgress, ClientError> {
        match self.api.fetch_progress().await {
            Ok(progress) => {
                self.state.send_if_modified(|snapshot| {
                    let changed =
                        snapshot.status.as_ref() != Some(&progress) || snapshot.error.is_some();
                    snapshot.status = Some(progress.clone());
                    snapshot.error = None;
                    changed
                });
                Ok(progress)
            }
            Err(err) => {
                tracing::debug!(error = %err, "Failed to fetch image sync progress");
                self.set_error(err.to_string());
                Err(err)
            }
        }
    }

    /// Start a sync unless one is running or a trigger is already
    /// outstanding. On success the status is refreshed before returning.
    pub async fn trigger_sync(&self) -> TriggerOutcome {
        let mut skip_reason = None;
        let claimed = self.state.send_if_modified(|snapshot| {
            if snapshot.is_loading {
                skip_reason = Some("A sync request is already pending");
                return false;
            }
            if snapshot.is_in_progress() {
                skip_reason = Some("Image sync already in progress");
                return false;
            }
            snapshot.is_loading = true;
            snapshot.error = None;
            true
        });

        if !claimed {
            let reason = skip_reason.unwrap_or("Image sync already in progress");
            return TriggerOutcome::Skipped(reason.to_string());
        }

        let _loading = LoadingGuard(&self.state);

        match self.api.start_sync().await {
            Ok(result) if result.success => {
                // A failed refresh is already recorded on the snapshot
                let _ = self.refresh_status().await;
                TriggerOutcome::Started(result)
            }
            Ok(result) => {
                let message = result
                    .error
                    .unwrap_or_else(|| "Image sync failed".to_string());
                self.set_error(message.clone());
                TriggerOutcome::Failed(message)
            }
            Err(err) => {
                let message = err.to_string();
                self.set_error(message.clone());
                TriggerOutcome::Failed(message)
            }
        }
    }

    /// Poll until the status leaves `in_progress`.
    ///
    /// Returns immediately when no run is in progress. Fetch failures back
    /// off exponentially; too many in a row, or too many polls overall,
    /// end with `PollTimeout`.
    pub async fn poll_until_settled(&self) -> Result<Option<ImageSyncProgress>, ClientError> {
        let mut consecutive_failures = 0u32;
        let mut polls = 0u32;

        loop {
            let snapshot = self.snapshot();
            if !snapshot.is_in_progress() {
                return Ok(snapshot.status);
            }

            if polls >= self.policy.max_polls {
                return Err(self.give_up(format!(
                    "sync still in progress after {} polls",
                    polls
                )));
            }

            tokio::time::sleep(self.policy.delay_after(consecutive_failures)).await;
            polls += 1;

            match self.refresh_status().await {
                Ok(_) => consecutive_failures = 0,
                Err(err) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= self.policy.max_consecutive_failures {
                        return Err(self.give_up(format!(
                            "{} consecutive failures, last: {}",
                            consecutive_failures, err
                        )));
                    }
                }
            }
        }
    }

    /// Fetch the status now, then keep polling whenever it is
    /// `in_progress`. Runs until the returned handle is dropped.
    pub fn watch(&self) -> PollHandle {
        let controller = self.clone();
        let task = tokio::spawn(async move {
            let mut changes = controller.subscribe();
            let _ = controller.refresh_status().await;

            loop {
                // Reading and acknowledging in one step leaves no gap for a missed flip
                let in_progress = changes.borrow_and_update().is_in_progress();
                if in_progress {
                    if let Err(err) = controller.poll_until_settled().await {
                        tracing::warn!(error = %err, "Stopped polling image sync progress");
                    }
                }

                if changes.changed().await.is_err() {
                    break;
                }
            }
        });

        PollHandle { task }
    }

    fn set_error(&self, message: String) {
        self.state.send_if_modified(|snapshot| {
            if snapshot.error.as_deref() == Some(message.as_str()) {
                return false;
            }
            snapshot.error = Some(message);
            true
        });
    }

    fn give_up(&self, reason: String) -> ClientError {
        let err = ClientError::PollTimeout(reason);
        self.set_error(err.to_string());
        err
    }
}
