mod common;

use std::collections::HashSet;
use std::future::IntoFuture;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use spell_binder::error::{AppError, AppResult};
use spell_binder::models::{ImageSyncReport, SyncDataType, SyncState};
use spell_binder::queue::{JobQueue, JobStatus, SyncJob};
use spell_binder::repositories::{CardRepository, SyncStatusRepository};
use spell_binder::services::{
    FetchError, ImageFetcher, ImageSyncService, JobHandler, JobOutcome, JobProcessor,
    SyncJobExecutor,
};

use common::{unique_set_code, CardSpec, Factory, TestApp};

/// The images status row and the set of cards needing images are global
static SYNC_LOCK: Mutex<()> = Mutex::const_new(());

/// Clear the images status row and park leftover cards from earlier runs
async fn reset_image_sync(app: &TestApp) {
    sqlx::query("DELETE FROM sync_status WHERE data_type = 'images'")
        .execute(&app.state.pg_pool)
        .await
        .unwrap();
    sqlx::query(
        "UPDATE cards SET image_file = 'parked.jpg' WHERE image_file IS NULL AND image_uris IS NOT NULL",
    )
    .execute(&app.state.pg_pool)
    .await
    .unwrap();
}

/// Serves fixed bytes, failing for URLs that contain a marker
struct FakeFetcher {
    failing: HashSet<String>,
}

impl FakeFetcher {
    fn failing(urls: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: urls.iter().map(|url| url.to_string()).collect(),
        })
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if self.failing.contains(url) {
            return Err(FetchError::Status(404));
        }
        Ok(b"image-bytes".to_vec())
    }
}

/// Always fails, either with a transient or a permanent error
struct FailingHandler {
    transient: bool,
}

#[async_trait]
impl JobHandler for FailingHandler {
    async fn execute(&self, _job: &SyncJob) -> AppResult<ImageSyncReport> {
        if self.transient {
            Err(AppError::Database("connection refused".to_string()))
        } else {
            Err(AppError::Validation("image directory is not writable".to_string()))
        }
    }
}

fn processor(app: &TestApp, handler: Arc<dyn JobHandler>) -> JobProcessor {
    JobProcessor::new(app.state.db.clone(), app.queue.clone(), handler)
}

async fn trigger(app: &TestApp, header: String) -> Value {
    let response = app
        .server
        .post("/api/sync/images")
        .add_header("Authorization", header)
        .await;

    response.assert_status_ok();
    response.json()
}

async fn progress(app: &TestApp, header: String) -> Value {
    let response = app
        .server
        .get("/api/sync/images/progress")
        .add_header("Authorization", header)
        .await;

    response.assert_status_ok();
    response.json()
}

#[tokio::test]
async fn test_progress_without_status_row() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let auth = Factory::new(&app.state).create_user().await;

    let body = progress(&app, auth.auth_header()).await;

    assert_eq!(body["success"], json!(true));
    assert_eq!(body["progress"]["status"], json!("not_started"));
    assert_eq!(body["progress"]["total_needing_images"], json!(0));
    assert_eq!(body["progress"]["records_processed"], json!(0));
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_member_cannot_trigger_sync() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let auth = Factory::new(&app.state).create_user().await;

    let response = app
        .server
        .post("/api/sync/images")
        .add_header("Authorization", auth.auth_header())
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(app.queue.queue_length().await.unwrap(), 0);
}

#[tokio::test]
async fn test_trigger_queues_job_and_marks_in_progress() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let admin = Factory::new(&app.state).create_admin().await;

    let response = app
        .server
        .post("/api/sync/images")
        .add_header("Authorization", admin.auth_header())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    let job_id = body["job_id"].as_str().unwrap().to_string();

    assert_eq!(app.queue.queue_length().await.unwrap(), 1);
    let jobs = app.queue.jobs().await;
    assert_eq!(jobs[0].id.to_string(), job_id);
    assert_eq!(jobs[0].data_type, SyncDataType::Images);
    assert_eq!(jobs[0].requested_by, admin.user_id);

    let body = progress(&app, admin.auth_header()).await;
    assert_eq!(body["progress"]["status"], json!("in_progress"));

    let response = app
        .server
        .get(&format!("/api/sync/jobs/{}", job_id))
        .add_header("Authorization", admin.auth_header())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], json!("pending"));
    assert_eq!(body["data_type"], json!("images"));

    reset_image_sync(&app).await;
}

#[tokio::test]
async fn test_second_trigger_is_debounced() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let admin = Factory::new(&app.state).create_admin().await;

    let first = app
        .server
        .post("/api/sync/images")
        .add_header("Authorization", admin.auth_header())
        .await;
    first.assert_status_ok();

    let second = app
        .server
        .post("/api/sync/images")
        .add_header("Authorization", admin.auth_header())
        .await;

    second.assert_status_ok();
    let body: Value = second.json();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Image sync already in progress"));
    assert_eq!(app.queue.queue_length().await.unwrap(), 1);

    reset_image_sync(&app).await;
}

#[tokio::test]
async fn test_concurrent_triggers_start_one_run() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let admin = Factory::new(&app.state).create_admin().await;

    let (a, b) = tokio::join!(
        app.server
            .post("/api/sync/images")
            .add_header("Authorization", admin.auth_header())
            .into_future(),
        app.server
            .post("/api/sync/images")
            .add_header("Authorization", admin.auth_header())
            .into_future(),
    );

    let started = [a.json::<Value>(), b.json::<Value>()]
        .iter()
        .filter(|body| body["success"] == json!(true))
        .count();
    assert_eq!(started, 1);
    assert_eq!(app.queue.queue_length().await.unwrap(), 1);

    reset_image_sync(&app).await;
}

#[tokio::test]
async fn test_trigger_allowed_after_run_finishes() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let admin = Factory::new(&app.state).create_admin().await;

    SyncStatusRepository::upsert_status(&app.state.db, SyncDataType::Images, SyncState::Success, 12, None)
        .await
        .unwrap();

    let response = app
        .server
        .post("/api/sync/images")
        .add_header("Authorization", admin.auth_header())
        .await;

    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));

    reset_image_sync(&app).await;
}

#[tokio::test]
async fn test_missing_job_is_not_found() {
    let app = TestApp::new().await;
    let admin = Factory::new(&app.state).create_admin().await;

    let response = app
        .server
        .get(&format!("/api/sync/jobs/{}", uuid::Uuid::new_v4()))
        .add_header("Authorization", admin.auth_header())
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_image_sync_run_with_partial_failure() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let set = unique_set_code();

    let jpg = factory
        .create_card(CardSpec::new("Serra Angel", &set).image("https://img.test/serra.jpg"))
        .await;
    let png = factory
        .create_card(CardSpec::new("Shivan Dragon", &set).image("https://img.test/shivan.png"))
        .await;
    let broken = factory
        .create_card(CardSpec::new("Black Lotus", &set).image("https://img.test/broken.jpg"))
        .await;
    let mut art_only = CardSpec::new("Mox Pearl", &set);
    art_only.image_uris = Some(json!({ "art_crop": "https://img.test/art.jpg" }));
    let no_usable_url = factory.create_card(art_only).await;

    let service = ImageSyncService::from_config(
        app.state.db.clone(),
        FakeFetcher::failing(&["https://img.test/broken.jpg"]),
        &app.state.config,
    );
    let report = service.run().await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);

    let jpg = CardRepository::find_by_id(&app.state.db, jpg.id).await.unwrap();
    let file = jpg.image_file.unwrap();
    assert!(file.starts_with("Serra_Angel_"));
    assert!(file.ends_with(".jpg"));
    assert!(app.image_dir.path().join(&file).exists());

    let png = CardRepository::find_by_id(&app.state.db, png.id).await.unwrap();
    assert!(png.image_file.unwrap().ends_with(".png"));

    let broken = CardRepository::find_by_id(&app.state.db, broken.id).await.unwrap();
    assert!(broken.image_file.is_none());
    let skipped = CardRepository::find_by_id(&app.state.db, no_usable_url.id)
        .await
        .unwrap();
    assert!(skipped.image_file.is_none());

    let status = SyncStatusRepository::find(&app.state.db, SyncDataType::Images)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, SyncState::Partial);
    assert_eq!(status.records_processed, 2);
    assert!(status.error_message.unwrap().contains("1 of 3"));

    let body = progress(&app, auth.auth_header()).await;
    assert_eq!(body["progress"]["status"], json!("partial"));
    // The art-only card can never be downloaded and is not counted
    assert_eq!(body["progress"]["total_needing_images"], json!(1));

    reset_image_sync(&app).await;
}

#[tokio::test]
async fn test_image_sync_run_with_every_download_failing() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let factory = Factory::new(&app.state);
    let set = unique_set_code();

    factory
        .create_card(CardSpec::new("Ancestral Recall", &set).image("https://img.test/recall.jpg"))
        .await;

    let service = ImageSyncService::from_config(
        app.state.db.clone(),
        FakeFetcher::failing(&["https://img.test/recall.jpg"]),
        &app.state.config,
    );
    let report = service.run().await.unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(report.failed, 1);
    let status = SyncStatusRepository::find(&app.state.db, SyncDataType::Images)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status.status, SyncState::Failed);

    reset_image_sync(&app).await;
}

#[tokio::test]
async fn test_queued_job_completes_through_queue() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let factory = Factory::new(&app.state);
    let admin = factory.create_admin().await;
    let set = unique_set_code();
    factory
        .create_card(CardSpec::new("Time Walk", &set).image("https://img.test/walk.jpg"))
        .await;

    let response = app
        .server
        .post("/api/sync/images")
        .add_header("Authorization", admin.auth_header())
        .await;
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));

    let job = app.queue.dequeue(1).await.unwrap().unwrap();
    let executor = SyncJobExecutor::new(
        app.state.db.clone(),
        app.state.config.clone(),
        FakeFetcher::failing(&[]),
    );
    let outcome = processor(&app, Arc::new(executor)).process(job.clone()).await;
    assert!(matches!(outcome, JobOutcome::Completed(report) if report.processed == 1));

    let response = app
        .server
        .get(&format!("/api/sync/jobs/{}", job.id))
        .add_header("Authorization", admin.auth_header())
        .await;
    let body: Value = response.json();
    assert_eq!(body["status"], json!("completed"));
    assert_eq!(body["processed"], json!(1));

    let body = progress(&app, admin.auth_header()).await;
    assert_eq!(body["progress"]["status"], json!("success"));
    assert_eq!(body["progress"]["total_needing_images"], json!(0));

    reset_image_sync(&app).await;
}

#[tokio::test]
async fn test_status_list_includes_images_row() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let auth = Factory::new(&app.state).create_user().await;
    SyncStatusRepository::upsert_status(&app.state.db, SyncDataType::Images, SyncState::Failed, 0, Some("boom"))
        .await
        .unwrap();

    let response = app
        .server
        .get("/api/sync/status")
        .add_header("Authorization", auth.auth_header())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let images = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["data_type"] == json!("images"))
        .cloned()
        .unwrap();
    assert_eq!(images["status"], json!("failed"));
    assert_eq!(images["error_message"], json!("boom"));

    reset_image_sync(&app).await;
}

#[tokio::test]
async fn test_stale_in_progress_row_can_be_retriggered() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let admin = Factory::new(&app.state).create_admin().await;

    sqlx::query(
        "INSERT INTO sync_status (id, data_type, status, last_sync, records_processed) \
         VALUES ($1, 'images', 'in_progress', NOW() - INTERVAL '2 hours', 40)",
    )
    .bind(uuid::Uuid::new_v4())
    .execute(&app.state.pg_pool)
    .await
    .unwrap();

    let body = trigger(&app, admin.auth_header()).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(app.queue.queue_length().await.unwrap(), 1);

    let record = SyncStatusRepository::find(&app.state.db, SyncDataType::Images)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, SyncState::InProgress);
    assert_eq!(record.records_processed, 0);

    reset_image_sync(&app).await;
}

#[tokio::test]
async fn test_fresh_in_progress_row_is_not_taken_over() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let admin = Factory::new(&app.state).create_admin().await;
    SyncStatusRepository::upsert_status(&app.state.db, SyncDataType::Images, SyncState::InProgress, 5, None)
        .await
        .unwrap();

    let body = trigger(&app, admin.auth_header()).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Image sync already in progress"));
    assert_eq!(app.queue.queue_length().await.unwrap(), 0);

    reset_image_sync(&app).await;
}

#[tokio::test]
async fn test_transient_failure_requeues_until_retries_run_out() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let admin = Factory::new(&app.state).create_admin().await;
    let processor = processor(&app, Arc::new(FailingHandler { transient: true }));

    let body = trigger(&app, admin.auth_header()).await;
    assert_eq!(body["success"], json!(true));

    for attempt in 1..=2 {
        let job = app.queue.dequeue(1).await.unwrap().unwrap();
        assert_eq!(processor.process(job.clone()).await, JobOutcome::Requeued);

        let queued = app.queue.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(queued.status, JobStatus::Pending);
        assert_eq!(queued.retry_count, attempt);
        assert_eq!(app.queue.queue_length().await.unwrap(), 1);

        let body = progress(&app, admin.auth_header()).await;
        assert_eq!(body["progress"]["status"], json!("in_progress"));
    }

    let job = app.queue.dequeue(1).await.unwrap().unwrap();
    assert_eq!(processor.process(job.clone()).await, JobOutcome::Failed);

    let dead = app.queue.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(dead.status, JobStatus::Dead);
    assert_eq!(app.queue.queue_length().await.unwrap(), 0);

    let record = SyncStatusRepository::find(&app.state.db, SyncDataType::Images)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, SyncState::Failed);
    assert!(record
        .error_message
        .unwrap()
        .contains("connection refused"));

    reset_image_sync(&app).await;
}

#[tokio::test]
async fn test_permanent_failure_marks_status_failed() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let admin = Factory::new(&app.state).create_admin().await;
    let processor = processor(&app, Arc::new(FailingHandler { transient: false }));

    trigger(&app, admin.auth_header()).await;
    let job = app.queue.dequeue(1).await.unwrap().unwrap();

    assert_eq!(processor.process(job.clone()).await, JobOutcome::Failed);

    let dead = app.queue.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(dead.status, JobStatus::Dead);
    assert_eq!(dead.retry_count, 0);
    assert_eq!(app.queue.queue_length().await.unwrap(), 0);

    let body = progress(&app, admin.auth_header()).await;
    assert_eq!(body["progress"]["status"], json!("failed"));

    let response = app
        .server
        .post("/api/sync/images")
        .add_header("Authorization", admin.auth_header())
        .await;
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));

    reset_image_sync(&app).await;
}

#[tokio::test]
async fn test_undownloadable_cards_do_not_hold_back_completion() {
    let _guard = SYNC_LOCK.lock().await;
    let app = TestApp::new().await;
    reset_image_sync(&app).await;
    let factory = Factory::new(&app.state);
    let auth = factory.create_user().await;
    let set = unique_set_code();

    factory
        .create_card(CardSpec::new("Mana Crypt", &set).image("https://img.test/crypt.jpg"))
        .await;
    let mut empty_sizes = CardSpec::new("Mana Vault", &set);
    empty_sizes.image_uris = Some(json!({ "normal": "", "art_crop": "https://img.test/vault.jpg" }));
    factory.create_card(empty_sizes).await;

    let body = progress(&app, auth.auth_header()).await;
    assert_eq!(body["progress"]["total_needing_images"], json!(1));

    let service = ImageSyncService::from_config(
        app.state.db.clone(),
        FakeFetcher::failing(&[]),
        &app.state.config,
    );
    let report = service.run().await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 1);

    let body = progress(&app, auth.auth_header()).await;
    assert_eq!(body["progress"]["total_needing_images"], json!(0));
    assert_eq!(body["progress"]["completion_percentage"], json!(100.0));

    reset_image_sync(&app).await;
}
