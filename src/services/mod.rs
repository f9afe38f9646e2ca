pub mod auth;
pub mod card_import;
pub mod card_search;
pub mod image_sync;
pub mod sync_job;

pub use auth::{AuthService, Claims};
pub use card_import::{CardImportService, ImportSummary, ScryfallCard};
pub use card_search::{CardSearchCriteria, SearchBind};
pub use image_sync::{FetchError, HttpImageFetcher, ImageFetcher, ImageSyncService};
pub use sync_job::{is_retryable_error, JobHandler, JobOutcome, JobProcessor, SyncJobExecutor};
