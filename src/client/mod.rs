//! Client side of the image sync flow: a typed API over the sync endpoints
//! and a controller that triggers a run and polls until it settles.

pub mod api;
pub mod poller;

pub use api::{ClientError, HttpSyncApi, SyncApi};
pub use poller::{ImageSyncController, PollHandle, PollPolicy, SyncSnapshot, TriggerOutcome};
