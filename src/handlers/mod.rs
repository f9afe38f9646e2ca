pub mod auth;
pub mod card;
pub mod collection;
pub mod common;
pub mod sync;

pub use auth::{login, me, register, AuthResponse, LoginRequest, RegisterRequest};
pub use card::{
    card_prices, get_card, import_cards, search_cards, CardPriceListResponse, CardSearchParams,
    CardSearchResponse,
};
pub use collection::{
    create_entry, delete_entry, get_entry, list_entries, update_entry, CollectionEntryListResponse,
};
pub use common::{validate_required, PaginationParams};
pub use sync::{
    get_sync_job, image_sync_progress, list_sync_status, start_image_sync, SyncJobResponse,
    SyncStatusListResponse,
};
