pub mod card;
pub mod card_price;
pub mod collection_entry;
pub mod oracle_text;
pub mod sync_status;
pub mod user;

pub use card::CardRepository;
pub use card_price::CardPriceRepository;
pub use collection_entry::CollectionEntryRepository;
pub use oracle_text::OracleTextRepository;
pub use sync_status::SyncStatusRepository;
pub use user::UserRepository;
