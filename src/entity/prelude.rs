pub use super::card::Entity as Card;
pub use super::card_price::Entity as CardPrice;
pub use super::collection_entry::Entity as CollectionEntry;
pub use super::oracle_text::Entity as OracleText;
pub use super::sync_status::Entity as SyncStatus;
pub use super::user::Entity as User;
