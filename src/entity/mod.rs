pub mod card;
pub mod card_price;
pub mod collection_entry;
pub mod oracle_text;
pub mod sync_status;
pub mod user;

pub mod prelude;

pub use prelude::*;
