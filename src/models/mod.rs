pub mod card;
pub mod collection_entry;
pub mod sync;
pub mod user;

pub use card::*;
pub use collection_entry::*;
pub use sync::*;
pub use user::*;
