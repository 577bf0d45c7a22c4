pub mod database;
pub mod error;
pub mod objects;
pub mod row_helpers;
pub mod schema;
pub mod sessions;
pub mod shares;
pub mod users;

pub use database::Database;
pub use error::StoreError;
pub use objects::{FsObjectStore, MemoryObjectStore};
pub use sessions::{DerivedMetadata, SaveOutcome, SessionRepo, StoredFile};
pub use shares::ShareRepo;
pub use users::{UserRepo, UserRow, UserStatus};
