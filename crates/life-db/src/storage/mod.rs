pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;
pub mod traits;

pub use memory::MemoryBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
pub use store::Store;
pub use traits::StorageBackend;
