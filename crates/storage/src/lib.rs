#![forbid(unsafe_code)]

pub mod adapter;
pub mod export;
pub mod record;
pub mod repository;
pub mod sqlite;
pub mod validate;

pub use adapter::{ProgressStore, STORAGE_KEY, StorageDiagnostics};
pub use export::{EXPORT_VERSION, ProgressExport, export_progress, import_progress};
pub use record::{Envelope, RecordError, SCHEMA_VERSION, StoredAchievement, StoredProgress};
pub use repository::{InMemoryStore, KeyValueStore, StorageError};
pub use sqlite::{SqliteInitError, SqliteStore};
pub use validate::{ValidationError, validate_progress_value};
