pub mod db;
pub mod error;
pub mod models;
pub mod repository;

pub use db::{init_assistant_db, init_test_db};
pub use error::{Result, StorageError};
pub use repository::SqliteScheduleStore;
