pub mod connection;
pub mod run_repo;
pub mod utils;

pub use connection::DatabaseConnection;
pub use run_repo::SqliteRunStore;
