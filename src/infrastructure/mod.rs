//! Infrastructure layer: adapters binding the domain ports to SQLite,
//! the local filesystem, and the remote stage service.

pub mod blob;
pub mod config;
pub mod database;
pub mod stage;
