//! Ports: trait seams between the domain and the outside world.

pub mod blob_store;
pub mod run_store;
pub mod stage_client;

pub use blob_store::{BlobError, BlobStore};
pub use run_store::{RunFilters, RunStore};
pub use stage_client::{StageCallError, StageClient, StageKind};
