//! Blob store port for uploaded log artifacts.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Blob I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for BlobError {
    fn from(err: std::io::Error) -> Self {
        BlobError::Io(err.to_string())
    }
}

/// Port for the artifact blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a key, returning the hex SHA-256 checksum.
    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<String, BlobError>;

    /// Fetch the bytes stored under a key.
    async fn download(&self, key: &str) -> Result<Vec<u8>, BlobError>;

    /// Resolve a key to a URL the remote stage function can fetch.
    fn public_url(&self, key: &str) -> String;
}
