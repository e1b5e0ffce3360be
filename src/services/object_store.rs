//! The object store gateway seam.
//!
//! Handlers only ever talk to `dyn ObjectStore`. Every call is a single
//! request/response against the remote store: nothing is cached, nothing
//! is retried, and no state is carried between calls.

use crate::models::{
    bucket::BucketSummary,
    object::{DeleteOutcome, ObjectDownload, ObjectListing},
};
use async_trait::async_trait;
use std::{io, path::Path, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("{message}")]
    Transport { message: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// List/Get/Put/Delete over an S3-compatible store.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every bucket visible to the configured credentials.
    async fn list_buckets(&self) -> StoreResult<Vec<BucketSummary>>;

    /// List the direct children of `prefix`, delimited at `/`.
    ///
    /// Collects every page; a failure on any page fails the whole listing.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> StoreResult<ObjectListing>;

    /// Upload the file at `source` as `key`, returning the bytes written.
    ///
    /// Last write wins; an existing object under `key` is replaced.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> StoreResult<u64>;

    /// Open `key` for streaming.
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectDownload>;

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// Delete several keys, reporting the outcome per key.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<DeleteOutcome>;

    /// Produce a time-limited download URL for `key`.
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration)
    -> StoreResult<String>;
}
