//! Represents objects (files) stored in a bucket and the payloads moved
//! in and out of the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, pin::Pin};
use tokio::io::AsyncRead;

/// Snapshot of a single object as returned by a listing.
///
/// Never persisted by the service; every navigation re-fetches it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectSummary {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Size in bytes.
    pub size: i64,

    /// Timestamp when the object was last modified.
    pub last_modified: Option<DateTime<Utc>>,

    /// Entity tag reported by the store.
    #[serde(rename = "ETag", skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

/// Raw result of a prefix listing delimited at `/`.
#[derive(Clone, Debug, Default)]
pub struct ObjectListing {
    /// Direct children of the prefix, in store order.
    pub objects: Vec<ObjectSummary>,

    /// Folder groupings reported by the store itself.
    pub common_prefixes: Vec<String>,
}

/// Byte stream of an object being downloaded.
pub type ObjectBody = Pin<Box<dyn AsyncRead + Send>>;

/// An object opened for streaming to a caller.
pub struct ObjectDownload {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: ObjectBody,
}

impl fmt::Debug for ObjectDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDownload")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Acknowledgment of a finished upload.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    /// Original filename supplied by the client.
    pub name: String,

    /// Final object key (`prefix + name`).
    pub key: String,

    /// Bytes written.
    pub size: u64,

    /// MIME type stored with the object.
    #[serde(rename = "type")]
    pub content_type: String,
}

/// Per-key result of a batch delete.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    pub errors: Vec<DeleteFailure>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DeleteFailure {
    pub key: String,
    pub message: String,
}
