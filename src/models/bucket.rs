//! Represents a bucket as reported by the object store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bucket visible to the configured credentials.
///
/// Serialized with the store's own field casing (`Name`, `CreationDate`)
/// so browser code written against the S3 listing shape keeps working.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct BucketSummary {
    /// Bucket name.
    pub name: String,

    /// When the bucket was created, if the store reports it.
    pub creation_date: Option<DateTime<Utc>>,
}
