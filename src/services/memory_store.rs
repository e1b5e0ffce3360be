//! In-process `ObjectStore` holding objects in a `BTreeMap`.
//!
//! Mirrors the list semantics of an S3 endpoint closely enough to drive the
//! HTTP layer in tests and observe side effects without a network store.

use crate::{
    models::{
        bucket::BucketSummary,
        object::{DeleteOutcome, ObjectDownload, ObjectListing, ObjectSummary},
    },
    namespace::common_prefix,
    services::object_store::{ObjectStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, BTreeSet},
    io::Cursor,
    path::Path,
    time::Duration,
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    buckets: RwLock<BTreeMap<String, MemoryBucket>>,
    /// When true, listings return every key under the prefix and no
    /// common prefixes, like a store without delimiter support.
    flat_listing: bool,
}

#[derive(Debug)]
struct MemoryBucket {
    created_at: DateTime<Utc>,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    last_modified: DateTime<Utc>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that ignores the delimiter when listing.
    pub fn flat() -> Self {
        Self {
            flat_listing: true,
            ..Self::default()
        }
    }

    /// Create an empty bucket; an existing bucket is left untouched.
    pub async fn create_bucket(&self, name: &str) {
        self.buckets
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(|| MemoryBucket {
                created_at: Utc::now(),
                objects: BTreeMap::new(),
            });
    }

    /// Store `data` under `key` directly, bypassing any upload path.
    pub async fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) -> StoreResult<()> {
        let mut buckets = self.buckets.write().await;
        let entry = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        entry.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: "application/octet-stream".into(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    /// Total number of objects across all buckets.
    pub async fn object_count(&self) -> usize {
        self.buckets
            .read()
            .await
            .values()
            .map(|bucket| bucket.objects.len())
            .sum()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_buckets(&self) -> StoreResult<Vec<BucketSummary>> {
        Ok(self
            .buckets
            .read()
            .await
            .iter()
            .map(|(name, bucket)| BucketSummary {
                name: name.clone(),
                creation_date: Some(bucket.created_at),
            })
            .collect())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StoreResult<ObjectListing> {
        let buckets = self.buckets.read().await;
        let entry = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;

        let mut objects = Vec::new();
        let mut common_prefixes = BTreeSet::new();
        for (key, object) in entry
            .objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
        {
            if !self.flat_listing {
                if let Some(folder) = common_prefix(key, prefix) {
                    common_prefixes.insert(folder);
                    continue;
                }
            }
            objects.push(ObjectSummary {
                key: key.clone(),
                size: object.data.len() as i64,
                last_modified: Some(object.last_modified),
                etag: None,
            });
        }

        Ok(ObjectListing {
            objects,
            common_prefixes: common_prefixes.into_iter().collect(),
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> StoreResult<u64> {
        let data = Bytes::from(tokio::fs::read(source).await?);
        let size = data.len() as u64;

        let mut buckets = self.buckets.write().await;
        let entry = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        entry.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(size)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectDownload> {
        let buckets = self.buckets.read().await;
        let object = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;

        Ok(ObjectDownload {
            content_type: Some(object.content_type),
            content_length: Some(object.data.len() as u64),
            body: Box::pin(Cursor::new(object.data)),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let mut buckets = self.buckets.write().await;
        let entry = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        // Deleting a missing key succeeds, as it does on S3.
        entry.objects.remove(key);
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<DeleteOutcome> {
        let mut buckets = self.buckets.write().await;
        let entry = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;

        let mut outcome = DeleteOutcome::default();
        for key in keys {
            entry.objects.remove(key);
            outcome.deleted.push(key.clone());
        }
        Ok(outcome)
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StoreResult<String> {
        let buckets = self.buckets.read().await;
        let exists = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?
            .objects
            .contains_key(key);
        if !exists {
            return Err(StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Ok(format!(
            "memory://{}/{}?expires_in={}",
            bucket,
            key,
            expires_in.as_secs()
        ))
    }
}
