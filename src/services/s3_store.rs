//! `ObjectStore` backed by the AWS SDK for Rust.
//!
//! Talks to any S3-compatible endpoint (MinIO and friends) using
//! path-style addressing. The client is built once at startup and shared
//! by every request.

use crate::{
    config::Credentials,
    models::{
        bucket::BucketSummary,
        object::{DeleteFailure, DeleteOutcome, ObjectDownload, ObjectListing, ObjectSummary},
    },
    namespace::DELIMITER,
    services::object_store::{ObjectStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client as S3Client,
    config::{Builder as S3ConfigBuilder, Region},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    primitives::{ByteStream, DateTime as SmithyDateTime},
    types::{Delete, Object, ObjectIdentifier},
};
use chrono::{DateTime, Utc};
use std::{path::Path, time::Duration};
use tracing::debug;

/// Most keys a single DeleteObjects request accepts.
const MAX_DELETE_BATCH: usize = 1000;

pub struct S3ObjectStore {
    client: S3Client,
}

impl S3ObjectStore {
    /// Build a client for the endpoint and static keys in `credentials`.
    pub async fn connect(credentials: &Credentials) -> Self {
        let static_credentials = aws_credential_types::Credentials::new(
            &credentials.access_key,
            &credentials.secret_key,
            None,
            None,
            "bucket-browser",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(credentials.region.clone()))
            .credentials_provider(static_credentials)
            .load()
            .await;

        let s3_config = S3ConfigBuilder::from(&sdk_config)
            .endpoint_url(credentials.endpoint())
            .force_path_style(true)
            .build();

        Self::from_client(S3Client::from_conf(s3_config))
    }

    /// Wrap an already configured client.
    pub fn from_client(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_buckets(&self) -> StoreResult<Vec<BucketSummary>> {
        debug!("listing buckets");
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|err| StoreError::transport(DisplayErrorContext(&err).to_string()))?;

        Ok(output
            .buckets()
            .iter()
            .map(|bucket| BucketSummary {
                name: bucket.name().unwrap_or_default().to_string(),
                creation_date: bucket.creation_date().and_then(to_utc),
            })
            .collect())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StoreResult<ObjectListing> {
        debug!(bucket, prefix, "listing objects");
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .delimiter(DELIMITER.to_string())
            .into_paginator()
            .send();

        let mut listing = ObjectListing::default();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_bucket() {
                    StoreError::BucketNotFound(bucket.to_string())
                } else {
                    StoreError::transport(DisplayErrorContext(&service_err).to_string())
                }
            })?;

            listing
                .objects
                .extend(page.contents().iter().map(object_summary));
            listing.common_prefixes.extend(
                page.common_prefixes()
                    .iter()
                    .filter_map(|cp| cp.prefix().map(str::to_string)),
            );
        }

        debug!(
            bucket,
            prefix,
            objects = listing.objects.len(),
            common_prefixes = listing.common_prefixes.len(),
            "listing complete"
        );
        Ok(listing)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> StoreResult<u64> {
        let size = tokio::fs::metadata(source).await?.len();
        let body = ByteStream::from_path(source)
            .await
            .map_err(|err| StoreError::transport(err.to_string()))?;

        debug!(bucket, key, size, content_type, "putting object");
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|err| StoreError::transport(DisplayErrorContext(&err).to_string()))?;

        Ok(size)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectDownload> {
        debug!(bucket, key, "getting object");
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    StoreError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StoreError::transport(DisplayErrorContext(&service_err).to_string())
                }
            })?;

        let content_type = output.content_type().map(str::to_string);
        let content_length = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok());

        Ok(ObjectDownload {
            content_type,
            content_length,
            body: Box::pin(output.body.into_async_read()),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        debug!(bucket, key, "deleting object");
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| StoreError::transport(DisplayErrorContext(&err).to_string()))?;
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<DeleteOutcome> {
        let mut outcome = DeleteOutcome::default();

        for batch in keys.chunks(MAX_DELETE_BATCH) {
            debug!(bucket, count = batch.len(), "deleting object batch");
            let identifiers = batch
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| StoreError::transport(err.to_string()))?;
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .quiet(false)
                .build()
                .map_err(|err| StoreError::transport(err.to_string()))?;

            let output = self
                .client
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|err| StoreError::transport(DisplayErrorContext(&err).to_string()))?;

            outcome.deleted.extend(
                output
                    .deleted()
                    .iter()
                    .filter_map(|deleted| deleted.key().map(str::to_string)),
            );
            outcome
                .errors
                .extend(output.errors().iter().map(|failure| DeleteFailure {
                    key: failure.key().unwrap_or_default().to_string(),
                    message: failure.message().unwrap_or("delete failed").to_string(),
                }));
        }

        Ok(outcome)
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StoreResult<String> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|err| StoreError::transport(err.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|err| StoreError::transport(DisplayErrorContext(&err).to_string()))?;

        Ok(request.uri().to_string())
    }
}

fn object_summary(object: &Object) -> ObjectSummary {
    ObjectSummary {
        key: object.key().unwrap_or_default().to_string(),
        size: object.size().unwrap_or(0),
        last_modified: object.last_modified().and_then(to_utc),
        etag: object.e_tag().map(str::to_string),
    }
}

fn to_utc(timestamp: &SmithyDateTime) -> Option<DateTime<Utc>> {
    timestamp
        .to_millis()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}
