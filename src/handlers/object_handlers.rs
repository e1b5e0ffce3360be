//! HTTP handlers for object operations.
//! Uploads are spooled to a temporary file and downloads are streamed, so
//! object bodies are never buffered in memory. Storage concerns are
//! delegated to the `ObjectStore` in `AppState`.

use crate::{
    errors::AppError,
    models::object::{DeleteOutcome, ObjectSummary, UploadedFile},
    namespace,
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Query, State, multipart::Field},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use tempfile::{Builder, NamedTempFile};
use tokio::{fs::File, io::AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

const UPLOAD_FIELD: &str = "file";
const DEFAULT_FILE_NAME: &str = "unnamed-file";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const DEFAULT_URL_EXPIRY_SECS: u64 = 3600;
/// Longest lifetime a SigV4 presigned URL may have (7 days).
const MAX_URL_EXPIRY_SECS: u64 = 7 * 24 * 3600;

/// Query params shared by the `/objects` endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ObjectQuery {
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    pub key: Option<String>,
    /// Presigned URL lifetime in seconds.
    pub expires: Option<u64>,
}

impl ObjectQuery {
    fn bucket(&self) -> Result<String, AppError> {
        required(self.bucket.as_deref(), "Bucket name is required")
    }

    fn key(&self) -> Result<String, AppError> {
        required(self.key.as_deref(), "File key is required")
    }

    fn prefix(&self) -> String {
        self.prefix.clone().unwrap_or_default()
    }
}

fn required(value: Option<&str>, message: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::bad_request(message))
}

#[derive(Debug, Serialize)]
pub struct ListObjectsResponse {
    pub objects: Vec<ObjectSummary>,
    pub prefix: String,
    pub bucket: String,
    /// Immediate child folders, sorted.
    pub folders: Vec<String>,
    /// Keys directly under `prefix`, in listing order.
    pub files: Vec<String>,
    /// Prefix of the folder one level up.
    pub parent: String,
    pub breadcrumbs: Vec<Breadcrumb>,
}

#[derive(Debug, Serialize)]
pub struct Breadcrumb {
    pub name: String,
    pub prefix: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub file: UploadedFile,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// Body of `POST /objects/delete`.
#[derive(Debug, Deserialize)]
pub struct BatchDeleteRequest {
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchDeleteResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: DeleteOutcome,
}

#[derive(Debug, Serialize)]
pub struct PresignResponse {
    pub url: String,
    pub expires_in: u64,
}

/// GET `/objects?bucket=&prefix=` — list one folder level.
///
/// The store's common prefixes are folded into the folders derived from
/// the returned keys, so stores without delimiter support still browse.
pub async fn list_objects(
    State(state): State<AppState>,
    Query(q): Query<ObjectQuery>,
) -> Result<Json<ListObjectsResponse>, AppError> {
    let bucket = q.bucket()?;
    let prefix = q.prefix();

    let listing = state.store.list_objects(&bucket, &prefix).await?;
    let mut view = namespace::project(listing.objects.iter().map(|o| o.key.as_str()), &prefix);
    let projected = view.folders.clone();
    let store_only = view.merge_common_prefixes(listing.common_prefixes.iter().cloned());
    if !listing.common_prefixes.is_empty()
        && projected.iter().any(|f| !listing.common_prefixes.contains(f))
    {
        debug!(%bucket, %prefix, "projected folders missing from store common prefixes");
    }
    debug!(
        %bucket,
        %prefix,
        folders = view.folders.len(),
        store_only,
        files = view.files.len(),
        "listed objects"
    );

    Ok(Json(ListObjectsResponse {
        parent: namespace::parent_prefix(&prefix),
        breadcrumbs: namespace::breadcrumbs(&prefix)
            .into_iter()
            .map(|(name, prefix)| Breadcrumb { name, prefix })
            .collect(),
        objects: listing.objects,
        folders: view.folders.into_iter().collect(),
        files: view.files,
        prefix,
        bucket,
    }))
}

/// POST `/objects?bucket=&prefix=` — multipart upload of the `file` field.
///
/// The object key is `prefix + filename`; an existing object is replaced.
pub async fn upload_object(
    State(state): State<AppState>,
    Query(q): Query<ObjectQuery>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let bucket = q.bucket()?;
    let prefix = q.prefix();

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let key = format!("{}{}", prefix, name);

        // Removed when dropped, on success and on every error path.
        let spool = spool_field(&mut field, state.spool_dir.as_deref()).await?;
        let size = state
            .store
            .put_object(&bucket, &key, spool.path(), &content_type)
            .await?;

        info!(%bucket, %key, size, "uploaded object");
        return Ok(Json(UploadResponse {
            success: true,
            message: "File uploaded successfully".into(),
            file: UploadedFile {
                name,
                key,
                size,
                content_type,
            },
        }));
    }

    Err(AppError::bad_request("No file uploaded"))
}

const SPOOL_PREFIX: &str = ".upload-";

/// Copy a multipart field to a temporary file chunk by chunk.
async fn spool_field(
    field: &mut Field<'_>,
    dir: Option<&Path>,
) -> Result<NamedTempFile, AppError> {
    let mut builder = Builder::new();
    builder.prefix(SPOOL_PREFIX);
    let spool = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    let mut file = File::from_std(spool.reopen()?);
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(spool)
}

/// GET `/objects/content?bucket=&key=` — stream an object as an attachment.
///
/// Failures before the first byte become JSON errors. Once the body is
/// streaming the headers are committed, so a late store error can only be
/// logged and the connection dropped.
pub async fn download_object(
    State(state): State<AppState>,
    Query(q): Query<ObjectQuery>,
) -> Result<Response, AppError> {
    let bucket = q.bucket()?;
    let key = q.key()?;

    let download = state.store.get_object(&bucket, &key).await?;
    let content_type = download
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.into());
    let disposition = content_disposition(namespace::file_name(&key));
    let content_length = download.content_length;

    info!(%bucket, %key, ?content_length, "streaming object");
    let stream = ReaderStream::new(download.body).inspect_err(move |err| {
        warn!(%bucket, %key, error = %err, "download aborted mid-stream");
    });

    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    if let Some(length) = content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    Ok(response)
}

fn content_disposition(file_name: &str) -> HeaderValue {
    let escaped = file_name.replace('\\', "\\\\").replace('"', "\\\"");
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", escaped))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// DELETE `/objects?bucket=&key=` — remove a single object.
pub async fn delete_object(
    State(state): State<AppState>,
    Query(q): Query<ObjectQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    let bucket = q.bucket()?;
    let key = q.key()?;

    state.store.delete_object(&bucket, &key).await?;

    info!(%bucket, %key, "deleted object");
    Ok(Json(DeleteResponse {
        success: true,
        message: format!("File {} deleted successfully from bucket {}", key, bucket),
    }))
}

/// POST `/objects/delete?bucket=` — remove several objects at once.
pub async fn delete_objects(
    State(state): State<AppState>,
    Query(q): Query<ObjectQuery>,
    Json(req): Json<BatchDeleteRequest>,
) -> Result<Json<BatchDeleteResponse>, AppError> {
    let bucket = q.bucket()?;
    let keys: Vec<String> = req.keys.into_iter().filter(|k| !k.is_empty()).collect();
    if keys.is_empty() {
        return Err(AppError::bad_request("At least one file key is required"));
    }

    let outcome = state.store.delete_objects(&bucket, &keys).await?;

    info!(
        %bucket,
        deleted = outcome.deleted.len(),
        failed = outcome.errors.len(),
        "deleted object batch"
    );
    Ok(Json(BatchDeleteResponse {
        success: outcome.errors.is_empty(),
        outcome,
    }))
}

/// GET `/objects/url?bucket=&key=&expires=` — time-limited download link.
pub async fn presign_object(
    State(state): State<AppState>,
    Query(q): Query<ObjectQuery>,
) -> Result<Json<PresignResponse>, AppError> {
    let bucket = q.bucket()?;
    let key = q.key()?;
    let expires_in = q
        .expires
        .unwrap_or(DEFAULT_URL_EXPIRY_SECS)
        .clamp(1, MAX_URL_EXPIRY_SECS);

    let url = state
        .store
        .presign_get(&bucket, &key, Duration::from_secs(expires_in))
        .await?;

    Ok(Json(PresignResponse { url, expires_in }))
}

/// Any method an `/objects` route does not serve.
pub async fn method_not_allowed() -> AppError {
    AppError::method_not_allowed()
}
