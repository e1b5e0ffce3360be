use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use axum_test::{
    TestServer,
    multipart::{MultipartForm, Part},
};
use bucket_browser::{
    models::{
        bucket::BucketSummary,
        object::{DeleteOutcome, ObjectDownload, ObjectListing},
    },
    routes::routes::app,
    services::{
        memory_store::MemoryObjectStore,
        object_store::{ObjectStore, StoreError, StoreResult},
    },
    state::AppState,
};
use bytes::Bytes;
use serde_json::{Value, json};
use std::{io, path::Path, sync::Arc, time::Duration};
use tempfile::TempDir;
use tokio_util::io::StreamReader;
use tower::ServiceExt;

const MAX_UPLOAD: usize = 1024 * 1024;

/// Returns a [`TestServer`] over `store` plus the store handle for
/// observing side effects.
fn create_test_server_with_store(
    store: MemoryObjectStore,
) -> anyhow::Result<(TestServer, Arc<MemoryObjectStore>)> {
    let store = Arc::new(store);
    let state = AppState::new(store.clone());
    let server = TestServer::new(app(state, MAX_UPLOAD))?;
    Ok((server, store))
}

async fn seeded_store() -> anyhow::Result<MemoryObjectStore> {
    let store = MemoryObjectStore::new();
    store.create_bucket("photos").await;
    for key in [
        "2024/",
        "2024/jan/a.jpg",
        "2024/jan/b.jpg",
        "2024/cover.jpg",
        "readme.txt",
    ] {
        store.insert("photos", key, key.as_bytes().to_vec()).await?;
    }
    Ok(store)
}

async fn create_test_server() -> anyhow::Result<(TestServer, Arc<MemoryObjectStore>)> {
    create_test_server_with_store(seeded_store().await?)
}

/// Like [`create_test_server`], with uploads spooled into a fresh directory.
async fn create_spooling_test_server() -> anyhow::Result<(TestServer, TempDir)> {
    let spool = TempDir::new()?;
    let state = AppState::new(Arc::new(seeded_store().await?)).with_spool_dir(spool.path());
    let server = TestServer::new(app(state, MAX_UPLOAD))?;
    Ok((server, spool))
}

fn spool_entries(dir: &Path) -> anyhow::Result<usize> {
    Ok(std::fs::read_dir(dir)?.count())
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().expect("string").to_string())
        .collect()
}

fn upload_form(name: &str, content: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(content.to_vec())
            .file_name(name)
            .mime_type("text/plain"),
    )
}

#[tokio::test]
async fn healthz() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let response = server.get("/healthz").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "ok" }));
    Ok(())
}

#[tokio::test]
async fn readyz_checks_store() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let body: Value = server.get("/readyz").await.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["object_store"]["ok"], true);
    Ok(())
}

#[tokio::test]
async fn lists_buckets() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let response = server.get("/buckets").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["buckets"][0]["Name"], "photos");
    Ok(())
}

#[tokio::test]
async fn lists_root_folder() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let response = server
        .get("/objects")
        .add_query_param("bucket", "photos")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["bucket"], "photos");
    assert_eq!(body["prefix"], "");
    assert_eq!(body["parent"], "");
    assert_eq!(strings(&body["folders"]), ["2024/"]);
    assert_eq!(strings(&body["files"]), ["readme.txt"]);
    assert_eq!(body["objects"][0]["Key"], "readme.txt");
    assert_eq!(body["objects"][0]["Size"], 10);
    Ok(())
}

#[tokio::test]
async fn lists_nested_folder_without_marker() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let body: Value = server
        .get("/objects")
        .add_query_param("bucket", "photos")
        .add_query_param("prefix", "2024/")
        .await
        .json();

    assert_eq!(strings(&body["folders"]), ["2024/jan/"]);
    assert_eq!(strings(&body["files"]), ["2024/cover.jpg"]);
    assert_eq!(body["parent"], "");
    assert_eq!(body["breadcrumbs"], json!([{ "name": "2024", "prefix": "2024/" }]));
    Ok(())
}

#[tokio::test]
async fn projects_folders_when_store_ignores_delimiter() -> anyhow::Result<()> {
    let store = MemoryObjectStore::flat();
    store.create_bucket("docs").await;
    store.insert("docs", "a/b/1.txt", "1").await?;
    store.insert("docs", "a/b/2.txt", "2").await?;
    let (server, _) = create_test_server_with_store(store)?;

    let body: Value = server
        .get("/objects")
        .add_query_param("bucket", "docs")
        .add_query_param("prefix", "a/")
        .await
        .json();

    assert_eq!(strings(&body["folders"]), ["a/b/"]);
    assert!(strings(&body["files"]).is_empty());
    Ok(())
}

#[tokio::test]
async fn listing_is_idempotent() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let list = || {
        server
            .get("/objects")
            .add_query_param("bucket", "photos")
            .add_query_param("prefix", "2024/")
    };
    let first: Value = list().await.json();
    let second: Value = list().await.json();
    assert_eq!(first["folders"], second["folders"]);
    assert_eq!(first["files"], second["files"]);
    Ok(())
}

#[tokio::test]
async fn listing_missing_bucket_is_a_server_error() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let response = server
        .get("/objects")
        .add_query_param("bucket", "nope")
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "bucket `nope` not found");
    Ok(())
}

#[tokio::test]
async fn upload_then_download_round_trips() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let content = b"quarterly numbers\n1,2,3\n";

    let response = server
        .post("/objects")
        .add_query_param("bucket", "photos")
        .add_query_param("prefix", "2024/")
        .multipart(upload_form("report.csv", content))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["file"]["name"], "report.csv");
    assert_eq!(body["file"]["key"], "2024/report.csv");
    assert_eq!(body["file"]["size"], content.len());
    assert_eq!(body["file"]["type"], "text/plain");

    let download = server
        .get("/objects/content")
        .add_query_param("bucket", "photos")
        .add_query_param("key", "2024/report.csv")
        .await;
    download.assert_status_ok();
    assert_eq!(download.as_bytes().as_ref(), content);
    assert_eq!(download.header("content-type"), "text/plain");
    assert_eq!(
        download.header("content-disposition"),
        "attachment; filename=\"report.csv\""
    );
    assert_eq!(
        download.header("content-length"),
        content.len().to_string().as_str()
    );
    Ok(())
}

#[tokio::test]
async fn upload_replaces_existing_object() -> anyhow::Result<()> {
    let (server, store) = create_test_server().await?;
    let before = store.object_count().await;

    for content in [&b"first"[..], &b"second"[..]] {
        server
            .post("/objects")
            .add_query_param("bucket", "photos")
            .multipart(upload_form("notes.txt", content))
            .await
            .assert_status_ok();
    }

    assert_eq!(store.object_count().await, before + 1);
    let download = server
        .get("/objects/content")
        .add_query_param("bucket", "photos")
        .add_query_param("key", "notes.txt")
        .await;
    assert_eq!(download.as_bytes().as_ref(), b"second");
    Ok(())
}

#[tokio::test]
async fn upload_without_bucket_is_rejected() -> anyhow::Result<()> {
    let (server, store) = create_test_server().await?;
    let before = store.object_count().await;

    let response = server
        .post("/objects")
        .multipart(upload_form("report.csv", b"data"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Bucket name is required");
    assert_eq!(store.object_count().await, before);
    Ok(())
}

#[tokio::test]
async fn upload_without_file_is_rejected() -> anyhow::Result<()> {
    let (server, store) = create_test_server().await?;
    let before = store.object_count().await;

    let form = MultipartForm::new().add_text("note", "no attachment");
    let response = server
        .post("/objects")
        .add_query_param("bucket", "photos")
        .multipart(form)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "No file uploaded");
    assert_eq!(store.object_count().await, before);
    Ok(())
}

#[tokio::test]
async fn upload_to_missing_bucket_fails() -> anyhow::Result<()> {
    let (server, spool) = create_spooling_test_server().await?;
    let response = server
        .post("/objects")
        .add_query_param("bucket", "nope")
        .multipart(upload_form("a.txt", b"a"))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["message"], "bucket `nope` not found");
    assert_eq!(spool_entries(spool.path())?, 0, "spool file left behind");
    Ok(())
}

#[tokio::test]
async fn upload_removes_spool_file() -> anyhow::Result<()> {
    let (server, spool) = create_spooling_test_server().await?;
    server
        .post("/objects")
        .add_query_param("bucket", "photos")
        .multipart(upload_form("notes.txt", b"kept in the store only"))
        .await
        .assert_status_ok();
    assert_eq!(spool_entries(spool.path())?, 0, "spool file left behind");
    Ok(())
}

#[tokio::test]
async fn list_without_bucket_is_rejected() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let response = server
        .get("/objects")
        .add_query_param("bucket", "")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn delete_then_list_drops_key() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let response = server
        .delete("/objects")
        .add_query_param("bucket", "photos")
        .add_query_param("key", "readme.txt")
        .await;
    response.assert_status_ok();
    response.assert_json(&json!({
        "success": true,
        "message": "File readme.txt deleted successfully from bucket photos"
    }));

    let body: Value = server
        .get("/objects")
        .add_query_param("bucket", "photos")
        .await
        .json();
    assert!(!strings(&body["files"]).contains(&"readme.txt".to_string()));
    Ok(())
}

#[tokio::test]
async fn delete_without_parameters_is_rejected() -> anyhow::Result<()> {
    let (server, store) = create_test_server().await?;
    let before = store.object_count().await;

    let response = server
        .delete("/objects")
        .add_query_param("key", "readme.txt")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .delete("/objects")
        .add_query_param("bucket", "photos")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "File key is required");

    assert_eq!(store.object_count().await, before);
    Ok(())
}

#[tokio::test]
async fn delete_against_missing_bucket_reports_message() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let response = server
        .delete("/objects")
        .add_query_param("bucket", "nope")
        .add_query_param("key", "k")
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "bucket `nope` not found");
    assert_eq!(body["error"], body["message"]);
    Ok(())
}

#[tokio::test]
async fn other_methods_are_not_allowed() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let response = server.method(Method::PUT, "/objects").await;
    response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn wrong_method_on_object_subroutes_is_json_405() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    for (method, path) in [
        (Method::PUT, "/objects/content"),
        (Method::GET, "/objects/delete"),
        (Method::POST, "/objects/url"),
    ] {
        let response = server.method(method, path).await;
        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = response.json();
        assert_eq!(body["success"], false, "{path}");
        assert_eq!(body["message"], "Method not allowed", "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn download_missing_key_is_a_json_error() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let response = server
        .get("/objects/content")
        .add_query_param("bucket", "photos")
        .add_query_param("key", "missing.bin")
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn download_without_key_is_rejected() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    server
        .get("/objects/content")
        .add_query_param("bucket", "photos")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn batch_delete_removes_keys() -> anyhow::Result<()> {
    let (server, store) = create_test_server().await?;
    let before = store.object_count().await;

    let response = server
        .post("/objects/delete")
        .add_query_param("bucket", "photos")
        .json(&json!({ "keys": ["2024/jan/a.jpg", "2024/jan/b.jpg"] }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(
        strings(&body["deleted"]),
        ["2024/jan/a.jpg", "2024/jan/b.jpg"]
    );
    assert_eq!(store.object_count().await, before - 2);
    Ok(())
}

#[tokio::test]
async fn batch_delete_needs_keys() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    server
        .post("/objects/delete")
        .add_query_param("bucket", "photos")
        .json(&json!({ "keys": [] }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn presigned_url_clamps_expiry() -> anyhow::Result<()> {
    let (server, _) = create_test_server().await?;
    let response = server
        .get("/objects/url")
        .add_query_param("bucket", "photos")
        .add_query_param("key", "readme.txt")
        .add_query_param("expires", 10_000_000)
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["expires_in"], 604_800);
    assert_eq!(body["url"], "memory://photos/readme.txt?expires_in=604800");
    Ok(())
}

/// Store whose downloads fail after the first chunk.
struct BrokenDownloadStore;

#[async_trait]
impl ObjectStore for BrokenDownloadStore {
    async fn list_buckets(&self) -> StoreResult<Vec<BucketSummary>> {
        Ok(Vec::new())
    }

    async fn list_objects(&self, bucket: &str, _prefix: &str) -> StoreResult<ObjectListing> {
        Err(StoreError::BucketNotFound(bucket.into()))
    }

    async fn put_object(
        &self,
        bucket: &str,
        _key: &str,
        _source: &Path,
        _content_type: &str,
    ) -> StoreResult<u64> {
        Err(StoreError::BucketNotFound(bucket.into()))
    }

    async fn get_object(&self, _bucket: &str, _key: &str) -> StoreResult<ObjectDownload> {
        let chunks = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
        ]);
        Ok(ObjectDownload {
            content_type: Some("text/plain".into()),
            content_length: Some(1024),
            body: Box::pin(StreamReader::new(chunks)),
        })
    }

    async fn delete_object(&self, bucket: &str, _key: &str) -> StoreResult<()> {
        Err(StoreError::BucketNotFound(bucket.into()))
    }

    async fn delete_objects(&self, bucket: &str, _keys: &[String]) -> StoreResult<DeleteOutcome> {
        Err(StoreError::BucketNotFound(bucket.into()))
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        _expires_in: Duration,
    ) -> StoreResult<String> {
        Err(StoreError::ObjectNotFound {
            bucket: bucket.into(),
            key: key.into(),
        })
    }
}

#[tokio::test]
async fn download_error_after_headers_aborts_body() -> anyhow::Result<()> {
    let router = app(AppState::new(Arc::new(BrokenDownloadStore)), MAX_UPLOAD);
    let request = Request::builder()
        .uri("/objects/content?bucket=photos&key=logs/app.log")
        .body(Body::empty())?;

    let response = router.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"app.log\""
    );

    let body = to_bytes(response.into_body(), usize::MAX).await;
    assert!(body.is_err(), "late store error must abort the body");
    Ok(())
}
