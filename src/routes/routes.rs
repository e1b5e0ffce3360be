//! Defines routes for the file manager API.
//!
//! ## Structure
//! - **Bucket-level endpoints**
//!   - `GET    /buckets` — list buckets
//!
//! - **Object-level endpoints** (bucket, prefix and key travel as query params)
//!   - `GET    /objects?bucket=&prefix=` — list one folder level
//!   - `POST   /objects?bucket=&prefix=` — multipart upload
//!   - `DELETE /objects?bucket=&key=` — delete object
//!   - `GET    /objects/content?bucket=&key=` — download object
//!   - `POST   /objects/delete?bucket=` — delete a batch of keys
//!   - `GET    /objects/url?bucket=&key=&expires=` — presigned download URL

use crate::{
    handlers::{
        bucket_handlers::list_buckets,
        health_handlers::{healthz, readyz},
        object_handlers::{
            delete_object, delete_objects, download_object, list_objects, method_not_allowed,
            presign_object, upload_object,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build and return the router for all API routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Bucket-level routes
        .route("/buckets", get(list_buckets))
        // Object-level routes
        .route(
            "/objects",
            get(list_objects)
                .post(upload_object)
                .delete(delete_object)
                .fallback(method_not_allowed),
        )
        .route(
            "/objects/content",
            get(download_object).fallback(method_not_allowed),
        )
        .route(
            "/objects/delete",
            post(delete_objects).fallback(method_not_allowed),
        )
        .route(
            "/objects/url",
            get(presign_object).fallback(method_not_allowed),
        )
}

/// The complete application: routes, state, upload size limit and
/// request tracing.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    routes()
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
