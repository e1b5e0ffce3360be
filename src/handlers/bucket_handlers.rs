use crate::{errors::AppError, models::bucket::BucketSummary, state::AppState};
use axum::{Json, extract::State};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct ListBucketsResponse {
    pub buckets: Vec<BucketSummary>,
}

/// GET `/buckets`
pub async fn list_buckets(
    State(state): State<AppState>,
) -> Result<Json<ListBucketsResponse>, AppError> {
    let buckets = state.store.list_buckets().await?;
    debug!(count = buckets.len(), "listed buckets");
    Ok(Json(ListBucketsResponse { buckets }))
}
