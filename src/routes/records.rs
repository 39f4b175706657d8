//! Read/delete endpoints over stored email records.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::models::email::MailRecord;
use crate::store::EmailStore;

type ApiError = (StatusCode, String);

fn internal(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// GET / - all records, newest first.
pub async fn list(State(store): State<EmailStore>) -> Result<Json<Vec<MailRecord>>, ApiError> {
    store.find_all().await.map(Json).map_err(internal)
}

/// GET /:id
pub async fn get_one(
    State(store): State<EmailStore>,
    Path(id): Path<i64>,
) -> Result<Json<MailRecord>, ApiError> {
    store
        .find_by_id(id)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("email {id} not found")))
}

/// DELETE /:id - removes the record and, best effort, its stored PDF.
pub async fn delete_one(
    State(store): State<EmailStore>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let record = store
        .find_by_id(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("email {id} not found")))?;

    store.delete_by_id(id).await.map_err(internal)?;

    if let Some(data) = &record.attachment_data {
        if !data.pdf_path.is_empty() {
            if let Err(e) = tokio::fs::remove_file(&data.pdf_path).await {
                warn!(path = %data.pdf_path, error = %e, "could not remove stored pdf");
            }
        }
    }

    Ok(Json(DeleteResponse {
        success: true,
        message: "Email deleted".into(),
    }))
}

/// GET /stats/count
pub async fn count(State(store): State<EmailStore>) -> Result<Json<CountResponse>, ApiError> {
    let count = store.count().await.map_err(internal)?;
    Ok(Json(CountResponse { count }))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}
