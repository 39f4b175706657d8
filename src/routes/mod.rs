pub mod events;
pub mod records;

use axum::extract::FromRef;
use axum::routing::get;
use axum::{Json, Router};
use std::path::Path;
use tower_http::services::ServeDir;

use crate::services::notifier::Notifier;
use crate::store::EmailStore;

#[derive(Clone)]
pub struct AppState {
    pub store: EmailStore,
    pub notifier: Notifier,
}

impl FromRef<AppState> for EmailStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Notifier {
    fn from_ref(state: &AppState) -> Self {
        state.notifier.clone()
    }
}

/// The record router is mounted twice: dashboards historically hit
/// `/api/resumes` while newer clients use `/api/emails`.
pub fn build_router(state: AppState, uploads_dir: &Path) -> Router {
    let records = Router::new()
        .route("/", get(records::list))
        .route("/stats/count", get(records::count))
        .route("/:id", get(records::get_one).delete(records::delete_one));

    Router::new()
        .route("/api/health", get(health))
        .nest("/api/emails", records.clone())
        .nest("/api/resumes", records)
        .route("/api/events", get(events::event_stream))
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
