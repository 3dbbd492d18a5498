use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use chrono::Utc;

use crate::application::LedgerService;

pub async fn health(Extension(service): Extension<Arc<LedgerService>>) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "database": service.backend_name(),
            "timestamp": Utc::now(),
        })),
    )
        .into_response()
}
