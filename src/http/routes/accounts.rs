use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::application::LedgerService;
use crate::http::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route("/:id", get(get_account))
}

pub async fn list_accounts(
    Extension(service): Extension<Arc<LedgerService>>,
) -> axum::response::Response {
    match service.list_accounts().await {
        Ok(accounts) => (
            StatusCode::OK,
            Json(dto::ListResponse::<dto::AccountResponse>::from_slice(&accounts)),
        )
            .into_response(),
        Err(e) => errors::app_error_to_response(e),
    }
}

pub async fn get_account(
    Extension(service): Extension<Arc<LedgerService>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id(&id, "account") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match service.get_account_info(id).await {
        Ok(info) => (StatusCode::OK, Json(dto::AccountDetailResponse::from(&info))).into_response(),
        Err(e) => errors::app_error_to_response(e),
    }
}

pub async fn create_account(
    Extension(service): Extension<Arc<LedgerService>>,
    body: Result<Json<dto::CreateAccountRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::bad_body(rejection),
    };

    match service
        .create_account(
            body.customer_id,
            &body.account_number,
            body.balance,
            &body.owner_name,
        )
        .await
    {
        Ok(account) => {
            (StatusCode::CREATED, Json(dto::AccountResponse::from(&account))).into_response()
        }
        Err(e) => errors::app_error_to_response(e),
    }
}
