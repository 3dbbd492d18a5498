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
        .route("/", get(list_transactions).post(create_transaction))
        .route("/:id", get(get_transaction))
        .route("/account/:account_id", get(list_account_transactions))
}

pub async fn list_transactions(
    Extension(service): Extension<Arc<LedgerService>>,
) -> axum::response::Response {
    match service.list_transactions().await {
        Ok(transactions) => (
            StatusCode::OK,
            Json(dto::ListResponse::<dto::TransactionResponse>::from_slice(&transactions)),
        )
            .into_response(),
        Err(e) => errors::app_error_to_response(e),
    }
}

pub async fn get_transaction(
    Extension(service): Extension<Arc<LedgerService>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id(&id, "transaction") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match service.get_transaction(id).await {
        Ok(transaction) => {
            (StatusCode::OK, Json(dto::TransactionResponse::from(&transaction))).into_response()
        }
        Err(e) => errors::app_error_to_response(e),
    }
}

pub async fn list_account_transactions(
    Extension(service): Extension<Arc<LedgerService>>,
    Path(account_id): Path<String>,
) -> axum::response::Response {
    let account_id = match errors::parse_id(&account_id, "account") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match service.list_transactions_for_account(account_id).await {
        Ok(transactions) => (
            StatusCode::OK,
            Json(dto::ListResponse::<dto::TransactionResponse>::from_slice(&transactions)),
        )
            .into_response(),
        Err(e) => errors::app_error_to_response(e),
    }
}

pub async fn create_transaction(
    Extension(service): Extension<Arc<LedgerService>>,
    body: Result<Json<dto::CreateTransactionRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::bad_body(rejection),
    };

    match service
        .apply_transaction(body.account_id, body.kind, body.amount, body.description)
        .await
    {
        Ok(transaction) => (
            StatusCode::CREATED,
            Json(dto::TransactionResponse::from(&transaction)),
        )
            .into_response(),
        Err(e) => errors::app_error_to_response(e),
    }
}
