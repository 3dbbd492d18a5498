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
        .route("/", get(list_customers).post(create_customer))
        .route("/:id", get(get_customer).delete(delete_customer))
}

pub async fn list_customers(
    Extension(service): Extension<Arc<LedgerService>>,
) -> axum::response::Response {
    match service.list_customers().await {
        Ok(customers) => (
            StatusCode::OK,
            Json(dto::ListResponse::<dto::CustomerResponse>::from_slice(&customers)),
        )
            .into_response(),
        Err(e) => errors::app_error_to_response(e),
    }
}

pub async fn get_customer(
    Extension(service): Extension<Arc<LedgerService>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id(&id, "customer") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match service.get_customer_info(id).await {
        Ok(info) => {
            (StatusCode::OK, Json(dto::CustomerDetailResponse::from(&info))).into_response()
        }
        Err(e) => errors::app_error_to_response(e),
    }
}

pub async fn create_customer(
    Extension(service): Extension<Arc<LedgerService>>,
    body: Result<Json<dto::CreateCustomerRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return errors::bad_body(rejection),
    };

    match service.create_customer(body.into()).await {
        Ok(customer) => {
            (StatusCode::CREATED, Json(dto::CustomerResponse::from(&customer))).into_response()
        }
        Err(e) => errors::app_error_to_response(e),
    }
}

pub async fn delete_customer(
    Extension(service): Extension<Arc<LedgerService>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_id(&id, "customer") {
        Ok(id) => id,
        Err(response) => return response,
    };

    match service.delete_customer(id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::app_error_to_response(e),
    }
}
