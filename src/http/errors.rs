use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::application::{AppError, ErrorKind};

pub fn app_error_to_response(err: AppError) -> axum::response::Response {
    let (status, code) = match err.kind() {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, "validation_error"),
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "conflict"),
        ErrorKind::InsufficientFunds => (StatusCode::CONFLICT, "insufficient_funds"),
        ErrorKind::Concurrency => (StatusCode::CONFLICT, "concurrency_conflict"),
        ErrorKind::Internal => {
            tracing::error!(error = %err, "request failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal server error",
            );
        }
    };
    json_error(status, code, err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_id(raw: &str, what: &'static str) -> Result<uuid::Uuid, axum::response::Response> {
    raw.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {} id: {}", what, raw),
        )
    })
}

pub fn bad_body(rejection: axum::extract::rejection::JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_kinds_map_to_status_codes() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::AccountNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (AppError::DuplicateEmail("a@b.io".into()), StatusCode::CONFLICT),
            (
                AppError::InsufficientFunds {
                    account_id: Uuid::nil(),
                    balance: 100,
                    requested: 200,
                },
                StatusCode::CONFLICT,
            ),
            (AppError::Concurrency("x".into()), StatusCode::CONFLICT),
            (
                AppError::Database(anyhow::anyhow!("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(app_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        let response = parse_id("not-a-uuid", "account").unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(parse_id(&Uuid::new_v4().to_string(), "account").is_ok());
    }
}
