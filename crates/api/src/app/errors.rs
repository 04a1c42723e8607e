use std::str::FromStr;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use solderp_core::Ipn;
use solderp_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let status = match &err {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Conflict { .. } => StatusCode::CONFLICT,
        ServiceError::Storage { .. } => {
            tracing::error!(error = %err, "request failed in storage");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let message = match &err {
        ServiceError::Validation(msg) | ServiceError::NotFound(msg) => msg.clone(),
        other => other.to_string(),
    };
    json_error(status, err.code(), message)
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

pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}

pub fn query_rejection(rejection: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_query", rejection.body_text())
}

/// Parse a path id (`SalesOrderId`, `InspectionId`, ...).
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

pub fn parse_ipn(raw: &str) -> Result<Ipn, axum::response::Response> {
    Ipn::parse(raw).map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_ipn", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solderp_infra::ConflictKind;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases = [
            (ServiceError::validation("bad"), StatusCode::BAD_REQUEST),
            (ServiceError::not_found("gone"), StatusCode::NOT_FOUND),
            (
                ServiceError::conflict(ConflictKind::InvalidTransition, "no"),
                StatusCode::CONFLICT,
            ),
            (ServiceError::storage("op", "disk"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(service_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn bad_ids_are_rejected() {
        let res = parse_id::<solderp_core::SalesOrderId>("nope", "order").unwrap_err();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(parse_ipn("  ").is_err());
        assert!(parse_ipn("R-10K-0603").is_ok());
    }
}
