//! Maps `agw_domain::error::Error` onto HTTP status codes (§7).

use agw_domain::error::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            Error::UnknownBackend(_) => (StatusCode::BAD_REQUEST, "unknown_backend"),
            Error::NoHealthyBackend => (StatusCode::SERVICE_UNAVAILABLE, "no_healthy_backend"),
            Error::UnknownAgent(_) => (StatusCode::NOT_FOUND, "unknown_agent"),
            Error::NoLeader => (StatusCode::NOT_FOUND, "no_leader"),
            Error::InvalidRunId(_) => (StatusCode::BAD_REQUEST, "invalid_run_id"),
            Error::MissingContextPack(_) => (StatusCode::NOT_FOUND, "missing_context_pack"),
            Error::InterruptAuthorization => (StatusCode::FORBIDDEN, "interrupt_authorization"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::BackendStream(_) => (StatusCode::BAD_GATEWAY, "backend_stream_error"),
            Error::ToolExecution(_) => (StatusCode::INTERNAL_SERVER_ERROR, "tool_execution_error"),
            Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::Io(_) | Error::Json(_) | Error::Http(_) | Error::Other(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        (
            status,
            Json(serde_json::json!({ "error": code, "message": self.0.to_string() })),
        )
            .into_response()
    }
}

pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_authorization_maps_to_forbidden() {
        let resp = ApiError(Error::InterruptAuthorization).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn missing_context_pack_maps_to_not_found() {
        let resp = ApiError(Error::MissingContextPack("abc".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn no_healthy_backend_maps_to_service_unavailable() {
        let resp = ApiError(Error::NoHealthyBackend).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
