//! HTTP error mapping.
//!
//! Every failure leaves the server as `{"error": "<message>"}`. Expected
//! outcomes carry their own message; timeouts and store failures are logged
//! here with full detail and reach the client as a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use confab_core::policy::MIB;
use confab_core::{CoreError, Forbidden};

#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    /// No identity on an endpoint that needs one.
    Unauthorized,
    /// Body was not valid JSON for the endpoint.
    InvalidBody,
    PayloadTooLarge { limit_bytes: u64 },
    ShareNotFound,
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Core(CoreError::InvalidInput(message.into()))
    }

    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Core(err) => match err {
                CoreError::NotFound => (StatusCode::NOT_FOUND, "Session not found".into()),
                CoreError::Forbidden(Forbidden::OwnerInactive) => (
                    StatusCode::FORBIDDEN,
                    "This session is no longer available".into(),
                ),
                CoreError::Forbidden(Forbidden::NotOwner) => (
                    StatusCode::FORBIDDEN,
                    "You don't have permission to modify this session".into(),
                ),
                CoreError::InvalidInput(message) => (StatusCode::BAD_REQUEST, message.clone()),
                CoreError::Timeout { operation, after } => {
                    error!(
                        kind = err.error_kind(),
                        operation,
                        timeout_ms = after.as_millis() as u64,
                        "request timed out"
                    );
                    (StatusCode::GATEWAY_TIMEOUT, "Request timed out".into())
                }
                CoreError::StoreFailure(detail) => {
                    error!(kind = err.error_kind(), detail = %detail, "store failure");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
                }
            },
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication required".into()),
            Self::InvalidBody => (StatusCode::BAD_REQUEST, "Invalid request body".into()),
            Self::PayloadTooLarge { limit_bytes } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Request body too large (max {} MB)", limit_bytes / MIB),
            ),
            Self::ShareNotFound => (StatusCode::NOT_FOUND, "Share not found".into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Core(err) = &self {
            if err.is_expected() {
                debug!(kind = err.error_kind(), error = %err, "request refused");
            }
        }
        let (status, message) = self.status_and_message();
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn core_errors_map_to_statuses() {
        assert_eq!(status_of(CoreError::NotFound.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(CoreError::Forbidden(Forbidden::OwnerInactive).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(CoreError::InvalidInput("bad".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                CoreError::Timeout {
                    operation: "op",
                    after: Duration::from_millis(5)
                }
                .into()
            ),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_of(CoreError::StoreFailure("disk".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_failure_detail_stays_internal() {
        let (_, message) =
            ApiError::from(CoreError::StoreFailure("SELECT * FROM sessions".into()))
                .status_and_message();
        assert_eq!(message, "Internal server error");
    }

    #[test]
    fn payload_message_reports_megabytes() {
        let (status, message) = ApiError::PayloadTooLarge {
            limit_bytes: 200 * MIB,
        }
        .status_and_message();
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(message, "Request body too large (max 200 MB)");
    }
}
