//! Per-response logging.
//!
//! The middleware builds one [`ResponseRecord`] after the response is
//! produced and hands it to [`ResponseRecord::emit`]. Nothing is captured
//! through shared mutable state; body previews are only taken when debug
//! logging was switched on in the server configuration.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, info, warn};

use confab_core::sanitize::sanitize_for_display;

use crate::error::ApiError;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const PREVIEW_LIMIT: usize = 10 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseRecord {
    pub method: Method,
    pub path: String,
    pub status: StatusCode,
    pub latency: Duration,
    pub request_id: Option<String>,
    pub request_preview: Option<String>,
    pub response_preview: Option<String>,
}

impl ResponseRecord {
    pub fn emit(&self) {
        let request_id = self.request_id.as_deref().unwrap_or("-");
        let latency_ms = self.latency.as_millis() as u64;
        let status = self.status.as_u16();

        if self.status.is_server_error() {
            error!(method = %self.method, path = %self.path, status, latency_ms, request_id, "request failed");
        } else if self.status.is_client_error() {
            warn!(method = %self.method, path = %self.path, status, latency_ms, request_id, "request rejected");
        } else {
            info!(method = %self.method, path = %self.path, status, latency_ms, request_id, "request completed");
        }

        if let Some(body) = &self.request_preview {
            debug!(request_id, body = %body, "request body");
        }
        if let Some(body) = &self.response_preview {
            debug!(request_id, body = %body, "response body");
        }
    }
}

/// Printable, NUL-free prefix of a body, cut at [`PREVIEW_LIMIT`] bytes.
pub fn preview(bytes: &[u8]) -> String {
    let cut = &bytes[..bytes.len().min(PREVIEW_LIMIT)];
    let mut text = sanitize_for_display(cut);
    if bytes.len() > PREVIEW_LIMIT {
        text.push_str("... (truncated)");
    }
    text
}

pub async fn log_responses(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let debug_bodies = state.config.debug_logging;

    let (req, request_preview) = if debug_bodies {
        let limit = state.config.tiers.outer_body_limit();
        let (parts, body) = req.into_parts();
        match axum::body::to_bytes(body, usize::try_from(limit).unwrap_or(usize::MAX)).await {
            Ok(bytes) => {
                let shown = (!bytes.is_empty()).then(|| preview(&bytes));
                (Request::from_parts(parts, Body::from(bytes)), shown)
            }
            Err(_) => {
                let response = ApiError::PayloadTooLarge { limit_bytes: limit }.into_response();
                ResponseRecord {
                    method,
                    path,
                    status: response.status(),
                    latency: started.elapsed(),
                    request_id,
                    request_preview: None,
                    response_preview: None,
                }
                .emit();
                return response;
            }
        }
    } else {
        (req, None)
    };

    let response = next.run(req).await;

    let (response, response_preview) = if debug_bodies {
        let (parts, body) = response.into_parts();
        match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => {
                let shown = (!bytes.is_empty()).then(|| preview(&bytes));
                (Response::from_parts(parts, Body::from(bytes)), shown)
            }
            Err(e) => {
                warn!(error = %e, "failed to buffer response body");
                (StatusCode::INTERNAL_SERVER_ERROR.into_response(), None)
            }
        }
    } else {
        (response, None)
    };

    ResponseRecord {
        method,
        path,
        status: response.status(),
        latency: started.elapsed(),
        request_id,
        request_preview,
        response_preview,
    }
    .emit();

    response
}
