//! Request extractors: caller identity and JSON bodies.
//!
//! Authentication happens upstream; by the time a request arrives here the
//! configured identity header holds the user id, or is absent for anonymous
//! callers. Unknown and inactive users are treated as anonymous.

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use tracing::debug;

use confab_core::deadline::with_deadline;
use confab_core::models::Viewer;
use confab_core::{CoreError, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// The caller, if any.
pub struct MaybeViewer(pub Option<Viewer>);

/// The caller; rejects anonymous requests with 401.
pub struct RequireViewer(pub Viewer);

async fn lookup(parts: &Parts, state: &AppState) -> Result<Option<Viewer>, ApiError> {
    let raw = parts
        .headers
        .get(state.config.identity_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let Some(raw) = raw else {
        return Ok(None);
    };

    let users = state.users.clone();
    let id = UserId::from_raw(raw);
    let viewer = with_deadline("resolve viewer", state.config.database_timeout, async move {
        users.active_viewer(id).await.map_err(CoreError::from)
    })
    .await?;

    if viewer.is_none() {
        debug!("identity header names no active user, treating as anonymous");
    }
    Ok(viewer)
}

impl FromRequestParts<AppState> for MaybeViewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        lookup(parts, state).await.map(Self)
    }
}

impl FromRequestParts<AppState> for RequireViewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        lookup(parts, state).await?.map(Self).ok_or(ApiError::Unauthorized)
    }
}

/// `Json<T>` whose rejection is the uniform "Invalid request body" error.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(reason = %rejection.body_text(), "rejected request body");
                Err(ApiError::InvalidBody)
            }
        }
    }
}
