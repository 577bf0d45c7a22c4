use std::collections::HashSet;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_LENGTH, ETAG, IF_NONE_MATCH};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use confab_core::deadline::with_deadline;
use confab_core::privacy::{project, project_summary, PublicSessionView};
use confab_core::sanitize::{sanitize_for_display, truncate_for_log};
use confab_core::store::SessionStore;
use confab_core::transcript::extract_metadata;
use confab_core::upload::{validate, SaveSessionRequest};
use confab_core::{AccessType, ConditionalCache, CoreError, Forbidden, ListView, SessionId};
use confab_store::{DerivedMetadata, StoredFile};

use crate::error::ApiError;
use crate::extract::{JsonBody, MaybeViewer, RequireViewer};
use crate::state::AppState;

pub const MAX_CUSTOM_TITLE_CHARS: usize = 255;
pub const MAX_CHECK_IDS: usize = 1000;

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub success: bool,
    pub id: SessionId,
    pub session_id: String,
    pub file_count: usize,
    pub created: bool,
    pub message: &'static str,
}

/// POST /api/v1/sessions
///
/// The body is read against the caller's tier ceiling before it is parsed,
/// then validated in full before anything is written.
#[instrument(skip_all, fields(user_id = %viewer.user_id))]
pub async fn save_session(
    State(state): State<AppState>,
    RequireViewer(viewer): RequireViewer,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<SaveResponse>, ApiError> {
    let tier = state.upload_tier(&viewer.user_id).await?;
    let policy = state.config.tiers.for_tier(tier).clone();
    let limit_bytes = policy.max_body_bytes;

    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit_bytes) {
        return Err(ApiError::PayloadTooLarge { limit_bytes });
    }
    let bytes = axum::body::to_bytes(body, usize::try_from(limit_bytes).unwrap_or(usize::MAX))
        .await
        .map_err(|_| ApiError::PayloadTooLarge { limit_bytes })?;

    let request: SaveSessionRequest =
        serde_json::from_slice(&bytes).map_err(|_| ApiError::InvalidBody)?;

    let mut upload = validate(request, &policy).map_err(|e| {
        info!(tier = %tier, reason = %e, "save rejected");
        ApiError::from(CoreError::from(e))
    })?;
    let external_id = sanitize_for_display(upload.external_id.as_bytes());
    let external_id = truncate_for_log(&external_id, 64).to_string();

    let metadata = extract_metadata(&upload.files);
    let files = std::mem::take(&mut upload.files);

    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        if file.content.is_empty() {
            warn!(
                session_id = %external_id,
                path = %truncate_for_log(&file.path, 256),
                "skipping empty file"
            );
            continue;
        }
        let size_bytes = file.content.len() as u64;
        let storage_key = with_deadline(
            "store session file",
            state.config.storage_timeout,
            state
                .objects
                .put(&viewer.user_id, &upload.external_id, &file.path, file.content),
        )
        .await?;
        stored.push(StoredFile {
            path: file.path,
            file_type: file.file_type,
            storage_key,
            size_bytes,
        });
    }

    let derived = DerivedMetadata {
        title: metadata.title,
        session_type: metadata.session_type,
    };
    let repo = state.sessions.clone();
    let owner = viewer.user_id.clone();
    let file_count = stored.len();
    let ext = upload.external_id.clone();
    let outcome = state
        .db("save session", move || {
            repo.save_upload(&owner, &upload, &derived, &stored)
        })
        .await?;

    info!(
        session_id = %external_id,
        id = %outcome.id,
        file_count,
        created = outcome.created,
        "session saved"
    );

    Ok(Json(SaveResponse {
        success: true,
        id: outcome.id,
        session_id: ext,
        file_count,
        created: outcome.created,
        message: "Session saved successfully",
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub view: String,
}

/// GET /api/v1/sessions?view=owned|shared
pub async fn list_sessions(
    State(state): State<AppState>,
    RequireViewer(viewer): RequireViewer,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let view: ListView = params.view.parse()?;

    let tag = state.cache.compute_etag(&viewer.user_id, view).await?;
    let etag = HeaderValue::from_str(tag.as_str())
        .map_err(|e| CoreError::StoreFailure(format!("unrepresentable etag: {e}")))?;

    let presented = headers.get(IF_NONE_MATCH).and_then(|v| v.to_str().ok());
    if ConditionalCache::is_unchanged(&tag, presented) {
        return Ok((StatusCode::NOT_MODIFIED, [(ETAG, etag)]).into_response());
    }

    let listed = with_deadline(
        "list sessions",
        state.config.database_timeout,
        state.sessions.list_for_user(&viewer.user_id, view),
    )
    .await?;

    let body: Vec<_> = listed
        .iter()
        .map(|l| project_summary(&l.summary, &l.access))
        .collect();

    Ok((StatusCode::OK, [(ETAG, etag)], Json(body)).into_response())
}

/// GET /api/v1/sessions/{id}
///
/// "No such session" and "no grant" produce the same 404.
#[instrument(skip_all, fields(session_id = %id))]
pub async fn get_session(
    State(state): State<AppState>,
    MaybeViewer(viewer): MaybeViewer,
    Path(id): Path<String>,
) -> Result<Json<PublicSessionView>, ApiError> {
    let id = SessionId::from_raw(id);
    let access = state.resolver.resolve(&id, viewer.as_ref()).await?.authorize()?;

    let session = with_deadline(
        "load session",
        state.config.database_timeout,
        state.sessions.get_by_id(&id),
    )
    .await?;

    if let Some(share_id) = access.share_id() {
        state
            .shares
            .record_access(share_id, state.config.database_timeout)
            .await;
    }

    Ok(Json(project(&session, &access)))
}

#[derive(Debug, Deserialize)]
pub struct TitleRequest {
    #[serde(default)]
    pub custom_title: Option<String>,
}

/// PATCH /api/v1/sessions/{id}/title
///
/// Owner only. An empty or `null` title clears the override.
#[instrument(skip_all, fields(session_id = %id, user_id = %viewer.user_id))]
pub async fn update_title(
    State(state): State<AppState>,
    RequireViewer(viewer): RequireViewer,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<TitleRequest>,
) -> Result<Json<PublicSessionView>, ApiError> {
    let title = request
        .custom_title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if title
        .as_ref()
        .is_some_and(|t| t.chars().count() > MAX_CUSTOM_TITLE_CHARS)
    {
        return Err(ApiError::invalid(format!(
            "Custom title exceeds maximum length of {MAX_CUSTOM_TITLE_CHARS} characters"
        )));
    }

    let id = SessionId::from_raw(id);
    let owner = with_deadline(
        "resolve session owner",
        state.config.database_timeout,
        SessionStore::owner_of(&state.sessions, &id),
    )
    .await?;
    if owner.user_id != viewer.user_id {
        return Err(CoreError::Forbidden(Forbidden::NotOwner).into());
    }

    let repo = state.sessions.clone();
    let target = id.clone();
    let session = state
        .db("update custom title", move || {
            repo.set_custom_title(&target, title.as_deref())?;
            repo.get(&target)
        })
        .await?;

    Ok(Json(project(&session, &AccessType::Owner)))
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub session_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub existing: Vec<String>,
    pub missing: Vec<String>,
}

/// POST /api/v1/sessions/check
pub async fn check_sessions(
    State(state): State<AppState>,
    RequireViewer(viewer): RequireViewer,
    JsonBody(request): JsonBody<CheckRequest>,
) -> Result<Json<CheckResponse>, ApiError> {
    let ids = request.session_ids;
    if ids.is_empty() {
        return Err(ApiError::invalid("session_ids is required"));
    }
    if ids.len() > MAX_CHECK_IDS {
        return Err(ApiError::invalid(format!(
            "too many session_ids (max {MAX_CHECK_IDS}, got {})",
            ids.len()
        )));
    }

    let repo = state.sessions.clone();
    let owner = viewer.user_id.clone();
    let lookup = ids.clone();
    let existing = state
        .db("check sessions", move || repo.existing_external_ids(&owner, &lookup))
        .await?;

    let known: HashSet<&str> = existing.iter().map(String::as_str).collect();
    let missing = ids
        .iter()
        .filter(|id| !known.contains(id.as_str()))
        .cloned()
        .collect();

    Ok(Json(CheckResponse { existing, missing }))
}
