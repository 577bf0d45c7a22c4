//! Owner-facing share management. System shares are an operator action and
//! have no endpoint here.

use std::collections::HashSet;
use std::sync::LazyLock;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{info, instrument};

use confab_core::deadline::with_deadline;
use confab_core::grants::{GrantScope, Recipient, ShareGrant};
use confab_core::models::Viewer;
use confab_core::store::SessionStore;
use confab_core::{CoreError, SessionId, ShareId};
use confab_store::StoreError;

use crate::error::ApiError;
use crate::extract::{JsonBody, RequireViewer};
use crate::state::AppState;

pub const MAX_RECIPIENTS: usize = 50;
pub const MAX_EXPIRY_DAYS: u32 = 365;
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Local part of printable specials, then a dotted domain with a TLD.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .unwrap()
});

pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH || !EMAIL.is_match(email) {
        return false;
    }
    match email.split_once('@') {
        Some((local, _)) => !local.contains(".."),
        None => false,
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    #[serde(default)]
    pub visibility: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub expires_in_days: Option<u32>,
}

/// Turn a create request into a grant scope, or the first thing wrong with
/// it. Emails are lowercased and deduplicated.
pub fn parse_scope(request: &CreateShareRequest, owner: &Viewer) -> Result<GrantScope, ApiError> {
    match request.visibility.as_str() {
        "public" => Ok(GrantScope::Public),
        "recipients" => {
            if request.recipients.is_empty() {
                return Err(ApiError::invalid("recipients are required for a recipient share"));
            }
            if request.recipients.len() > MAX_RECIPIENTS {
                return Err(ApiError::invalid(format!(
                    "too many recipients (max {MAX_RECIPIENTS}, got {})",
                    request.recipients.len()
                )));
            }

            let mut seen = HashSet::new();
            let mut list = Vec::with_capacity(request.recipients.len());
            for raw in &request.recipients {
                let email = raw.trim().to_lowercase();
                if !is_valid_email(&email) {
                    return Err(ApiError::invalid(format!("invalid email address: {email}")));
                }
                if email.eq_ignore_ascii_case(&owner.email) {
                    return Err(ApiError::invalid("cannot share a session with yourself"));
                }
                if seen.insert(email.clone()) {
                    list.push(Recipient {
                        email,
                        user_id: None,
                    });
                }
            }
            Ok(GrantScope::Recipients(list))
        }
        _ => Err(ApiError::invalid(
            "visibility must be 'public' or 'recipients'",
        )),
    }
}

/// Share endpoints answer 404 to anyone but the owner.
async fn require_owner(state: &AppState, session_id: &SessionId, viewer: &Viewer) -> Result<(), ApiError> {
    let owner = with_deadline(
        "resolve session owner",
        state.config.database_timeout,
        SessionStore::owner_of(&state.sessions, session_id),
    )
    .await?;
    if owner.user_id != viewer.user_id {
        return Err(CoreError::NotFound.into());
    }
    Ok(())
}

/// POST /api/v1/sessions/{id}/shares
#[instrument(skip_all, fields(session_id = %id, user_id = %viewer.user_id))]
pub async fn create_share(
    State(state): State<AppState>,
    RequireViewer(viewer): RequireViewer,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<CreateShareRequest>,
) -> Result<(StatusCode, Json<ShareGrant>), ApiError> {
    let session_id = SessionId::from_raw(id);
    require_owner(&state, &session_id, &viewer).await?;

    let scope = parse_scope(&request, &viewer)?;
    let expires_at = match request.expires_in_days {
        None => None,
        Some(days) if (1..=MAX_EXPIRY_DAYS).contains(&days) => {
            Some(Utc::now() + Duration::days(i64::from(days)))
        }
        Some(_) => {
            return Err(ApiError::invalid(format!(
                "expires_in_days must be between 1 and {MAX_EXPIRY_DAYS}"
            )))
        }
    };

    let repo = state.shares.clone();
    let grant = state
        .db("create share", move || repo.create(&session_id, &scope, expires_at))
        .await?;

    info!(share_id = %grant.id, visibility = grant.scope.as_str(), "share created");
    Ok((StatusCode::CREATED, Json(grant)))
}

/// GET /api/v1/sessions/{id}/shares
pub async fn list_shares(
    State(state): State<AppState>,
    RequireViewer(viewer): RequireViewer,
    Path(id): Path<String>,
) -> Result<Json<Vec<ShareGrant>>, ApiError> {
    let session_id = SessionId::from_raw(id);
    require_owner(&state, &session_id, &viewer).await?;

    let repo = state.shares.clone();
    let grants = state
        .db("list shares", move || repo.list_for_session(&session_id))
        .await?;
    Ok(Json(grants))
}

/// DELETE /api/v1/shares/{share_id}
#[instrument(skip_all, fields(share_id = %share_id, user_id = %viewer.user_id))]
pub async fn revoke_share(
    State(state): State<AppState>,
    RequireViewer(viewer): RequireViewer,
    Path(share_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let share_id = ShareId::from_raw(share_id);
    let repo = state.shares.clone();
    let owner = viewer.user_id.clone();

    let revoked = with_deadline("revoke share", state.config.database_timeout, async move {
        tokio::task::spawn_blocking(move || match repo.revoke(&share_id, &owner) {
            Ok(()) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(CoreError::from(e)),
        })
        .await
        .map_err(|e| CoreError::StoreFailure(format!("blocking task failed: {e}")))?
    })
    .await?;

    if revoked {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::ShareNotFound)
    }
}
