//! Canonical session access resolution.
//!
//! Precedence is fixed: owner > recipient > system > public > none. A viewer
//! who owns the session and is also a named recipient resolves to owner.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::deadline::with_deadline;
use crate::errors::{CoreError, Forbidden};
use crate::grants::{GrantScope, ShareGrant};
use crate::ids::{SessionId, ShareId, UserId};
use crate::models::{SessionOwner, Viewer};
use crate::store::{GrantStore, SessionStore};

/// How a viewer reaches a session. Grant-based variants carry the grant
/// that matched so it can be recorded as accessed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessType {
    Owner,
    Recipient { share_id: ShareId },
    System { share_id: ShareId },
    Public { share_id: ShareId },
    None,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Recipient { .. } => "recipient",
            Self::System { .. } => "system",
            Self::Public { .. } => "public",
            Self::None => "none",
        }
    }

    pub fn share_id(&self) -> Option<&ShareId> {
        match self {
            Self::Recipient { share_id } | Self::System { share_id } | Self::Public { share_id } => {
                Some(share_id)
            }
            Self::Owner | Self::None => None,
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }
}

/// Result of [`AccessResolver::resolve`]: the access type plus the owner
/// facts needed to turn it into a final decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub access: AccessType,
    pub owner: SessionOwner,
}

impl Resolution {
    /// Final read decision. No grant is reported as `NotFound`, the same
    /// outcome as a missing session. A disabled owner's grants stop working.
    pub fn authorize(self) -> Result<AccessType, CoreError> {
        match self.access {
            AccessType::Owner => Ok(AccessType::Owner),
            AccessType::None => Err(CoreError::NotFound),
            granted @ (AccessType::Recipient { .. }
            | AccessType::System { .. }
            | AccessType::Public { .. }) => {
                if self.owner.active {
                    Ok(granted)
                } else {
                    Err(CoreError::Forbidden(Forbidden::OwnerInactive))
                }
            }
        }
    }
}

/// Pure precedence evaluation over a grant snapshot.
///
/// Among several matching grants of the same kind the newest wins, so the
/// result does not depend on row order.
pub fn evaluate(
    owner: &UserId,
    grants: &[ShareGrant],
    viewer: Option<&Viewer>,
    now: DateTime<Utc>,
) -> AccessType {
    if viewer.is_some_and(|v| v.user_id == *owner) {
        return AccessType::Owner;
    }

    let mut active: Vec<&ShareGrant> = grants.iter().filter(|g| g.is_active(now)).collect();
    active.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

    if let Some(viewer) = viewer {
        if let Some(g) = active.iter().find(|g| g.names(viewer)) {
            return AccessType::Recipient {
                share_id: g.id.clone(),
            };
        }
        if let Some(g) = active.iter().find(|g| matches!(g.scope, GrantScope::System)) {
            return AccessType::System {
                share_id: g.id.clone(),
            };
        }
    }

    match active.iter().find(|g| matches!(g.scope, GrantScope::Public)) {
        Some(g) => AccessType::Public {
            share_id: g.id.clone(),
        },
        None => AccessType::None,
    }
}

/// Resolves (session, optional viewer) to a single [`AccessType`]. Read-only.
pub struct AccessResolver {
    sessions: Arc<dyn SessionStore>,
    grants: Arc<dyn GrantStore>,
    deadline: Duration,
}

impl AccessResolver {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        grants: Arc<dyn GrantStore>,
        deadline: Duration,
    ) -> Self {
        Self {
            sessions,
            grants,
            deadline,
        }
    }

    #[instrument(skip(self, viewer), fields(session_id = %session_id, viewer_id = tracing::field::Empty))]
    pub async fn resolve(
        &self,
        session_id: &SessionId,
        viewer: Option<&Viewer>,
    ) -> Result<Resolution, CoreError> {
        if let Some(v) = viewer {
            tracing::Span::current().record("viewer_id", v.user_id.as_str());
        }

        let owner = with_deadline(
            "resolve session owner",
            self.deadline,
            self.sessions.owner_of(session_id),
        )
        .await?;

        if viewer.is_some_and(|v| v.user_id == owner.user_id) {
            return Ok(Resolution {
                access: AccessType::Owner,
                owner,
            });
        }

        let grants = with_deadline(
            "load share grants",
            self.deadline,
            self.grants.grants_for_session(session_id),
        )
        .await?;

        let access = evaluate(&owner.user_id, &grants, viewer, Utc::now());
        debug!(access = access.as_str(), grants = grants.len(), "session access resolved");
        Ok(Resolution { access, owner })
    }
}
