use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, ShareId, UserId};
use crate::models::Viewer;

/// A named recipient on a private share. `user_id` is `None` while the
/// invitation is pending (no account with that email existed yet).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub user_id: Option<UserId>,
}

impl Recipient {
    /// Linked recipients match on identity; pending ones on email.
    pub fn matches(&self, viewer: &Viewer) -> bool {
        match &self.user_id {
            Some(id) => *id == viewer.user_id,
            None => self.email.eq_ignore_ascii_case(&viewer.email),
        }
    }
}

/// Who a grant opens the session to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "visibility", content = "recipients", rename_all = "snake_case")]
pub enum GrantScope {
    Public,
    System,
    Recipients(Vec<Recipient>),
}

impl GrantScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::System => "system",
            Self::Recipients(_) => "recipients",
        }
    }
}

/// One visibility rule on a session. A session can carry any number of
/// these at once; they are independent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub id: ShareId,
    pub session_id: SessionId,
    #[serde(flatten)]
    pub scope: GrantScope,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl ShareGrant {
    /// Active means not revoked and not past its expiry at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at.map_or(true, |exp| exp > now)
    }

    pub fn names(&self, viewer: &Viewer) -> bool {
        match &self.scope {
            GrantScope::Recipients(list) => list.iter().any(|r| r.matches(viewer)),
            GrantScope::Public | GrantScope::System => false,
        }
    }
}
