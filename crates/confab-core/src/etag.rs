//! Entity tags for session lists.
//!
//! A tag is derived from the list's modification watermark and nothing else,
//! so there is no cached state to invalidate. A write racing a read can at
//! worst cause one extra miss.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::deadline::with_deadline;
use crate::errors::CoreError;
use crate::ids::UserId;
use crate::store::SessionStore;

/// Which of a user's session lists is being read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListView {
    #[default]
    Owned,
    SharedWithMe,
}

impl ListView {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owned => "owned",
            Self::SharedWithMe => "shared-with-me",
        }
    }
}

impl fmt::Display for ListView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListView {
    type Err = CoreError;

    /// Accepts the query-string spellings. An absent view means "owned".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "owned" => Ok(Self::Owned),
            "shared" | "shared-with-me" => Ok(Self::SharedWithMe),
            _ => Err(CoreError::InvalidInput(
                "Invalid view parameter, must be 'owned' or 'shared'".to_string(),
            )),
        }
    }
}

/// Aggregate modification state of one list: the newest created/updated
/// instant across its members and the member count. The count makes a
/// removal visible even when it does not move the newest timestamp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Watermark {
    pub latest: Option<DateTime<Utc>>,
    pub count: u64,
}

/// Opaque, quoted entity tag as sent in the `ETag` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityTag(String);

impl EntityTag {
    pub fn from_watermark(view: ListView, mark: &Watermark) -> Self {
        let stamp = match mark.latest {
            Some(t) => format!("{}{:09}", t.timestamp(), t.timestamp_subsec_nanos()),
            None => "0".to_owned(),
        };
        Self(format!("\"{}-{}-{}\"", view.as_str(), stamp, mark.count))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct ConditionalCache {
    sessions: Arc<dyn SessionStore>,
    deadline: Duration,
}

impl ConditionalCache {
    pub fn new(sessions: Arc<dyn SessionStore>, deadline: Duration) -> Self {
        Self { sessions, deadline }
    }

    #[instrument(skip(self), fields(user_id = %user, view = %view))]
    pub async fn compute_etag(&self, user: &UserId, view: ListView) -> Result<EntityTag, CoreError> {
        let mark = with_deadline(
            "read list watermark",
            self.deadline,
            self.sessions.watermark(user, view),
        )
        .await?;
        let tag = EntityTag::from_watermark(view, &mark);
        debug!(etag = %tag, count = mark.count, "computed list etag");
        Ok(tag)
    }

    /// Exact comparison against the presented `If-None-Match` value. No
    /// weak-tag or list parsing.
    pub fn is_unchanged(current: &EntityTag, presented: Option<&str>) -> bool {
        presented.is_some_and(|p| p == current.as_str())
    }
}
