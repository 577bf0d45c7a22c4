use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, UserId};

/// One stored file belonging to a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub storage_key: String,
    pub size_bytes: u64,
    pub updated_at: DateTime<Utc>,
}

/// A full session record as persisted.
///
/// The PII fields (`hostname`, `username`, `cwd`, `transcript_path`) are
/// always populated here; redaction happens in [`crate::privacy`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub owner_id: UserId,
    pub external_id: String,
    pub title: Option<String>,
    pub custom_title: Option<String>,
    pub session_type: String,
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub cwd: Option<String>,
    pub transcript_path: Option<String>,
    pub git_info: Option<serde_json::Value>,
    pub files: Vec<FileEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row shape used by the list endpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub owner_id: UserId,
    pub external_id: String,
    pub title: Option<String>,
    pub custom_title: Option<String>,
    pub session_type: String,
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub git_info: Option<serde_json::Value>,
    pub file_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An authenticated caller, as handed over by the identity layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: UserId,
    pub email: String,
}

/// Ownership facts the resolver needs about a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOwner {
    pub user_id: UserId,
    pub active: bool,
}
