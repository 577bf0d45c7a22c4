//! Collaborator interfaces the core consumes. Persistence and object storage
//! live behind these; the core never sees SQL or files.

use async_trait::async_trait;

use crate::access::AccessType;
use crate::errors::CoreError;
use crate::etag::{ListView, Watermark};
use crate::grants::ShareGrant;
use crate::ids::{SessionId, UserId};
use crate::models::{Session, SessionOwner, SessionSummary};
use crate::policy::UploadTier;

/// A list row together with the grant that put it in the caller's list.
#[derive(Clone, Debug, PartialEq)]
pub struct ListedSession {
    pub summary: SessionSummary,
    pub access: AccessType,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Full record, or `CoreError::NotFound`.
    async fn get_by_id(&self, id: &SessionId) -> Result<Session, CoreError>;

    /// Owner identity and account state, or `CoreError::NotFound`.
    async fn owner_of(&self, id: &SessionId) -> Result<SessionOwner, CoreError>;

    async fn list_for_user(
        &self,
        user: &UserId,
        view: ListView,
    ) -> Result<Vec<ListedSession>, CoreError>;

    async fn watermark(&self, user: &UserId, view: ListView) -> Result<Watermark, CoreError>;
}

#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Every non-deleted grant on the session, active or not.
    async fn grants_for_session(&self, id: &SessionId) -> Result<Vec<ShareGrant>, CoreError>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` and return the key they can be fetched by.
    async fn put(
        &self,
        owner: &UserId,
        external_id: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<String, CoreError>;
}

/// Maps a user to the upload tier they are entitled to.
#[async_trait]
pub trait EntitlementLookup: Send + Sync {
    async fn upload_tier(&self, user: &UserId) -> Result<UploadTier, CoreError>;
}
