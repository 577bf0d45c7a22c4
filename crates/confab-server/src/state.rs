use std::sync::Arc;
use std::time::Instant;

use confab_core::store::{EntitlementLookup, ObjectStore, SessionStore};
use confab_core::{AccessResolver, ConditionalCache, CoreError, UploadTier, UserId};
use confab_store::{Database, SessionRepo, ShareRepo, StoreError, UserRepo};

use crate::config::ServerConfig;

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub users: UserRepo,
    pub sessions: SessionRepo,
    pub shares: ShareRepo,
    pub objects: Arc<dyn ObjectStore>,
    pub resolver: Arc<AccessResolver>,
    pub cache: Arc<ConditionalCache>,
    entitlements: Arc<dyn EntitlementLookup>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, db: Database, objects: Arc<dyn ObjectStore>) -> Self {
        let users = UserRepo::new(db.clone());
        let sessions = SessionRepo::new(db.clone());
        let shares = ShareRepo::new(db);

        let session_store: Arc<dyn SessionStore> = Arc::new(sessions.clone());
        let resolver = AccessResolver::new(
            session_store.clone(),
            Arc::new(shares.clone()),
            config.database_timeout,
        );
        let cache = ConditionalCache::new(session_store, config.database_timeout);

        Self {
            config: Arc::new(config),
            entitlements: Arc::new(users.clone()),
            users,
            sessions,
            shares,
            objects,
            resolver: Arc::new(resolver),
            cache: Arc::new(cache),
            start_time: Instant::now(),
        }
    }

    /// Configured graced users win; otherwise the user table decides.
    pub async fn upload_tier(&self, user: &UserId) -> Result<UploadTier, CoreError> {
        if self.config.graced_users.contains(user) {
            return Ok(UploadTier::Graced);
        }
        confab_core::deadline::with_deadline(
            "look up upload tier",
            self.config.database_timeout,
            self.entitlements.upload_tier(user),
        )
        .await
    }

    /// Run a synchronous repository call on the blocking pool under the
    /// database deadline.
    pub async fn db<T, F>(&self, operation: &'static str, f: F) -> Result<T, CoreError>
    where
        F: FnOnce() -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        confab_core::deadline::with_deadline(operation, self.config.database_timeout, async move {
            tokio::task::spawn_blocking(f)
                .await
                .map_err(|e| CoreError::StoreFailure(format!("blocking task failed: {e}")))?
                .map_err(CoreError::from)
        })
        .await
    }
}
