use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use confab_core::deadline::with_deadline;
use confab_core::grants::{GrantScope, Recipient, ShareGrant};
use confab_core::store::GrantStore;
use confab_core::{CoreError, SessionId, ShareId, UserId};

use crate::database::{blocking, Database};
use crate::error::StoreError;
use crate::row_helpers;

#[derive(Clone)]
pub struct ShareRepo {
    db: Database,
}

impl ShareRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Add a grant. Recipient emails that belong to an existing user are
    /// linked to that user; the rest stay pending.
    #[instrument(skip(self, scope), fields(session_id = %session_id, visibility = scope.as_str()))]
    pub fn create(
        &self,
        session_id: &SessionId,
        scope: &GrantScope,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ShareGrant, StoreError> {
        let id = ShareId::new();
        let now = Utc::now();
        let now_str = row_helpers::format_ts(now);
        let expires_str = expires_at.map(row_helpers::format_ts);

        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let known: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
                [session_id.as_str()],
                |row| row.get(0),
            )?;
            if !known {
                return Err(StoreError::NotFound(format!("session {session_id}")));
            }

            tx.execute(
                "INSERT INTO session_shares (id, session_id, visibility, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id.as_str(), session_id.as_str(), scope.as_str(), now_str, expires_str],
            )?;

            let scope = match scope {
                GrantScope::Recipients(list) => {
                    let mut linked = Vec::with_capacity(list.len());
                    let mut lookup = tx.prepare("SELECT id FROM users WHERE email = ?1")?;
                    for r in list {
                        let user_id = match &r.user_id {
                            Some(id) => Some(id.clone()),
                            None => {
                                let mut rows = lookup.query([r.email.as_str()])?;
                                match rows.next()? {
                                    Some(row) => Some(UserId::from_raw(row_helpers::get::<String>(
                                        row, 0, "users", "id",
                                    )?)),
                                    None => None,
                                }
                            }
                        };
                        tx.execute(
                            "INSERT INTO session_share_recipients (share_id, email, user_id)
                             VALUES (?1, ?2, ?3)
                             ON CONFLICT(share_id, email) DO NOTHING",
                            rusqlite::params![
                                id.as_str(),
                                r.email,
                                user_id.as_ref().map(UserId::as_str)
                            ],
                        )?;
                        linked.push(Recipient {
                            email: r.email.clone(),
                            user_id,
                        });
                    }
                    GrantScope::Recipients(linked)
                }
                other => other.clone(),
            };

            tx.commit()?;
            info!(share_id = %id, "share created");

            Ok(ShareGrant {
                id,
                session_id: session_id.clone(),
                scope,
                created_at: now,
                expires_at,
                revoked_at: None,
                last_accessed_at: None,
            })
        })
    }

    /// Every grant on the session, revoked and expired ones included,
    /// newest first.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn list_for_session(&self, session_id: &SessionId) -> Result<Vec<ShareGrant>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, visibility, created_at, expires_at, revoked_at, last_accessed_at
                 FROM session_shares WHERE session_id = ?1
                 ORDER BY created_at DESC, id",
            )?;
            let mut recipients = conn.prepare(
                "SELECT email, user_id FROM session_share_recipients
                 WHERE share_id = ?1 ORDER BY email",
            )?;

            let mut rows = stmt.query([session_id.as_str()])?;
            let mut grants = Vec::new();
            while let Some(row) = rows.next()? {
                let id: String = row_helpers::get(row, 0, "session_shares", "id")?;
                let visibility: String = row_helpers::get(row, 2, "session_shares", "visibility")?;
                let scope = match visibility.as_str() {
                    "public" => GrantScope::Public,
                    "system" => GrantScope::System,
                    "recipients" => {
                        let mut list = Vec::new();
                        let mut rrows = recipients.query([id.as_str()])?;
                        while let Some(r) = rrows.next()? {
                            let user_id: Option<String> =
                                row_helpers::get_opt(r, 1, "session_share_recipients", "user_id")?;
                            list.push(Recipient {
                                email: row_helpers::get(r, 0, "session_share_recipients", "email")?,
                                user_id: user_id.map(UserId::from_raw),
                            });
                        }
                        GrantScope::Recipients(list)
                    }
                    other => {
                        return Err(StoreError::CorruptRow {
                            table: "session_shares",
                            column: "visibility",
                            detail: format!("unknown variant: {other}"),
                        })
                    }
                };

                let created_at: String = row_helpers::get(row, 3, "session_shares", "created_at")?;
                grants.push(ShareGrant {
                    id: ShareId::from_raw(id),
                    session_id: SessionId::from_raw(row_helpers::get::<String>(
                        row,
                        1,
                        "session_shares",
                        "session_id",
                    )?),
                    scope,
                    created_at: row_helpers::parse_ts(&created_at, "session_shares", "created_at")?,
                    expires_at: row_helpers::parse_ts_opt(
                        row_helpers::get_opt(row, 4, "session_shares", "expires_at")?,
                        "session_shares",
                        "expires_at",
                    )?,
                    revoked_at: row_helpers::parse_ts_opt(
                        row_helpers::get_opt(row, 5, "session_shares", "revoked_at")?,
                        "session_shares",
                        "revoked_at",
                    )?,
                    last_accessed_at: row_helpers::parse_ts_opt(
                        row_helpers::get_opt(row, 6, "session_shares", "last_accessed_at")?,
                        "session_shares",
                        "last_accessed_at",
                    )?,
                });
            }
            Ok(grants)
        })
    }

    /// Soft-revoke a grant on one of `owner`'s sessions. An unknown share,
    /// someone else's share, and an already revoked share all come back as
    /// `NotFound`.
    #[instrument(skip(self), fields(share_id = %share_id, user_id = %owner))]
    pub fn revoke(&self, share_id: &ShareId, owner: &UserId) -> Result<(), StoreError> {
        let now = row_helpers::format_ts(Utc::now());
        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE session_shares SET revoked_at = ?1
                 WHERE id = ?2 AND revoked_at IS NULL
                   AND session_id IN (SELECT id FROM sessions WHERE user_id = ?3)",
                rusqlite::params![now, share_id.as_str(), owner.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("share {share_id}")));
            }
            info!("share revoked");
            Ok(())
        })
    }

    /// Record that a grant was just used to read its session.
    #[instrument(skip(self), fields(share_id = %share_id))]
    pub fn touch(&self, share_id: &ShareId) -> Result<(), StoreError> {
        let now = row_helpers::format_ts(Utc::now());
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE session_shares SET last_accessed_at = ?1 WHERE id = ?2",
                rusqlite::params![now, share_id.as_str()],
            )?;
            Ok(())
        })
    }

    /// Best-effort async [`ShareRepo::touch`] bounded by `deadline`.
    /// Failures and timeouts are logged only.
    pub async fn record_access(&self, share_id: &ShareId, deadline: Duration) {
        let repo = self.clone();
        let id = share_id.clone();
        let touch = async move { Ok::<_, CoreError>(blocking(move || repo.touch(&id)).await?) };
        if let Err(e) = with_deadline("record share access", deadline, touch).await {
            warn!(share_id = %share_id, error = %e, "failed to record share access");
        }
    }
}

#[async_trait]
impl GrantStore for ShareRepo {
    async fn grants_for_session(&self, id: &SessionId) -> Result<Vec<ShareGrant>, CoreError> {
        let repo = self.clone();
        let id = id.clone();
        Ok(blocking(move || repo.list_for_session(&id)).await?)
    }
}
