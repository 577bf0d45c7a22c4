use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use confab_core::models::{FileEntry, Session, SessionOwner, SessionSummary};
use confab_core::store::{ListedSession, SessionStore};
use confab_core::upload::ValidatedUpload;
use confab_core::{AccessType, CoreError, ListView, SessionId, ShareId, UserId, Watermark};

use crate::database::{blocking, Database};
use crate::error::StoreError;
use crate::row_helpers;

/// A file that made it into object storage during a save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    pub file_type: String,
    pub storage_key: String,
    pub size_bytes: u64,
}

/// Session metadata derived on the server side during a save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedMetadata {
    pub title: Option<String>,
    pub session_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub id: SessionId,
    pub created: bool,
}

#[derive(Clone)]
pub struct SessionRepo {
    db: Database,
}

const SUMMARY_COLUMNS: &str = "s.id, s.user_id, s.external_id, s.title, s.custom_title, s.session_type,
     s.hostname, s.username, s.git_info, s.created_at, s.updated_at,
     (SELECT COUNT(*) FROM session_files f WHERE f.session_id = s.id)";

/// A grant is live when not revoked and not expired at `?2`.
const ACTIVE_SHARE: &str = "sh.revoked_at IS NULL AND (sh.expires_at IS NULL OR sh.expires_at > ?2)";

/// Shares that open a session to user `?1`: system shares, and recipient
/// shares naming them by id or, while pending, by email.
const SHARE_REACHES_USER: &str = "(sh.visibility = 'system'
      OR (sh.visibility = 'recipients' AND EXISTS (
          SELECT 1 FROM session_share_recipients r
          WHERE r.share_id = sh.id
            AND (r.user_id = ?1
                 OR (r.user_id IS NULL AND r.email = (SELECT email FROM users WHERE id = ?1))))))";

impl SessionRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or update the owner's session keyed by external id, then upsert
    /// manifest entries by path. Files not in `stored` keep their old entry.
    #[instrument(skip_all, fields(user_id = %owner, file_count = stored.len()))]
    pub fn save_upload(
        &self,
        owner: &UserId,
        upload: &ValidatedUpload,
        meta: &DerivedMetadata,
        stored: &[StoredFile],
    ) -> Result<SaveOutcome, StoreError> {
        let now = row_helpers::format_ts(Utc::now());
        let git_info = upload
            .git_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.db.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM sessions WHERE user_id = ?1 AND external_id = ?2",
                    rusqlite::params![owner.as_str(), upload.external_id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            let (id, created) = match existing {
                Some(raw) => {
                    let id = SessionId::from_raw(raw);
                    tx.execute(
                        "UPDATE sessions SET
                            title = COALESCE(?1, title), session_type = ?2, hostname = ?3,
                            username = ?4, cwd = ?5, transcript_path = ?6, reason = ?7,
                            git_info = COALESCE(?8, git_info), updated_at = ?9
                         WHERE id = ?10",
                        rusqlite::params![
                            meta.title,
                            meta.session_type,
                            upload.hostname,
                            upload.username,
                            upload.cwd,
                            upload.transcript_path,
                            upload.reason,
                            git_info,
                            now,
                            id.as_str(),
                        ],
                    )?;
                    (id, false)
                }
                None => {
                    let id = SessionId::new();
                    tx.execute(
                        "INSERT INTO sessions (id, user_id, external_id, title, session_type, hostname,
                                               username, cwd, transcript_path, reason, git_info,
                                               created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                        rusqlite::params![
                            id.as_str(),
                            owner.as_str(),
                            upload.external_id,
                            meta.title,
                            meta.session_type,
                            upload.hostname,
                            upload.username,
                            upload.cwd,
                            upload.transcript_path,
                            upload.reason,
                            git_info,
                            now,
                        ],
                    )?;
                    (id, true)
                }
            };

            for file in stored {
                tx.execute(
                    "INSERT INTO session_files (session_id, path, file_type, storage_key, size_bytes, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(session_id, path) DO UPDATE SET
                        file_type = excluded.file_type,
                        storage_key = excluded.storage_key,
                        size_bytes = excluded.size_bytes,
                        updated_at = excluded.updated_at",
                    rusqlite::params![
                        id.as_str(),
                        file.path,
                        file.file_type,
                        file.storage_key,
                        file.size_bytes as i64,
                        now,
                    ],
                )?;
            }

            tx.commit()?;
            info!(session_id = %id, created, "session saved");
            Ok(SaveOutcome { id, created })
        })
    }

    /// Full record including the file manifest.
    #[instrument(skip(self), fields(session_id = %id))]
    pub fn get(&self, id: &SessionId) -> Result<Session, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, external_id, title, custom_title, session_type, hostname,
                        username, cwd, transcript_path, git_info, created_at, updated_at
                 FROM sessions WHERE id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            let mut session = match rows.next()? {
                Some(row) => row_to_session(row)?,
                None => return Err(StoreError::NotFound(format!("session {id}"))),
            };

            let mut stmt = conn.prepare(
                "SELECT path, storage_key, size_bytes, updated_at
                 FROM session_files WHERE session_id = ?1 ORDER BY path",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            while let Some(row) = rows.next()? {
                session.files.push(row_to_file(row)?);
            }
            Ok(session)
        })
    }

    #[instrument(skip(self), fields(session_id = %id))]
    pub fn owner_of(&self, id: &SessionId) -> Result<SessionOwner, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.user_id, u.status FROM sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.id = ?1",
            )?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => {
                    let user_id: String = row_helpers::get(row, 0, "sessions", "user_id")?;
                    let status: String = row_helpers::get(row, 1, "users", "status")?;
                    let status: crate::users::UserStatus =
                        row_helpers::parse_enum(&status, "users", "status")?;
                    Ok(SessionOwner {
                        user_id: UserId::from_raw(user_id),
                        active: status == crate::users::UserStatus::Active,
                    })
                }
                None => Err(StoreError::NotFound(format!("session {id}"))),
            }
        })
    }

    /// The caller's own sessions, most recently updated first.
    #[instrument(skip(self), fields(user_id = %user))]
    pub fn list_owned(&self, user: &UserId) -> Result<Vec<SessionSummary>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUMMARY_COLUMNS} FROM sessions s
                 WHERE s.user_id = ?1
                 ORDER BY s.updated_at DESC, s.id"
            ))?;
            let mut rows = stmt.query([user.as_str()])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_summary(row)?);
            }
            Ok(results)
        })
    }

    /// Sessions other users opened to `user` through a live recipient or
    /// system grant. One row per session; a recipient grant outranks a
    /// system grant, and the newest grant of a kind wins. Sessions of
    /// inactive owners are left out since their grants no longer work.
    #[instrument(skip(self), fields(user_id = %user))]
    pub fn list_shared(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ListedSession>, StoreError> {
        let now = row_helpers::format_ts(now);
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUMMARY_COLUMNS}, sh.id, sh.visibility, sh.created_at
                 FROM session_shares sh
                 JOIN sessions s ON s.id = sh.session_id
                 JOIN users owner ON owner.id = s.user_id
                 WHERE {ACTIVE_SHARE}
                   AND {SHARE_REACHES_USER}
                   AND s.user_id != ?1
                   AND owner.status = 'active'"
            ))?;
            let mut rows = stmt.query(rusqlite::params![user.as_str(), now])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                let summary = row_to_summary(row)?;
                let share_id: String = row_helpers::get(row, 12, "session_shares", "id")?;
                let visibility: String = row_helpers::get(row, 13, "session_shares", "visibility")?;
                let created_at: String = row_helpers::get(row, 14, "session_shares", "created_at")?;
                let access = match visibility.as_str() {
                    "recipients" => AccessType::Recipient {
                        share_id: ShareId::from_raw(share_id),
                    },
                    "system" => AccessType::System {
                        share_id: ShareId::from_raw(share_id),
                    },
                    other => {
                        return Err(StoreError::CorruptRow {
                            table: "session_shares",
                            column: "visibility",
                            detail: format!("unexpected visibility in shared list: {other}"),
                        })
                    }
                };
                results.push((ListedSession { summary, access }, created_at));
            }
            Ok(results)
        })?;

        Ok(dedupe_shared(rows))
    }

    /// Aggregate modification state of one list view for `user`.
    #[instrument(skip(self), fields(user_id = %user, view = %view))]
    pub fn watermark(
        &self,
        user: &UserId,
        view: ListView,
        now: DateTime<Utc>,
    ) -> Result<Watermark, StoreError> {
        match view {
            ListView::Owned => self.db.with_conn(|conn| {
                let (latest, count): (Option<String>, i64) = conn.query_row(
                    "SELECT MAX(MAX(created_at, updated_at)), COUNT(*) FROM sessions WHERE user_id = ?1",
                    [user.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok(Watermark {
                    latest: row_helpers::parse_ts_opt(latest, "sessions", "updated_at")?,
                    count: count as u64,
                })
            }),
            ListView::SharedWithMe => {
                let listed = self.list_shared(user, now)?;
                let session_latest = listed
                    .iter()
                    .map(|l| l.summary.created_at.max(l.summary.updated_at))
                    .max();

                // Grant churn (new shares, revocations) counts even when the
                // visible set looks the same.
                let grant_latest: Option<String> = self.db.with_conn(|conn| {
                    Ok(conn.query_row(
                        &format!(
                            "SELECT MAX(MAX(sh.created_at, COALESCE(sh.revoked_at, '')))
                             FROM session_shares sh
                             JOIN sessions s ON s.id = sh.session_id
                             WHERE {SHARE_REACHES_USER} AND s.user_id != ?1"
                        ),
                        [user.as_str()],
                        |row| row.get(0),
                    )?)
                })?;
                let grant_latest =
                    row_helpers::parse_ts_opt(grant_latest, "session_shares", "created_at")?;

                Ok(Watermark {
                    latest: session_latest.max(grant_latest),
                    count: listed.len() as u64,
                })
            }
        }
    }

    /// Set or clear the owner-chosen title. The caller is responsible for
    /// checking ownership first.
    #[instrument(skip(self, title), fields(session_id = %id))]
    pub fn set_custom_title(&self, id: &SessionId, title: Option<&str>) -> Result<(), StoreError> {
        let now = row_helpers::format_ts(Utc::now());
        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE sessions SET custom_title = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![title, now, id.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("session {id}")));
            }
            debug!(cleared = title.is_none(), "custom title updated");
            Ok(())
        })
    }

    /// Which of `external_ids` the owner has already uploaded.
    #[instrument(skip(self, external_ids), fields(user_id = %owner, count = external_ids.len()))]
    pub fn existing_external_ids(
        &self,
        owner: &UserId,
        external_ids: &[String],
    ) -> Result<Vec<String>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT 1 FROM sessions WHERE user_id = ?1 AND external_id = ?2")?;
            let mut found = Vec::new();
            for ext in external_ids {
                if stmt.exists(rusqlite::params![owner.as_str(), ext])? {
                    found.push(ext.clone());
                }
            }
            Ok(found)
        })
    }
}

fn access_rank(access: &AccessType) -> u8 {
    match access {
        AccessType::Owner => 0,
        AccessType::Recipient { .. } => 1,
        AccessType::System { .. } => 2,
        AccessType::Public { .. } => 3,
        AccessType::None => 4,
    }
}

fn dedupe_shared(rows: Vec<(ListedSession, String)>) -> Vec<ListedSession> {
    let mut best: HashMap<SessionId, (ListedSession, String)> = HashMap::new();
    for (listed, grant_created) in rows {
        match best.get(&listed.summary.id) {
            Some((current, current_created)) => {
                let better = (access_rank(&listed.access), std::cmp::Reverse(&grant_created))
                    < (access_rank(&current.access), std::cmp::Reverse(current_created));
                if better {
                    best.insert(listed.summary.id.clone(), (listed, grant_created));
                }
            }
            None => {
                best.insert(listed.summary.id.clone(), (listed, grant_created));
            }
        }
    }
    let mut out: Vec<ListedSession> = best.into_values().map(|(l, _)| l).collect();
    out.sort_by(|a, b| {
        b.summary
            .updated_at
            .cmp(&a.summary.updated_at)
            .then_with(|| a.summary.id.cmp(&b.summary.id))
    });
    out
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, StoreError> {
    let git_info: Option<String> = row_helpers::get_opt(row, 10, "sessions", "git_info")?;
    let created_at: String = row_helpers::get(row, 11, "sessions", "created_at")?;
    let updated_at: String = row_helpers::get(row, 12, "sessions", "updated_at")?;
    Ok(Session {
        id: SessionId::from_raw(row_helpers::get::<String>(row, 0, "sessions", "id")?),
        owner_id: UserId::from_raw(row_helpers::get::<String>(row, 1, "sessions", "user_id")?),
        external_id: row_helpers::get(row, 2, "sessions", "external_id")?,
        title: row_helpers::get_opt(row, 3, "sessions", "title")?,
        custom_title: row_helpers::get_opt(row, 4, "sessions", "custom_title")?,
        session_type: row_helpers::get(row, 5, "sessions", "session_type")?,
        hostname: row_helpers::get_opt(row, 6, "sessions", "hostname")?,
        username: row_helpers::get_opt(row, 7, "sessions", "username")?,
        cwd: row_helpers::get_opt(row, 8, "sessions", "cwd")?,
        transcript_path: row_helpers::get_opt(row, 9, "sessions", "transcript_path")?,
        git_info: git_info
            .map(|raw| row_helpers::parse_json(&raw, "sessions", "git_info"))
            .transpose()?,
        files: Vec::new(),
        created_at: row_helpers::parse_ts(&created_at, "sessions", "created_at")?,
        updated_at: row_helpers::parse_ts(&updated_at, "sessions", "updated_at")?,
    })
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> Result<SessionSummary, StoreError> {
    let git_info: Option<String> = row_helpers::get_opt(row, 8, "sessions", "git_info")?;
    let created_at: String = row_helpers::get(row, 9, "sessions", "created_at")?;
    let updated_at: String = row_helpers::get(row, 10, "sessions", "updated_at")?;
    let file_count: i64 = row_helpers::get(row, 11, "session_files", "count")?;
    Ok(SessionSummary {
        id: SessionId::from_raw(row_helpers::get::<String>(row, 0, "sessions", "id")?),
        owner_id: UserId::from_raw(row_helpers::get::<String>(row, 1, "sessions", "user_id")?),
        external_id: row_helpers::get(row, 2, "sessions", "external_id")?,
        title: row_helpers::get_opt(row, 3, "sessions", "title")?,
        custom_title: row_helpers::get_opt(row, 4, "sessions", "custom_title")?,
        session_type: row_helpers::get(row, 5, "sessions", "session_type")?,
        hostname: row_helpers::get_opt(row, 6, "sessions", "hostname")?,
        username: row_helpers::get_opt(row, 7, "sessions", "username")?,
        git_info: git_info
            .map(|raw| row_helpers::parse_json(&raw, "sessions", "git_info"))
            .transpose()?,
        file_count: file_count as u32,
        created_at: row_helpers::parse_ts(&created_at, "sessions", "created_at")?,
        updated_at: row_helpers::parse_ts(&updated_at, "sessions", "updated_at")?,
    })
}

fn row_to_file(row: &rusqlite::Row<'_>) -> Result<FileEntry, StoreError> {
    let size: i64 = row_helpers::get(row, 2, "session_files", "size_bytes")?;
    let updated_at: String = row_helpers::get(row, 3, "session_files", "updated_at")?;
    Ok(FileEntry {
        path: row_helpers::get(row, 0, "session_files", "path")?,
        storage_key: row_helpers::get(row, 1, "session_files", "storage_key")?,
        size_bytes: size as u64,
        updated_at: row_helpers::parse_ts(&updated_at, "session_files", "updated_at")?,
    })
}

#[async_trait]
impl SessionStore for SessionRepo {
    async fn get_by_id(&self, id: &SessionId) -> Result<Session, CoreError> {
        let repo = self.clone();
        let id = id.clone();
        Ok(blocking(move || repo.get(&id)).await?)
    }

    async fn owner_of(&self, id: &SessionId) -> Result<SessionOwner, CoreError> {
        let repo = self.clone();
        let id = id.clone();
        Ok(blocking(move || repo.owner_of(&id)).await?)
    }

    async fn list_for_user(
        &self,
        user: &UserId,
        view: ListView,
    ) -> Result<Vec<ListedSession>, CoreError> {
        let repo = self.clone();
        let user = user.clone();
        let listed = blocking(move || match view {
            ListView::Owned => Ok(repo
                .list_owned(&user)?
                .into_iter()
                .map(|summary| ListedSession {
                    summary,
                    access: AccessType::Owner,
                })
                .collect()),
            ListView::SharedWithMe => repo.list_shared(&user, Utc::now()),
        })
        .await?;
        Ok(listed)
    }

    async fn watermark(&self, user: &UserId, view: ListView) -> Result<Watermark, CoreError> {
        let repo = self.clone();
        let user = user.clone();
        Ok(blocking(move || repo.watermark(&user, view, Utc::now())).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::ShareRepo;
    use crate::users::{UserRepo, UserStatus};
    use confab_core::grants::{GrantScope, Recipient};
    use confab_core::upload::ValidatedFile;

    struct Fixture {
        users: UserRepo,
        sessions: SessionRepo,
        shares: ShareRepo,
    }

    fn fixture() -> Fixture {
        let db = Database::in_memory().unwrap();
        Fixture {
            users: UserRepo::new(db.clone()),
            sessions: SessionRepo::new(db.clone()),
            shares: ShareRepo::new(db),
        }
    }

    fn upload(external_id: &str) -> ValidatedUpload {
        ValidatedUpload {
            external_id: external_id.into(),
            transcript_path: "/home/dev/.claude/t.jsonl".into(),
            cwd: Some("/home/dev/project".into()),
            reason: None,
            hostname: Some("workstation.local".into()),
            username: Some("developer".into()),
            git_info: Some(serde_json::json!({"branch": "main"})),
            files: vec![ValidatedFile {
                path: "t.jsonl".into(),
                file_type: "transcript".into(),
                content: b"{}".to_vec(),
            }],
            total_bytes: 2,
        }
    }

    fn meta(title: &str) -> DerivedMetadata {
        DerivedMetadata {
            title: Some(title.into()),
            session_type: "Claude Code".into(),
        }
    }

    fn stored(path: &str, key: &str, size: u64) -> StoredFile {
        StoredFile {
            path: path.into(),
            file_type: "transcript".into(),
            storage_key: key.into(),
            size_bytes: size,
        }
    }

    #[test]
    fn save_creates_then_updates() {
        let f = fixture();
        let owner = f.users.create("a@example.com", None).unwrap();

        let first = f
            .sessions
            .save_upload(&owner.id, &upload("ext-1"), &meta("First"), &[stored("t.jsonl", "k1", 2)])
            .unwrap();
        assert!(first.created);

        let second = f
            .sessions
            .save_upload(
                &owner.id,
                &upload("ext-1"),
                &meta("Second"),
                &[stored("t.jsonl", "k2", 5), stored("agent.jsonl", "k3", 1)],
            )
            .unwrap();
        assert!(!second.created);
        assert_eq!(first.id, second.id);

        let session = f.sessions.get(&first.id).unwrap();
        assert_eq!(session.title.as_deref(), Some("Second"));
        assert_eq!(session.files.len(), 2);
        let transcript = session.files.iter().find(|f| f.path == "t.jsonl").unwrap();
        assert_eq!(transcript.storage_key, "k2");
        assert_eq!(transcript.size_bytes, 5);
        assert_eq!(session.hostname.as_deref(), Some("workstation.local"));
        assert_eq!(session.git_info, Some(serde_json::json!({"branch": "main"})));
    }

    #[test]
    fn same_external_id_for_different_owners_is_separate() {
        let f = fixture();
        let a = f.users.create("a@example.com", None).unwrap();
        let b = f.users.create("b@example.com", None).unwrap();
        let sa = f.sessions.save_upload(&a.id, &upload("ext"), &meta("t"), &[]).unwrap();
        let sb = f.sessions.save_upload(&b.id, &upload("ext"), &meta("t"), &[]).unwrap();
        assert_ne!(sa.id, sb.id);
        assert!(sb.created);
    }

    #[test]
    fn get_missing_session_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.sessions.get(&SessionId::new()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn owner_of_reports_account_state() {
        let f = fixture();
        let owner = f.users.create("a@example.com", None).unwrap();
        let saved = f.sessions.save_upload(&owner.id, &upload("x"), &meta("t"), &[]).unwrap();

        assert!(f.sessions.owner_of(&saved.id).unwrap().active);
        f.users.set_status(&owner.id, UserStatus::Inactive).unwrap();
        let info = f.sessions.owner_of(&saved.id).unwrap();
        assert_eq!(info.user_id, owner.id);
        assert!(!info.active);
    }

    #[test]
    fn owned_watermark_tracks_changes() {
        let f = fixture();
        let owner = f.users.create("a@example.com", None).unwrap();
        let now = Utc::now();

        let empty = f.sessions.watermark(&owner.id, ListView::Owned, now).unwrap();
        assert_eq!(empty, Watermark::default());

        let saved = f.sessions.save_upload(&owner.id, &upload("x"), &meta("t"), &[]).unwrap();
        let one = f.sessions.watermark(&owner.id, ListView::Owned, now).unwrap();
        assert_eq!(one.count, 1);
        assert!(one.latest.is_some());

        f.sessions.set_custom_title(&saved.id, Some("Renamed")).unwrap();
        let renamed = f.sessions.watermark(&owner.id, ListView::Owned, now).unwrap();
        assert!(renamed.latest > one.latest);
    }

    #[test]
    fn shared_list_dedupes_and_prefers_recipient() {
        let f = fixture();
        let owner = f.users.create("owner@example.com", None).unwrap();
        let viewer = f.users.create("viewer@example.com", None).unwrap();
        let saved = f.sessions.save_upload(&owner.id, &upload("x"), &meta("t"), &[]).unwrap();

        f.shares.create(&saved.id, &GrantScope::System, None).unwrap();
        let named = f
            .shares
            .create(
                &saved.id,
                &GrantScope::Recipients(vec![Recipient {
                    email: "viewer@example.com".into(),
                    user_id: None,
                }]),
                None,
            )
            .unwrap();

        let listed = f.sessions.list_shared(&viewer.id, Utc::now()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(
            listed[0].access,
            AccessType::Recipient { share_id: named.id }
        );

        // The owner never sees their own session in the shared view.
        assert!(f.sessions.list_shared(&owner.id, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn shared_list_excludes_public_revoked_and_inactive_owner() {
        let f = fixture();
        let owner = f.users.create("owner@example.com", None).unwrap();
        let viewer = f.users.create("viewer@example.com", None).unwrap();
        let saved = f.sessions.save_upload(&owner.id, &upload("x"), &meta("t"), &[]).unwrap();

        f.shares.create(&saved.id, &GrantScope::Public, None).unwrap();
        assert!(f.sessions.list_shared(&viewer.id, Utc::now()).unwrap().is_empty());

        let system = f.shares.create(&saved.id, &GrantScope::System, None).unwrap();
        assert_eq!(f.sessions.list_shared(&viewer.id, Utc::now()).unwrap().len(), 1);

        f.users.set_status(&owner.id, UserStatus::Inactive).unwrap();
        assert!(f.sessions.list_shared(&viewer.id, Utc::now()).unwrap().is_empty());

        f.users.set_status(&owner.id, UserStatus::Active).unwrap();
        f.shares.revoke(&system.id, &owner.id).unwrap();
        assert!(f.sessions.list_shared(&viewer.id, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn shared_watermark_moves_on_revocation() {
        let f = fixture();
        let owner = f.users.create("owner@example.com", None).unwrap();
        let viewer = f.users.create("viewer@example.com", None).unwrap();
        let saved = f.sessions.save_upload(&owner.id, &upload("x"), &meta("t"), &[]).unwrap();

        let first = f.shares.create(&saved.id, &GrantScope::System, None).unwrap();
        let _second = f.shares.create(&saved.id, &GrantScope::System, None).unwrap();
        let before = f
            .sessions
            .watermark(&viewer.id, ListView::SharedWithMe, Utc::now())
            .unwrap();
        assert_eq!(before.count, 1);

        f.shares.revoke(&first.id, &owner.id).unwrap();
        let after = f
            .sessions
            .watermark(&viewer.id, ListView::SharedWithMe, Utc::now())
            .unwrap();
        assert_eq!(after.count, 1);
        assert!(after.latest > before.latest);
    }

    #[test]
    fn existing_external_ids_only_reports_own() {
        let f = fixture();
        let a = f.users.create("a@example.com", None).unwrap();
        let b = f.users.create("b@example.com", None).unwrap();
        f.sessions.save_upload(&a.id, &upload("one"), &meta("t"), &[]).unwrap();
        f.sessions.save_upload(&b.id, &upload("two"), &meta("t"), &[]).unwrap();

        let found = f
            .sessions
            .existing_external_ids(&a.id, &["one".into(), "two".into(), "three".into()])
            .unwrap();
        assert_eq!(found, vec!["one".to_string()]);
    }

    #[test]
    fn set_custom_title_on_missing_session() {
        let f = fixture();
        assert!(matches!(
            f.sessions.set_custom_title(&SessionId::new(), Some("x")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn trait_get_maps_not_found() {
        let f = fixture();
        let store: &dyn SessionStore = &f.sessions;
        assert!(matches!(
            store.get_by_id(&SessionId::new()).await,
            Err(CoreError::NotFound)
        ));
    }
}
