use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use confab_core::models::Viewer;
use confab_core::store::EntitlementLookup;
use confab_core::{CoreError, UploadTier, UserId};

use crate::database::{blocking, Database};
use crate::error::StoreError;
use crate::row_helpers;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown user status: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRow {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub status: UserStatus,
    pub upload_tier: UploadTier,
    pub created_at: String,
}

impl UserRow {
    pub fn viewer(&self) -> Viewer {
        Viewer {
            user_id: self.id.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Clone)]
pub struct UserRepo {
    db: Database,
}

const SELECT_USER: &str = "SELECT id, email, name, status, upload_tier, created_at FROM users";

impl UserRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub fn create(&self, email: &str, name: Option<&str>) -> Result<UserRow, StoreError> {
        let id = UserId::new();
        let now = row_helpers::format_ts(Utc::now());

        self.db.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, name, status, upload_tier, created_at)
                 VALUES (?1, ?2, ?3, 'active', 'standard', ?4)
                 ON CONFLICT(email) DO NOTHING",
                rusqlite::params![id.as_str(), email, name, now],
            )?;
            if inserted == 0 {
                return Err(StoreError::Conflict(format!("user with email {email} exists")));
            }
            info!(user_id = %id, "user created");

            Ok(UserRow {
                id,
                email: email.to_string(),
                name: name.map(str::to_string),
                status: UserStatus::Active,
                upload_tier: UploadTier::Standard,
                created_at: now,
            })
        })
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub fn get(&self, id: &UserId) -> Result<UserRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_USER} WHERE id = ?1"))?;
            let mut rows = stmt.query([id.as_str()])?;
            match rows.next()? {
                Some(row) => row_to_user(row),
                None => Err(StoreError::NotFound(format!("user {id}"))),
            }
        })
    }

    /// Case-insensitive lookup.
    #[instrument(skip(self))]
    pub fn get_by_email(&self, email: &str) -> Result<Option<UserRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_USER} WHERE email = ?1"))?;
            let mut rows = stmt.query([email])?;
            match rows.next()? {
                Some(row) => row_to_user(row).map(Some),
                None => Ok(None),
            }
        })
    }

    /// Resolve an identity handed over by the upstream authenticator. Unknown
    /// and inactive users come back as `None`, i.e. anonymous.
    pub async fn active_viewer(&self, id: UserId) -> Result<Option<Viewer>, StoreError> {
        let repo = self.clone();
        let found = blocking(move || match repo.get(&id) {
            Ok(user) => Ok(Some(user)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        })
        .await?;

        Ok(found
            .filter(|u| u.status == UserStatus::Active)
            .map(|u| u.viewer()))
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub fn set_status(&self, id: &UserId, status: UserStatus) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET status = ?1 WHERE id = ?2",
                rusqlite::params![status.to_string(), id.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("user {id}")));
            }
            info!(status = %status, "user status changed");
            Ok(())
        })
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub fn set_upload_tier(&self, id: &UserId, tier: UploadTier) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET upload_tier = ?1 WHERE id = ?2",
                rusqlite::params![tier.as_str(), id.as_str()],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound(format!("user {id}")));
            }
            Ok(())
        })
    }
}

#[async_trait]
impl EntitlementLookup for UserRepo {
    async fn upload_tier(&self, user: &UserId) -> Result<UploadTier, CoreError> {
        let id = user.clone();
        let tier = self
            .db
            .call(move |conn| {
                let raw: Option<String> = conn
                    .query_row(
                        "SELECT upload_tier FROM users WHERE id = ?1",
                        [id.as_str()],
                        |row| row.get(0),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;
                raw.map(|r| row_helpers::parse_enum(&r, "users", "upload_tier"))
                    .transpose()
            })
            .await?;
        Ok(tier.unwrap_or_default())
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<UserRow, StoreError> {
    let status: String = row_helpers::get(row, 3, "users", "status")?;
    let tier: String = row_helpers::get(row, 4, "users", "upload_tier")?;
    Ok(UserRow {
        id: UserId::from_raw(row_helpers::get::<String>(row, 0, "users", "id")?),
        email: row_helpers::get(row, 1, "users", "email")?,
        name: row_helpers::get_opt(row, 2, "users", "name")?,
        status: row_helpers::parse_enum(&status, "users", "status")?,
        upload_tier: row_helpers::parse_enum(&tier, "users", "upload_tier")?,
        created_at: row_helpers::get(row, 5, "users", "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> UserRepo {
        UserRepo::new(Database::in_memory().unwrap())
    }

    #[test]
    fn create_and_get() {
        let users = repo();
        let created = users.create("dev@example.com", Some("Dev")).unwrap();
        let fetched = users.get(&created.id).unwrap();
        assert_eq!(fetched.email, "dev@example.com");
        assert_eq!(fetched.status, UserStatus::Active);
        assert_eq!(fetched.upload_tier, UploadTier::Standard);
    }

    #[test]
    fn duplicate_email_conflicts_case_insensitively() {
        let users = repo();
        users.create("dev@example.com", None).unwrap();
        assert!(matches!(
            users.create("DEV@example.com", None),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn email_lookup_ignores_case() {
        let users = repo();
        let created = users.create("Dev@Example.com", None).unwrap();
        let found = users.get_by_email("dev@example.com").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(users.get_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn set_status_on_unknown_user_is_not_found() {
        assert!(matches!(
            repo().set_status(&UserId::new(), UserStatus::Inactive),
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn active_viewer_filters_inactive_and_unknown() {
        let users = repo();
        let u = users.create("dev@example.com", None).unwrap();

        let viewer = users.active_viewer(u.id.clone()).await.unwrap().unwrap();
        assert_eq!(viewer.email, "dev@example.com");

        users.set_status(&u.id, UserStatus::Inactive).unwrap();
        assert!(users.active_viewer(u.id.clone()).await.unwrap().is_none());
        assert!(users.active_viewer(UserId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upload_tier_lookup() {
        let users = repo();
        let u = users.create("big@example.com", None).unwrap();
        assert_eq!(users.upload_tier(&u.id).await.unwrap(), UploadTier::Standard);

        users.set_upload_tier(&u.id, UploadTier::Graced).unwrap();
        assert_eq!(users.upload_tier(&u.id).await.unwrap(), UploadTier::Graced);

        assert_eq!(users.upload_tier(&UserId::new()).await.unwrap(), UploadTier::Standard);
    }
}
