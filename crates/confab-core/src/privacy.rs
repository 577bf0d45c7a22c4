//! Projection of stored sessions onto what a given viewer may see.
//!
//! Every session body that leaves the process goes through [`project`] or
//! [`project_summary`]. Hostname, username, working directory and
//! transcript path are only revealed to the owner.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::access::AccessType;
use crate::ids::{SessionId, UserId};
use crate::models::{FileEntry, Session, SessionSummary};

/// Externally visible session detail. Redacted fields serialize as `null`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublicSessionView {
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
    pub is_owner: bool,
    pub access_type: &'static str,
}

/// List row counterpart of [`PublicSessionView`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PublicSessionSummary {
    pub id: SessionId,
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
    pub is_owner: bool,
    pub access_type: &'static str,
}

fn reveals_pii(access: &AccessType) -> bool {
    match access {
        AccessType::Owner => true,
        AccessType::Recipient { .. }
        | AccessType::System { .. }
        | AccessType::Public { .. }
        | AccessType::None => false,
    }
}

fn keep(reveal: bool, value: &Option<String>) -> Option<String> {
    if reveal {
        value.clone()
    } else {
        None
    }
}

pub fn project(session: &Session, access: &AccessType) -> PublicSessionView {
    let reveal = reveals_pii(access);
    PublicSessionView {
        id: session.id.clone(),
        owner_id: session.owner_id.clone(),
        external_id: session.external_id.clone(),
        title: session.title.clone(),
        custom_title: session.custom_title.clone(),
        session_type: session.session_type.clone(),
        hostname: keep(reveal, &session.hostname),
        username: keep(reveal, &session.username),
        cwd: keep(reveal, &session.cwd),
        transcript_path: keep(reveal, &session.transcript_path),
        git_info: session.git_info.clone(),
        files: session.files.clone(),
        created_at: session.created_at,
        updated_at: session.updated_at,
        is_owner: access.is_owner(),
        access_type: access.as_str(),
    }
}

pub fn project_summary(summary: &SessionSummary, access: &AccessType) -> PublicSessionSummary {
    let reveal = reveals_pii(access);
    PublicSessionSummary {
        id: summary.id.clone(),
        external_id: summary.external_id.clone(),
        title: summary.title.clone(),
        custom_title: summary.custom_title.clone(),
        session_type: summary.session_type.clone(),
        hostname: keep(reveal, &summary.hostname),
        username: keep(reveal, &summary.username),
        git_info: summary.git_info.clone(),
        file_count: summary.file_count,
        created_at: summary.created_at,
        updated_at: summary.updated_at,
        is_owner: access.is_owner(),
        access_type: access.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ShareId;
    use proptest::prelude::*;

    fn session(hostname: Option<String>, username: Option<String>) -> Session {
        let now = Utc::now();
        Session {
            id: SessionId::new(),
            owner_id: UserId::new(),
            external_id: "ext-1".into(),
            title: Some("Fix flaky test".into()),
            custom_title: None,
            session_type: "Claude Code".into(),
            hostname,
            username,
            cwd: Some("/home/developer/project".into()),
            transcript_path: Some("/home/developer/.claude/t.jsonl".into()),
            git_info: Some(serde_json::json!({"repo_url": "https://example.com/r.git"})),
            files: vec![FileEntry {
                path: "t.jsonl".into(),
                storage_key: "k".into(),
                size_bytes: 12,
                updated_at: now,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    fn grant_access() -> impl Strategy<Value = AccessType> {
        prop_oneof![
            Just(AccessType::Recipient { share_id: ShareId::from_raw("shr_r") }),
            Just(AccessType::System { share_id: ShareId::from_raw("shr_s") }),
            Just(AccessType::Public { share_id: ShareId::from_raw("shr_p") }),
            Just(AccessType::None),
        ]
    }

    proptest! {
        #[test]
        fn non_owner_never_sees_pii(
            host in proptest::option::of("[a-z.]{0,24}"),
            user in proptest::option::of("[a-z]{0,12}"),
            access in grant_access(),
        ) {
            let s = session(host, user);
            let view = project(&s, &access);
            prop_assert!(view.hostname.is_none());
            prop_assert!(view.username.is_none());
            prop_assert!(view.cwd.is_none());
            prop_assert!(view.transcript_path.is_none());
            prop_assert!(!view.is_owner);
        }

        #[test]
        fn owner_view_matches_source(
            host in proptest::option::of("[a-z.]{0,24}"),
            user in proptest::option::of("[a-z]{0,12}"),
        ) {
            let s = session(host, user);
            let view = project(&s, &AccessType::Owner);
            prop_assert_eq!(&view.hostname, &s.hostname);
            prop_assert_eq!(&view.username, &s.username);
            prop_assert_eq!(&view.cwd, &s.cwd);
            prop_assert_eq!(&view.transcript_path, &s.transcript_path);
            prop_assert_eq!(&view.title, &s.title);
            prop_assert_eq!(&view.files, &s.files);
            prop_assert_eq!(view.created_at, s.created_at);
            prop_assert!(view.is_owner);
        }
    }

    #[test]
    fn non_pii_fields_pass_through_for_public() {
        let s = session(Some("workstation.local".into()), Some("developer".into()));
        let view = project(&s, &AccessType::Public { share_id: ShareId::new() });
        assert_eq!(view.title, s.title);
        assert_eq!(view.git_info, s.git_info);
        assert_eq!(view.files.len(), 1);
        assert_eq!(view.access_type, "public");
    }

    #[test]
    fn redacted_fields_serialize_as_null() {
        let s = session(Some("workstation.local".into()), Some("developer".into()));
        let json =
            serde_json::to_value(project(&s, &AccessType::System { share_id: ShareId::new() }))
                .unwrap();
        assert!(json["hostname"].is_null());
        assert!(json["username"].is_null());
        assert!(json["cwd"].is_null());
        assert!(json["transcript_path"].is_null());
        assert_eq!(json["title"], "Fix flaky test");
    }

    #[test]
    fn summary_redaction_follows_access() {
        let now = Utc::now();
        let summary = SessionSummary {
            id: SessionId::new(),
            owner_id: UserId::new(),
            external_id: "ext".into(),
            title: None,
            custom_title: None,
            session_type: "Claude Code".into(),
            hostname: Some("box".into()),
            username: Some("me".into()),
            git_info: None,
            file_count: 2,
            created_at: now,
            updated_at: now,
        };
        let owned = project_summary(&summary, &AccessType::Owner);
        assert_eq!(owned.hostname.as_deref(), Some("box"));
        let shared =
            project_summary(&summary, &AccessType::Recipient { share_id: ShareId::new() });
        assert!(shared.hostname.is_none());
        assert!(shared.username.is_none());
        assert_eq!(shared.file_count, 2);
    }
}
