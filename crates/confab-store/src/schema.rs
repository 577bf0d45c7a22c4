/// SQL DDL for the confab database.
/// Timestamps are fixed-width RFC 3339 UTC strings, so text order is time order.
pub const SCHEMA_VERSION: u32 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    name TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    upload_tier TEXT NOT NULL DEFAULT 'standard',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    external_id TEXT NOT NULL,
    title TEXT,
    custom_title TEXT,
    session_type TEXT NOT NULL,
    hostname TEXT,
    username TEXT,
    cwd TEXT,
    transcript_path TEXT,
    reason TEXT,
    git_info TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (user_id, external_id)
);

CREATE TABLE IF NOT EXISTS session_files (
    session_id TEXT NOT NULL REFERENCES sessions(id),
    path TEXT NOT NULL,
    file_type TEXT NOT NULL DEFAULT '',
    storage_key TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (session_id, path)
);

CREATE TABLE IF NOT EXISTS session_shares (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id),
    visibility TEXT NOT NULL,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    revoked_at TEXT,
    last_accessed_at TEXT
);

CREATE TABLE IF NOT EXISTS session_share_recipients (
    share_id TEXT NOT NULL REFERENCES session_shares(id),
    email TEXT NOT NULL COLLATE NOCASE,
    user_id TEXT REFERENCES users(id),
    PRIMARY KEY (share_id, email)
);

CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_shares_session ON session_shares(session_id);
CREATE INDEX IF NOT EXISTS idx_shares_visibility ON session_shares(visibility);
CREATE INDEX IF NOT EXISTS idx_recipients_user ON session_share_recipients(user_id);
CREATE INDEX IF NOT EXISTS idx_recipients_email ON session_share_recipients(email);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;
