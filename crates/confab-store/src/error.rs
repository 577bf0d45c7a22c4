use confab_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        table: &'static str,
        column: &'static str,
        detail: String,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Only "not found" survives the crossing; every other failure is opaque to
/// the core and surfaces as a generic store failure.
impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => CoreError::NotFound,
            other => CoreError::StoreFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_core_not_found() {
        let core: CoreError = StoreError::NotFound("session sess_x".into()).into();
        assert!(matches!(core, CoreError::NotFound));
    }

    #[test]
    fn other_errors_become_store_failure() {
        let core: CoreError = StoreError::Conflict("dup".into()).into();
        assert!(matches!(core, CoreError::StoreFailure(m) if m.contains("dup")));

        let core: CoreError = StoreError::CorruptRow {
            table: "users",
            column: "status",
            detail: "unknown variant: x".into(),
        }
        .into();
        assert!(matches!(core, CoreError::StoreFailure(_)));
    }
}
