use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Get an optional column value.
pub fn get_opt<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<Option<T>, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse a JSON string column, returning CorruptRow on parse failure.
pub fn parse_json(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<serde_json::Value, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: format!("invalid JSON: {e}"),
    })
}

/// Parse a string into an enum, returning CorruptRow on failure.
pub fn parse_enum<T: std::str::FromStr>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    raw.parse().map_err(|_| StoreError::CorruptRow {
        table,
        column,
        detail: format!("unknown variant: {raw}"),
    })
}

/// Storage form of a timestamp: RFC 3339, nanosecond precision, `Z` suffix.
/// Fixed width, so SQL `MAX` and `ORDER BY` on the text are chronological.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_ts(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            table,
            column,
            detail: format!("invalid timestamp {raw:?}: {e}"),
        })
}

pub fn parse_ts_opt(
    raw: Option<String>,
    table: &'static str,
    column: &'static str,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.map(|r| parse_ts(&r, table, column)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_enum_failure() {
        let result: Result<confab_core::UploadTier, _> =
            parse_enum("INVALID", "users", "upload_tier");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "users", column: "upload_tier", .. })
        ));
    }

    #[test]
    fn parse_json_success() {
        let result = parse_json(r#"{"branch": "main"}"#, "sessions", "git_info").unwrap();
        assert_eq!(result["branch"], "main");
    }

    #[test]
    fn parse_json_failure() {
        let result = parse_json("not valid json", "sessions", "git_info");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "sessions", column: "git_info", .. })
        ));
    }

    #[test]
    fn timestamps_are_fixed_width_and_ordered() {
        let a = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let b = Utc.timestamp_opt(1_700_000_000, 900_000_000).single().unwrap();
        let (fa, fb) = (format_ts(a), format_ts(b));
        assert_eq!(fa.len(), fb.len());
        assert!(fa < fb);
        assert_eq!(parse_ts(&fb, "t", "c").unwrap(), b);
    }

    #[test]
    fn bad_timestamp_is_corrupt_row() {
        assert!(matches!(
            parse_ts("yesterday", "sessions", "created_at"),
            Err(StoreError::CorruptRow { column: "created_at", .. })
        ));
    }
}
