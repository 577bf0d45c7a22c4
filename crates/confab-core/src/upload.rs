//! Save-request parsing and validation.
//!
//! Text fields arrive as raw bytes ([`RawText`]) so that invalid UTF-8 is
//! seen and rejected here instead of being silently replaced by the JSON
//! layer. Lengths are measured in bytes.

use std::fmt;

use base64::Engine as _;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use tracing::warn;

use crate::errors::CoreError;
use crate::policy::{UploadPolicy, MIB};
use crate::sanitize::sanitize_for_display;

pub const MIN_SESSION_ID_LENGTH: usize = 1;
pub const MAX_SESSION_ID_LENGTH: usize = 256;
pub const MAX_PATH_LENGTH: usize = 1024;
pub const MAX_CWD_LENGTH: usize = 4096;
pub const MAX_REASON_LENGTH: usize = 10_000;

/// A JSON string kept as the bytes the client sent. `null` reads as empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawText(Vec<u8>);

impl RawText {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<&str> for RawText {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for RawText {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl<'de> Deserialize<'de> for RawText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawTextVisitor;

        impl<'de> Visitor<'de> for RawTextVisitor {
            type Value = RawText;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string or null")
            }

            fn visit_none<E: de::Error>(self) -> Result<RawText, E> {
                Ok(RawText::default())
            }

            fn visit_unit<E: de::Error>(self) -> Result<RawText, E> {
                Ok(RawText::default())
            }

            fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<RawText, D::Error> {
                // serde_json hands string contents to the bytes path unvalidated.
                deserializer.deserialize_byte_buf(RawTextVisitor)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RawText, E> {
                Ok(RawText(v.as_bytes().to_vec()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<RawText, E> {
                Ok(RawText(v.into_bytes()))
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<RawText, E> {
                Ok(RawText(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<RawText, E> {
                Ok(RawText(v))
            }
        }

        deserializer.deserialize_option(RawTextVisitor)
    }
}

fn base64_content<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(encoded) => base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(de::Error::custom),
        None => Ok(Vec::new()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FileUpload {
    #[serde(default)]
    pub path: RawText,
    #[serde(rename = "type", default)]
    pub file_type: String,
    #[serde(default, deserialize_with = "base64_content")]
    pub content: Vec<u8>,
    #[serde(default)]
    pub size_bytes: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveSessionRequest {
    #[serde(default)]
    pub session_id: RawText,
    #[serde(default)]
    pub transcript_path: RawText,
    #[serde(default)]
    pub cwd: RawText,
    #[serde(default)]
    pub reason: RawText,
    #[serde(default)]
    pub hostname: RawText,
    #[serde(default)]
    pub username: RawText,
    #[serde(default)]
    pub git_info: Option<serde_json::Value>,
    #[serde(default)]
    pub files: Vec<FileUpload>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedFile {
    pub path: String,
    pub file_type: String,
    pub content: Vec<u8>,
}

/// A request that passed every check, with text fields decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedUpload {
    pub external_id: String,
    pub transcript_path: String,
    pub cwd: Option<String>,
    pub reason: Option<String>,
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub git_info: Option<serde_json::Value>,
    pub files: Vec<ValidatedFile>,
    pub total_bytes: u64,
}

/// First violation found in a save request. The display text is returned to
/// the client verbatim.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("session_id must be between {min} and {max} characters")]
    SessionIdLength { min: usize, max: usize },

    #[error("{field} too long (max {max} characters)")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must be valid UTF-8")]
    InvalidEncoding { field: &'static str },

    #[error("files array cannot be empty")]
    NoFiles,

    #[error("too many files (max {max}, got {got})")]
    TooManyFiles { max: usize, got: usize },

    #[error("file[{index}]: path is required")]
    FilePathMissing { index: usize },

    #[error("file[{index}]: path too long (max {max} characters)")]
    FilePathTooLong { index: usize, max: usize },

    #[error("file[{index}]: path must be valid UTF-8")]
    FilePathEncoding { index: usize },

    #[error("file[{index}]: path contains invalid sequence '..'")]
    PathTraversal { index: usize },

    #[error("file[{index}]: content too large (max {} MB, got {} MB)", .max_bytes / MIB, .got_bytes / MIB)]
    FileTooLarge {
        index: usize,
        max_bytes: u64,
        got_bytes: u64,
    },

    #[error("total file content too large (max {} MB)", .max_bytes / MIB)]
    TotalTooLarge { max_bytes: u64 },
}

impl From<UploadError> for CoreError {
    fn from(err: UploadError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

fn required_text(
    raw: RawText,
    field: &'static str,
    max: usize,
) -> Result<String, UploadError> {
    if raw.is_empty() {
        return Err(UploadError::Missing { field });
    }
    if raw.len() > max {
        return Err(UploadError::TooLong { field, max });
    }
    String::from_utf8(raw.0).map_err(|_| UploadError::InvalidEncoding { field })
}

fn optional_text(
    raw: RawText,
    field: &'static str,
    max: usize,
) -> Result<Option<String>, UploadError> {
    if raw.is_empty() {
        return Ok(None);
    }
    if raw.len() > max {
        return Err(UploadError::TooLong { field, max });
    }
    String::from_utf8(raw.0)
        .map(Some)
        .map_err(|_| UploadError::InvalidEncoding { field })
}

/// Free-form text with no length bound, only an encoding check.
fn unbounded_text(raw: RawText, field: &'static str) -> Result<Option<String>, UploadError> {
    if raw.is_empty() {
        return Ok(None);
    }
    String::from_utf8(raw.0)
        .map(Some)
        .map_err(|_| UploadError::InvalidEncoding { field })
}

fn session_id(raw: RawText) -> Result<String, UploadError> {
    if raw.is_empty() {
        return Err(UploadError::Missing { field: "session_id" });
    }
    if raw.len() < MIN_SESSION_ID_LENGTH || raw.len() > MAX_SESSION_ID_LENGTH {
        return Err(UploadError::SessionIdLength {
            min: MIN_SESSION_ID_LENGTH,
            max: MAX_SESSION_ID_LENGTH,
        });
    }
    String::from_utf8(raw.0).map_err(|_| UploadError::InvalidEncoding { field: "session_id" })
}

fn file_path(index: usize, raw: RawText) -> Result<String, UploadError> {
    if raw.is_empty() {
        return Err(UploadError::FilePathMissing { index });
    }
    if raw.len() > MAX_PATH_LENGTH {
        return Err(UploadError::FilePathTooLong {
            index,
            max: MAX_PATH_LENGTH,
        });
    }
    let path = String::from_utf8(raw.0).map_err(|_| UploadError::FilePathEncoding { index })?;
    if path.contains("..") {
        return Err(UploadError::PathTraversal { index });
    }
    Ok(path)
}

/// Check a save request against `policy`. Pure apart from a warning when a
/// declared file size disagrees with the actual content length; the actual
/// length is what counts.
pub fn validate(req: SaveSessionRequest, policy: &UploadPolicy) -> Result<ValidatedUpload, UploadError> {
    let external_id = session_id(req.session_id)?;
    let transcript_path = required_text(req.transcript_path, "transcript_path", MAX_PATH_LENGTH)?;
    let cwd = optional_text(req.cwd, "cwd", MAX_CWD_LENGTH)?;
    let reason = optional_text(req.reason, "reason", MAX_REASON_LENGTH)?;
    let hostname = unbounded_text(req.hostname, "hostname")?;
    let username = unbounded_text(req.username, "username")?;

    if req.files.is_empty() {
        return Err(UploadError::NoFiles);
    }
    if req.files.len() > policy.max_files {
        return Err(UploadError::TooManyFiles {
            max: policy.max_files,
            got: req.files.len(),
        });
    }

    let mut files = Vec::with_capacity(req.files.len());
    let mut total_bytes: u64 = 0;
    for (index, file) in req.files.into_iter().enumerate() {
        let path = file_path(index, file.path)?;

        let actual = file.content.len() as u64;
        if actual > policy.max_file_bytes {
            return Err(UploadError::FileTooLarge {
                index,
                max_bytes: policy.max_file_bytes,
                got_bytes: actual,
            });
        }
        total_bytes += actual;
        if total_bytes > policy.max_total_bytes {
            return Err(UploadError::TotalTooLarge {
                max_bytes: policy.max_total_bytes,
            });
        }

        if let Some(declared) = file.size_bytes.filter(|d| *d > 0) {
            if declared as u64 != actual {
                warn!(
                    file_index = index,
                    file_path = %sanitize_for_display(path.as_bytes()),
                    declared_size = declared,
                    actual_size = actual,
                    "declared file size does not match content"
                );
            }
        }

        files.push(ValidatedFile {
            path,
            file_type: file.file_type,
            content: file.content,
        });
    }

    Ok(ValidatedUpload {
        external_id,
        transcript_path,
        cwd,
        reason,
        hostname,
        username,
        git_info: req.git_info,
        files,
        total_bytes,
    })
}
