//! Settings type definitions.
//!
//! Every section is `#[serde(rename_all = "camelCase", default)]` so a
//! settings file only needs to name the fields it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use confab_core::{TierPolicies, UploadPolicy};

use crate::errors::{Result, SettingsError};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub upload: UploadSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Reject values the server cannot run with. Called after loading.
    pub fn validate(&self) -> Result<()> {
        if self.server.identity_header.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "server.identityHeader must not be empty".into(),
            ));
        }
        for (name, policy) in [("standard", &self.upload.standard), ("graced", &self.upload.graced)] {
            if policy.max_files == 0 {
                return Err(SettingsError::InvalidValue(format!(
                    "upload.{name}.maxFiles must be positive"
                )));
            }
            if policy.max_total_bytes < policy.max_file_bytes {
                return Err(SettingsError::InvalidValue(format!(
                    "upload.{name}.maxTotalBytes is smaller than maxFileBytes"
                )));
            }
        }
        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Header the upstream authenticator sets to the resolved user id.
    pub identity_header: String,
    /// Log request and response body previews.
    pub debug_logging: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            identity_header: "x-confab-user".to_string(),
            debug_logging: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    pub database_path: String,
    pub object_root: String,
    pub database_timeout_ms: u64,
    pub storage_timeout_ms: u64,
}

impl StorageSettings {
    pub fn database_timeout(&self) -> Duration {
        Duration::from_millis(self.database_timeout_ms)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage_timeout_ms)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_path: "data/confab.db".to_string(),
            object_root: "data/objects".to_string(),
            database_timeout_ms: 5_000,
            storage_timeout_ms: 30_000,
        }
    }
}

/// Upload limits per tier. `graced_users` lists user ids that get the graced
/// tier regardless of what the user table says.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadSettings {
    pub standard: UploadPolicy,
    pub graced: UploadPolicy,
    pub graced_users: Vec<String>,
}

impl UploadSettings {
    pub fn tiers(&self) -> TierPolicies {
        TierPolicies {
            standard: self.standard.clone(),
            graced: self.graced.clone(),
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            standard: UploadPolicy::default(),
            graced: UploadPolicy::graced(),
            graced_users: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::policy::MIB;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 8080);
        assert_eq!(s.server.identity_header, "x-confab-user");
        assert!(!s.server.debug_logging);
        assert_eq!(s.storage.database_timeout(), Duration::from_secs(5));
        assert_eq!(s.upload.standard.max_files, 100);
        assert_eq!(s.upload.standard.max_file_bytes, 10 * MIB);
        assert_eq!(s.upload.graced.max_body_bytes, 500 * MIB);
        assert_eq!(s.logging.level, "info");
        assert!(s.validate().is_ok());
    }

    #[test]
    fn json_field_names_are_camel_case() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert!(json["server"].get("identityHeader").is_some());
        assert!(json["storage"].get("databaseTimeoutMs").is_some());
        assert!(json["upload"].get("gracedUsers").is_some());
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let s: Settings = serde_json::from_str(r#"{"server": {"port": 9000}}"#).unwrap();
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.host, "127.0.0.1");
    }

    #[test]
    fn validate_rejects_zero_file_limit() {
        let mut s = Settings::default();
        s.upload.graced.max_files = 0;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn validate_rejects_blank_identity_header() {
        let mut s = Settings::default();
        s.server.identity_header = "  ".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn tiers_mirror_upload_sections() {
        let s = Settings::default();
        let tiers = s.upload.tiers();
        assert_eq!(tiers.outer_body_limit(), 500 * MIB);
    }
}
