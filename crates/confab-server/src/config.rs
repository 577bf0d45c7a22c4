//! Server configuration.

use std::collections::HashSet;
use std::time::Duration;

use confab_core::{TierPolicies, UserId};
use confab_settings::Settings;

/// Everything the request pipeline needs, fixed when the router is built.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Header carrying the user id resolved by the upstream authenticator.
    pub identity_header: String,
    /// Log request and response body previews.
    pub debug_logging: bool,
    pub database_timeout: Duration,
    pub storage_timeout: Duration,
    pub tiers: TierPolicies,
    /// Users on the graced tier regardless of the user table.
    pub graced_users: HashSet<UserId>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            identity_header: "x-confab-user".into(),
            debug_logging: false,
            database_timeout: Duration::from_secs(5),
            storage_timeout: Duration::from_secs(30),
            tiers: TierPolicies::default(),
            graced_users: HashSet::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            identity_header: settings.server.identity_header.to_ascii_lowercase(),
            debug_logging: settings.server.debug_logging,
            database_timeout: settings.storage.database_timeout(),
            storage_timeout: settings.storage.storage_timeout(),
            tiers: settings.upload.tiers(),
            graced_users: settings
                .upload
                .graced_users
                .iter()
                .map(|id| UserId::from_raw(id.as_str()))
                .collect(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confab_core::policy::MIB;

    #[test]
    fn default_port_is_zero() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
    }

    #[test]
    fn from_settings_carries_every_section() {
        let mut settings = Settings::default();
        settings.server.port = 9191;
        settings.server.identity_header = "X-Auth-User".into();
        settings.server.debug_logging = true;
        settings.storage.storage_timeout_ms = 1_500;
        settings.upload.graced_users = vec!["usr_big".into()];

        let cfg = ServerConfig::from_settings(&settings);
        assert_eq!(cfg.port, 9191);
        assert_eq!(cfg.identity_header, "x-auth-user");
        assert!(cfg.debug_logging);
        assert_eq!(cfg.storage_timeout, Duration::from_millis(1_500));
        assert!(cfg.graced_users.contains(&UserId::from_raw("usr_big")));
        assert_eq!(cfg.tiers.outer_body_limit(), 500 * MIB);
    }
}
