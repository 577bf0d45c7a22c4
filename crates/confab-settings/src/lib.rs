//! # confab-settings
//!
//! Layered configuration for the confab server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** ([`Settings::default()`])
//! 2. **Settings file** (`$CONFAB_CONFIG` or `~/.confab/settings.json`,
//!    deep-merged over defaults)
//! 3. **Environment variables** (`CONFAB_*` overrides)
//!
//! There is no global instance: the binary loads once and hands the value to
//! the server at construction.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
