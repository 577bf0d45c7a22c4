//! Upload limits, keyed by entitlement tier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const MIB: u64 = 1024 * 1024;

/// Entitlement tier a user uploads under. Which users are in which tier is
/// data, looked up through [`crate::store::EntitlementLookup`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadTier {
    #[default]
    Standard,
    Graced,
}

impl UploadTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Graced => "graced",
        }
    }
}

impl fmt::Display for UploadTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "graced" => Ok(Self::Graced),
            other => Err(format!("unknown upload tier: {other}")),
        }
    }
}

/// Hard limits for one save request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadPolicy {
    pub max_files: usize,
    pub max_file_bytes: u64,
    pub max_total_bytes: u64,
    /// Ceiling on the raw request body, checked before parsing.
    pub max_body_bytes: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_files: 100,
            max_file_bytes: 10 * MIB,
            max_total_bytes: 50 * MIB,
            max_body_bytes: 200 * MIB,
        }
    }
}

impl UploadPolicy {
    pub fn graced() -> Self {
        Self {
            max_body_bytes: 500 * MIB,
            ..Self::default()
        }
    }
}

/// One policy per tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TierPolicies {
    pub standard: UploadPolicy,
    pub graced: UploadPolicy,
}

impl Default for TierPolicies {
    fn default() -> Self {
        Self {
            standard: UploadPolicy::default(),
            graced: UploadPolicy::graced(),
        }
    }
}

impl TierPolicies {
    pub fn for_tier(&self, tier: UploadTier) -> &UploadPolicy {
        match tier {
            UploadTier::Standard => &self.standard,
            UploadTier::Graced => &self.graced,
        }
    }

    /// Largest body any tier may send; the transport-level ceiling.
    pub fn outer_body_limit(&self) -> u64 {
        self.standard.max_body_bytes.max(self.graced.max_body_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let p = UploadPolicy::default();
        assert_eq!(p.max_files, 100);
        assert_eq!(p.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(p.max_total_bytes, 50 * 1024 * 1024);
        assert_eq!(p.max_body_bytes, 200 * 1024 * 1024);
    }

    #[test]
    fn graced_only_raises_body_ceiling() {
        let tiers = TierPolicies::default();
        let graced = tiers.for_tier(UploadTier::Graced);
        assert_eq!(graced.max_files, tiers.standard.max_files);
        assert_eq!(graced.max_body_bytes, 500 * MIB);
        assert_eq!(tiers.outer_body_limit(), 500 * MIB);
    }

    #[test]
    fn tier_parse_roundtrip() {
        for tier in [UploadTier::Standard, UploadTier::Graced] {
            assert_eq!(tier.to_string().parse::<UploadTier>().unwrap(), tier);
        }
        assert!("platinum".parse::<UploadTier>().is_err());
    }

    #[test]
    fn partial_policy_json_fills_defaults() {
        let p: UploadPolicy = serde_json::from_str(r#"{"maxFiles": 5}"#).unwrap();
        assert_eq!(p.max_files, 5);
        assert_eq!(p.max_file_bytes, 10 * MIB);
    }
}
