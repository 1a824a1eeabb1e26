// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session configuration: retransmission schedule, DPD and NAT keepalive.
//!
//! All limits live here as constants; nothing else in the crate hardcodes
//! them. A configuration is immutable once a session has been created from
//! it.
//!
//! # Example
//!
//! ```
//! use ike_session::config::SessionConfig;
//!
//! let config = SessionConfig::from_toml_str(
//!     r#"
//!     retransmit_timeouts_ms = [1000, 2000, 4000]
//!     dpd_delay_secs = 60
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.retransmit_timeouts_ms, vec![1000, 2000, 4000]);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Smallest accepted retransmission timeout (milliseconds).
pub const RETRANS_TIMEOUT_MS_MIN: u32 = 500;
/// Largest accepted retransmission timeout (30 minutes).
pub const RETRANS_TIMEOUT_MS_MAX: u32 = 30 * 60 * 1000;
/// Maximum number of entries in a retransmission schedule.
pub const RETRANS_MAX_ATTEMPTS_MAX: usize = 10;
/// Default retransmission schedule: 0.5s, 1s, 2s, 4s, 8s.
pub const RETRANS_TIMEOUT_MS_LIST_DEFAULT: [u32; 5] = [500, 1000, 2000, 4000, 8000];

/// Smallest accepted DPD delay (seconds).
pub const DPD_DELAY_SEC_MIN: u32 = 20;
/// Largest accepted DPD delay (30 minutes).
pub const DPD_DELAY_SEC_MAX: u32 = 1800;
/// Default DPD delay (2 minutes).
pub const DPD_DELAY_SEC_DEFAULT: u32 = 120;
/// Sentinel disabling background DPD.
pub const DPD_DELAY_SEC_DISABLED: u32 = i32::MAX as u32;

/// Smallest accepted NAT keepalive delay (seconds).
pub const NATT_KEEPALIVE_DELAY_SEC_MIN: u32 = 10;
/// Largest accepted NAT keepalive delay (seconds).
pub const NATT_KEEPALIVE_DELAY_SEC_MAX: u32 = 3600;
/// Default NAT keepalive delay (seconds).
pub const NATT_KEEPALIVE_DELAY_SEC_DEFAULT: u32 = 10;

/// Per-session reliability configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Relative retransmission timeouts, one per attempt.
    #[serde(default = "default_retransmit_timeouts")]
    pub retransmit_timeouts_ms: Vec<u32>,

    /// Idle delay before a background liveness check, or
    /// [`DPD_DELAY_SEC_DISABLED`].
    #[serde(default = "default_dpd_delay")]
    pub dpd_delay_secs: u32,

    /// Interval between NAT keepalive packets.
    #[serde(default = "default_keepalive_delay")]
    pub nat_keepalive_delay_secs: u32,

    /// Send NAT keepalives (only useful when a NAT was detected).
    #[serde(default)]
    pub nat_keepalive: bool,
}

fn default_retransmit_timeouts() -> Vec<u32> {
    RETRANS_TIMEOUT_MS_LIST_DEFAULT.to_vec()
}

fn default_dpd_delay() -> u32 {
    DPD_DELAY_SEC_DEFAULT
}

fn default_keepalive_delay() -> u32 {
    NATT_KEEPALIVE_DELAY_SEC_DEFAULT
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retransmit_timeouts_ms: default_retransmit_timeouts(),
            dpd_delay_secs: DPD_DELAY_SEC_DEFAULT,
            nat_keepalive_delay_secs: NATT_KEEPALIVE_DELAY_SEC_DEFAULT,
            nat_keepalive: false,
        }
    }
}

impl SessionConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the retransmission schedule.
    pub fn with_retransmit_timeouts_ms(
        mut self,
        timeouts: impl Into<Vec<u32>>,
    ) -> Result<Self, ConfigError> {
        let timeouts = timeouts.into();
        validate_retransmit_timeouts(&timeouts)?;
        self.retransmit_timeouts_ms = timeouts;
        Ok(self)
    }

    /// Set the DPD delay. [`DPD_DELAY_SEC_DISABLED`] is accepted.
    pub fn with_dpd_delay_secs(mut self, secs: u32) -> Result<Self, ConfigError> {
        validate_dpd_delay(secs)?;
        self.dpd_delay_secs = secs;
        Ok(self)
    }

    /// Disable background DPD.
    #[must_use]
    pub fn without_dpd(mut self) -> Self {
        self.dpd_delay_secs = DPD_DELAY_SEC_DISABLED;
        self
    }

    /// Enable NAT keepalives with the given interval.
    pub fn with_nat_keepalive_secs(mut self, secs: u32) -> Result<Self, ConfigError> {
        validate_keepalive_delay(secs)?;
        self.nat_keepalive_delay_secs = secs;
        self.nat_keepalive = true;
        Ok(self)
    }

    /// Validate every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_retransmit_timeouts(&self.retransmit_timeouts_ms)?;
        validate_dpd_delay(self.dpd_delay_secs)?;
        validate_keepalive_delay(self.nat_keepalive_delay_secs)
    }

    /// Background DPD delay, `None` when disabled.
    #[must_use]
    pub fn dpd_delay(&self) -> Option<Duration> {
        if self.dpd_delay_secs == DPD_DELAY_SEC_DISABLED {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.dpd_delay_secs)))
        }
    }

    /// NAT keepalive interval, `None` when keepalives are off.
    #[must_use]
    pub fn nat_keepalive_delay(&self) -> Option<Duration> {
        self.nat_keepalive
            .then(|| Duration::from_secs(u64::from(self.nat_keepalive_delay_secs)))
    }
}

fn validate_retransmit_timeouts(timeouts: &[u32]) -> Result<(), ConfigError> {
    if timeouts.is_empty() || timeouts.len() > RETRANS_MAX_ATTEMPTS_MAX {
        return Err(ConfigError::Invalid(format!(
            "retransmission schedule must have 1..={} entries, got {}",
            RETRANS_MAX_ATTEMPTS_MAX,
            timeouts.len()
        )));
    }
    if let Some(bad) = timeouts
        .iter()
        .find(|t| !(RETRANS_TIMEOUT_MS_MIN..=RETRANS_TIMEOUT_MS_MAX).contains(*t))
    {
        return Err(ConfigError::Invalid(format!(
            "retransmission timeout {}ms outside {}..={}ms",
            bad, RETRANS_TIMEOUT_MS_MIN, RETRANS_TIMEOUT_MS_MAX
        )));
    }
    Ok(())
}

fn validate_dpd_delay(secs: u32) -> Result<(), ConfigError> {
    if secs == DPD_DELAY_SEC_DISABLED || (DPD_DELAY_SEC_MIN..=DPD_DELAY_SEC_MAX).contains(&secs) {
        return Ok(());
    }
    Err(ConfigError::Invalid(format!(
        "DPD delay {}s outside {}..={}s",
        secs, DPD_DELAY_SEC_MIN, DPD_DELAY_SEC_MAX
    )))
}

fn validate_keepalive_delay(secs: u32) -> Result<(), ConfigError> {
    if (NATT_KEEPALIVE_DELAY_SEC_MIN..=NATT_KEEPALIVE_DELAY_SEC_MAX).contains(&secs) {
        return Ok(());
    }
    Err(ConfigError::Invalid(format!(
        "NAT keepalive delay {}s outside {}..={}s",
        secs, NATT_KEEPALIVE_DELAY_SEC_MIN, NATT_KEEPALIVE_DELAY_SEC_MAX
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retransmit_timeouts_ms, vec![500, 1000, 2000, 4000, 8000]);
        assert_eq!(config.dpd_delay(), Some(Duration::from_secs(120)));
        assert_eq!(config.nat_keepalive_delay(), None);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = SessionConfig::from_toml_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_schedule_limits() {
        assert!(SessionConfig::default()
            .with_retransmit_timeouts_ms(Vec::new())
            .is_err());
        assert!(SessionConfig::default()
            .with_retransmit_timeouts_ms(vec![1000; 11])
            .is_err());
        assert!(SessionConfig::default()
            .with_retransmit_timeouts_ms(vec![499])
            .is_err());
        assert!(SessionConfig::default()
            .with_retransmit_timeouts_ms(vec![RETRANS_TIMEOUT_MS_MAX + 1])
            .is_err());

        let config = SessionConfig::default()
            .with_retransmit_timeouts_ms(vec![500, RETRANS_TIMEOUT_MS_MAX])
            .unwrap();
        assert_eq!(config.retransmit_timeouts_ms.len(), 2);
    }

    #[test]
    fn test_dpd_delay_limits() {
        assert!(SessionConfig::default().with_dpd_delay_secs(19).is_err());
        assert!(SessionConfig::default().with_dpd_delay_secs(1801).is_err());
        let disabled = SessionConfig::default()
            .with_dpd_delay_secs(DPD_DELAY_SEC_DISABLED)
            .unwrap();
        assert_eq!(disabled.dpd_delay(), None);
        assert_eq!(SessionConfig::default().without_dpd(), disabled);
    }

    #[test]
    fn test_keepalive_limits() {
        assert!(SessionConfig::default().with_nat_keepalive_secs(9).is_err());
        assert!(SessionConfig::default().with_nat_keepalive_secs(3601).is_err());
        let config = SessionConfig::default().with_nat_keepalive_secs(20).unwrap();
        assert_eq!(config.nat_keepalive_delay(), Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_invalid_toml_value_rejected() {
        let err = SessionConfig::from_toml_str("dpd_delay_secs = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = SessionConfig::from_toml_str("retransmit_timeouts_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retransmit_timeouts_ms = [1000, 2000, 4000]").unwrap();
        writeln!(file, "nat_keepalive = true").unwrap();
        writeln!(file, "nat_keepalive_delay_secs = 30").unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.retransmit_timeouts_ms, vec![1000, 2000, 4000]);
        assert_eq!(config.nat_keepalive_delay(), Some(Duration::from_secs(30)));
        assert_eq!(config.dpd_delay_secs, DPD_DELAY_SEC_DEFAULT);
    }

    #[test]
    fn test_missing_file() {
        let err = SessionConfig::from_file("/nonexistent/ike-session.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
