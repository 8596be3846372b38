//! Authority configuration
//!
//! One validated struct carries every recognized tunable. Defaults come from
//! [`crate::constants`]; a TOML file may override any subset of fields.
//! Risk-score weights are configuration, not contract, and live in their own
//! [`RiskWeights`] table so deployments can retune them without code changes.

use crate::constants;
use crate::errors::{AuthorityError, AuthorityResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Recognized configuration options for the identity authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorityConfig {
    /// Challenge lifetime in nanoseconds
    pub challenge_ttl_ns: u64,
    /// Consumed-nonce retention in nanoseconds; must cover the challenge TTL
    pub replay_window_ns: u64,
    /// Default session TTL in seconds, applied when a caller passes 0
    pub session_default_ttl_s: u64,
    /// Hard ceiling on session TTL in seconds
    pub session_max_ttl_s: u64,
    /// Device keys allowed per identity
    pub max_devices_per_identity: usize,
    /// Requests admitted per identity per rate window
    pub rate_limit_max: u32,
    /// Rate window in nanoseconds
    pub rate_window_ns: u64,
    /// Failed proof attempts before lockout
    pub max_failed_attempts_before_lockout: u32,
    /// Lockout duration in nanoseconds
    pub lockout_duration_ns: u64,
    /// Capacity of each event priority queue
    pub max_queue_size: usize,
    /// Delivery attempts before an event is dropped
    pub max_retries: u32,
    /// High-priority batch size per fabric cycle
    pub default_batch_size: usize,
    /// Session risk score at or above which issuance is refused
    pub high_risk_threshold: u8,
    /// Delivered-event history retention in days
    pub retention_days: u64,
    /// Whether the fabric prunes history opportunistically
    pub auto_prune: bool,
    /// Whether critical events survive retention pruning
    pub preserve_critical: bool,
    /// Heuristic weights for session risk scoring
    pub risk: RiskWeights,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            challenge_ttl_ns: constants::CHALLENGE_TTL_NS,
            replay_window_ns: constants::REPLAY_WINDOW_NS,
            session_default_ttl_s: constants::SESSION_DEFAULT_TTL_S,
            session_max_ttl_s: constants::SESSION_MAX_TTL_S,
            max_devices_per_identity: constants::MAX_DEVICES_PER_IDENTITY,
            rate_limit_max: constants::RATE_LIMIT_MAX,
            rate_window_ns: constants::RATE_WINDOW_NS,
            max_failed_attempts_before_lockout: constants::MAX_FAILED_ATTEMPTS,
            lockout_duration_ns: constants::LOCKOUT_DURATION_NS,
            max_queue_size: constants::MAX_QUEUE_SIZE,
            max_retries: constants::MAX_RETRIES,
            default_batch_size: constants::DEFAULT_BATCH_SIZE,
            high_risk_threshold: constants::HIGH_RISK_THRESHOLD,
            retention_days: constants::RETENTION_DAYS,
            auto_prune: true,
            preserve_critical: true,
            risk: RiskWeights::default(),
        }
    }
}

impl AuthorityConfig {
    /// Parse a configuration from TOML text, merged over the defaults
    pub fn from_toml_str(text: &str) -> AuthorityResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| AuthorityError::invalid(format!("config parse failed: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load_from_file(path: &Path) -> AuthorityResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AuthorityError::invalid(format!("config read failed: {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> AuthorityResult<()> {
        if self.challenge_ttl_ns == 0 {
            return Err(AuthorityError::invalid("challenge_ttl_ns must be nonzero"));
        }
        if self.replay_window_ns < self.challenge_ttl_ns {
            return Err(AuthorityError::invalid(
                "replay_window_ns must cover challenge_ttl_ns",
            ));
        }
        if self.session_default_ttl_s > self.session_max_ttl_s {
            return Err(AuthorityError::invalid(
                "session_default_ttl_s exceeds session_max_ttl_s",
            ));
        }
        if self.rate_limit_max == 0 || self.rate_window_ns == 0 {
            return Err(AuthorityError::invalid("rate limiter must admit requests"));
        }
        if self.max_devices_per_identity == 0 {
            return Err(AuthorityError::invalid(
                "max_devices_per_identity must be nonzero",
            ));
        }
        if self.max_queue_size == 0 {
            return Err(AuthorityError::invalid("max_queue_size must be nonzero"));
        }
        if self.default_batch_size == 0 {
            return Err(AuthorityError::invalid("default_batch_size must be nonzero"));
        }
        if self.high_risk_threshold > 10 {
            return Err(AuthorityError::invalid(
                "high_risk_threshold is on a 0-10 scale",
            ));
        }
        Ok(())
    }
}

/// Heuristic weights feeding the session risk score (0-10 scale)
///
/// Each weight is the number of points a factor contributes when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskWeights {
    /// Points for a proof from a trusted device
    pub trusted_device: u8,
    /// Points for a proof from a verified device
    pub verified_device: u8,
    /// Points for a proof from a pending device
    pub pending_device: u8,
    /// Points when the strongest requested scope needs only basic auth
    pub severity_basic: u8,
    /// Points when the strongest requested scope needs elevated auth
    pub severity_elevated: u8,
    /// Points when the strongest requested scope needs maximum auth
    pub severity_maximum: u8,
    /// Points for a requested TTL above four hours
    pub medium_ttl: u8,
    /// Points for a requested TTL above twelve hours
    pub long_ttl: u8,
    /// Points when the proving device was last used over 7 days ago
    pub stale_device: u8,
    /// Points when the proving device was last used over 30 days ago
    pub very_stale_device: u8,
    /// Points when the proving device has never been used
    pub unused_device: u8,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            trusted_device: 0,
            verified_device: 1,
            pending_device: 3,
            severity_basic: 1,
            severity_elevated: 2,
            severity_maximum: 4,
            medium_ttl: 1,
            long_ttl: 2,
            stale_device: 1,
            very_stale_device: 2,
            unused_device: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        AuthorityConfig::default().validate().unwrap();
    }

    #[test]
    fn toml_overrides_merge_over_defaults() {
        let config = AuthorityConfig::from_toml_str(
            r#"
            rate_limit_max = 5
            high_risk_threshold = 9

            [risk]
            pending_device = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.rate_limit_max, 5);
        assert_eq!(config.high_risk_threshold, 9);
        assert_eq!(config.risk.pending_device, 5);
        // Untouched fields keep their defaults.
        assert_eq!(config.challenge_ttl_ns, constants::CHALLENGE_TTL_NS);
    }

    #[test]
    fn replay_window_must_cover_challenge_ttl() {
        let err = AuthorityConfig::from_toml_str("replay_window_ns = 1").unwrap_err();
        assert_eq!(err.code(), "invalid");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(AuthorityConfig::from_toml_str("no_such_option = true").is_err());
    }

    #[test]
    fn default_ttl_may_not_exceed_max() {
        let err = AuthorityConfig::from_toml_str(
            "session_default_ttl_s = 90000\nsession_max_ttl_s = 86400",
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid");
    }
}
