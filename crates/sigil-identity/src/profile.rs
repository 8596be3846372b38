//! Security profiles
//!
//! Per-identity authentication posture: the level the last successful proof
//! established, the MFA flag, failed-attempt bookkeeping with lockout, and a
//! slow-moving risk score in `[0, 1]`. Only the verifier and explicit admin
//! operations mutate this record.

use serde::{Deserialize, Serialize};
use sigil_core::constants::FAILED_ATTEMPT_RISK_STEP;
use sigil_core::AuthLevel;

/// Security posture of one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityProfile {
    /// Level established by the most recent successful verification
    pub auth_level: AuthLevel,
    /// Whether a second factor is enrolled
    pub mfa_enabled: bool,
    /// Consecutive failed proof attempts since the last success
    pub failed_attempts: u32,
    /// Instant until which verification is refused, if locked out
    pub lockout_until_ns: Option<u64>,
    /// Accumulated risk in `[0, 1]`
    pub risk_score: f64,
}

impl Default for SecurityProfile {
    fn default() -> Self {
        Self {
            auth_level: AuthLevel::Basic,
            mfa_enabled: false,
            failed_attempts: 0,
            lockout_until_ns: None,
            risk_score: 0.0,
        }
    }
}

impl SecurityProfile {
    /// Whether a lockout is in effect at `now`
    pub fn is_locked_out(&self, now_ns: u64) -> bool {
        self.lockout_until_ns.is_some_and(|until| until > now_ns)
    }

    /// Record a failed proof attempt
    ///
    /// Increments the counter, bumps the risk score by one step (capped at
    /// 1.0), and starts a lockout once the counter reaches `max_attempts`.
    /// Returns true when this attempt triggered the lockout.
    pub fn record_failure(&mut self, now_ns: u64, max_attempts: u32, lockout_ns: u64) -> bool {
        self.failed_attempts += 1;
        self.risk_score = (self.risk_score + FAILED_ATTEMPT_RISK_STEP).min(1.0);
        if self.failed_attempts >= max_attempts {
            self.lockout_until_ns = Some(now_ns + lockout_ns);
            return true;
        }
        false
    }

    /// Record a successful verification at the given level
    ///
    /// The failed-attempt counter resets only here.
    pub fn record_success(&mut self, level: AuthLevel) {
        self.failed_attempts = 0;
        self.lockout_until_ns = None;
        self.auth_level = level;
    }
}
