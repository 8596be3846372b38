//! Session risk scoring
//!
//! Two moments matter: issuance, where a score at or above the configured
//! threshold refuses the session outright, and validation, where the stored
//! score is reassessed against remaining lifetime and idle time to decide
//! whether the caller should be re-challenged. Scores live on a 0-10 scale;
//! the weights are configuration, not contract.

use serde::{Deserialize, Serialize};
use sigil_core::time::{NANOS_PER_DAY, NANOS_PER_SEC};
use sigil_core::{required_scope_level, AuthLevel, AuthorityConfig, RiskWeights, Scope, TrustLevel};

/// What a validation verdict asks the caller to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskAction {
    /// Proceed on the session alone
    Allow,
    /// Require a fresh challenge/proof round before proceeding
    Challenge,
    /// Refuse outright
    Deny,
}

/// A risk verdict with the factors that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Score on the 0-10 scale
    pub score: u8,
    /// Human-readable factor tags, for the audit stream
    pub factors: Vec<String>,
    /// Recommended caller behavior
    pub action: RiskAction,
}

/// Clamp a requested session TTL to the configured bounds
///
/// Zero and over-limit requests both fall back to the default.
pub fn clamp_ttl(requested_s: u64, config: &AuthorityConfig) -> u64 {
    if requested_s == 0 || requested_s > config.session_max_ttl_s {
        config.session_default_ttl_s
    } else {
        requested_s
    }
}

/// Score a session request at issuance
///
/// Factors: trust standing of the proving device, severity of the strongest
/// requested scope, requested lifetime, and how recently the device was used.
pub fn initial_risk(
    weights: &RiskWeights,
    trust: TrustLevel,
    scopes: &[Scope],
    ttl_s: u64,
    last_used_at_ns: Option<u64>,
    now_ns: u64,
) -> (u8, Vec<String>) {
    let mut score = 0u8;
    let mut factors = Vec::new();

    match trust {
        TrustLevel::Trusted => {
            score += weights.trusted_device;
        }
        TrustLevel::Verified => {
            score += weights.verified_device;
            factors.push("verified_device".to_string());
        }
        _ => {
            score += weights.pending_device;
            factors.push("pending_device".to_string());
        }
    }

    let severity = required_scope_level(scopes);
    let (points, tag) = match severity {
        AuthLevel::Maximum | AuthLevel::High => (weights.severity_maximum, "scope_severity:maximum"),
        AuthLevel::Elevated => (weights.severity_elevated, "scope_severity:elevated"),
        AuthLevel::Basic => (weights.severity_basic, "scope_severity:basic"),
    };
    score += points;
    factors.push(tag.to_string());

    if ttl_s > 12 * 3_600 {
        score += weights.long_ttl;
        factors.push("long_ttl".to_string());
    } else if ttl_s > 4 * 3_600 {
        score += weights.medium_ttl;
        factors.push("medium_ttl".to_string());
    }

    match last_used_at_ns {
        None => {
            score += weights.unused_device;
            factors.push("unused_device".to_string());
        }
        Some(last_used) => {
            let idle_days = now_ns.saturating_sub(last_used) / NANOS_PER_DAY;
            if idle_days > 30 {
                score += weights.very_stale_device;
                factors.push("very_stale_device".to_string());
            } else if idle_days > 7 {
                score += weights.stale_device;
                factors.push("stale_device".to_string());
            }
        }
    }

    (score.min(10), factors)
}

/// Reassess a live session at validation time
///
/// The stored issuance score gains a point when under five minutes remain
/// and two when the session has been idle for over thirty minutes.
pub fn reassess(
    base_score: u8,
    expires_at_ns: u64,
    last_activity_at_ns: u64,
    now_ns: u64,
) -> RiskAssessment {
    let mut score = base_score;
    let mut factors = Vec::new();

    if expires_at_ns.saturating_sub(now_ns) < 5 * 60 * NANOS_PER_SEC {
        score += 1;
        factors.push("expiring_soon".to_string());
    }
    if now_ns.saturating_sub(last_activity_at_ns) > 30 * 60 * NANOS_PER_SEC {
        score += 2;
        factors.push("idle_session".to_string());
    }

    let score = score.min(10);
    let action = if score >= 5 {
        RiskAction::Challenge
    } else {
        RiskAction::Allow
    };
    RiskAssessment {
        score,
        factors,
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> RiskWeights {
        RiskWeights::default()
    }

    #[test]
    fn ttl_clamp_falls_back_to_default() {
        let config = AuthorityConfig::default();
        assert_eq!(clamp_ttl(0, &config), 3_600);
        assert_eq!(clamp_ttl(86_401, &config), 3_600);
        assert_eq!(clamp_ttl(1, &config), 1);
        assert_eq!(clamp_ttl(86_400, &config), 86_400);
    }

    #[test]
    fn trusted_recent_device_scores_low() {
        let (score, factors) = initial_risk(
            &weights(),
            TrustLevel::Trusted,
            &[Scope::WalletTransfer],
            3_600,
            Some(900),
            1_000,
        );
        assert_eq!(score, 1); // severity_basic only
        assert_eq!(factors, vec!["scope_severity:basic"]);
    }

    #[test]
    fn pending_stale_device_with_admin_scope_scores_high() {
        let now = 40 * NANOS_PER_DAY;
        let (score, factors) = initial_risk(
            &weights(),
            TrustLevel::Pending,
            &[Scope::AdminAll],
            24 * 3_600,
            Some(0),
            now,
        );
        // pending 3 + maximum 4 + long ttl 2 + very stale 2, capped at 10
        assert_eq!(score, 10);
        assert!(factors.contains(&"pending_device".to_string()));
        assert!(factors.contains(&"very_stale_device".to_string()));
    }

    #[test]
    fn never_used_device_contributes() {
        let (score, factors) = initial_risk(
            &weights(),
            TrustLevel::Verified,
            &[Scope::GovVote],
            3_600,
            None,
            1_000,
        );
        // verified 1 + elevated 2 + unused 1
        assert_eq!(score, 4);
        assert!(factors.contains(&"unused_device".to_string()));
    }

    #[test]
    fn reassessment_adds_expiry_and_idle_pressure() {
        let minute = 60 * NANOS_PER_SEC;

        let fresh = reassess(2, 100 * minute, 99 * minute, 100 * minute - 10 * minute);
        assert_eq!(fresh.score, 2);
        assert_eq!(fresh.action, RiskAction::Allow);

        let expiring = reassess(2, 100 * minute, 99 * minute, 100 * minute - 2 * minute);
        assert_eq!(expiring.score, 3);
        assert_eq!(expiring.action, RiskAction::Allow);

        let idle = reassess(2, 1_000 * minute, 0, 31 * minute);
        assert_eq!(idle.score, 4);

        let both = reassess(3, 100 * minute, 60 * minute, 98 * minute);
        assert_eq!(both.score, 6);
        assert_eq!(both.action, RiskAction::Challenge);
    }
}
