//! Scope, role, and authentication-level vocabulary
//!
//! Scopes are a closed set; roles are free-form strings gated by a static
//! minimum-level table. The auth-level function is pure and total: given the
//! MFA flag and the trust standing of the proving device it produces the
//! ordinal strength of the authentication.

use crate::errors::AuthorityError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordinal strength of an authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthLevel {
    /// Single-factor proof from an unremarkable device
    Basic,
    /// MFA-backed proof, or a proof from a verified device
    Elevated,
    /// Strong pairing of factor and device standing
    High,
    /// MFA plus a trusted device
    Maximum,
}

impl AuthLevel {
    /// Wire string for this level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Elevated => "elevated",
            Self::High => "high",
            Self::Maximum => "maximum",
        }
    }
}

impl fmt::Display for AuthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trust standing of a registered device key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    /// Attested or admin-promoted device
    Trusted,
    /// Device that has completed verification
    Verified,
    /// Newly added device awaiting verification
    Pending,
    /// Permanently disabled; never authenticates again
    Revoked,
}

impl TrustLevel {
    /// Wire string for this trust level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trusted => "trusted",
            Self::Verified => "verified",
            Self::Pending => "pending",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the authentication level established by a verified proof
///
/// `base = mfa_enabled ? elevated : basic`, then uplift by device trust:
///
/// | base \ trust | trusted | verified | other |
/// |---|---|---|---|
/// | basic | high | elevated | basic |
/// | elevated | maximum | high | elevated |
pub fn compute_auth_level(mfa_enabled: bool, trust: TrustLevel) -> AuthLevel {
    match (mfa_enabled, trust) {
        (false, TrustLevel::Trusted) => AuthLevel::High,
        (false, TrustLevel::Verified) => AuthLevel::Elevated,
        (false, _) => AuthLevel::Basic,
        (true, TrustLevel::Trusted) => AuthLevel::Maximum,
        (true, TrustLevel::Verified) => AuthLevel::High,
        (true, _) => AuthLevel::Elevated,
    }
}

/// Enumerated capability attachable to a session
///
/// The set is closed; the wildcard `admin:*` subsumes every other scope.
/// There is no hierarchical parsing beyond the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    /// Initiate outgoing payments
    #[serde(rename = "payment:write")]
    PaymentWrite,
    /// Open a new escrow
    #[serde(rename = "escrow:create")]
    EscrowCreate,
    /// Release funds held in escrow
    #[serde(rename = "escrow:release")]
    EscrowRelease,
    /// Transfer a held asset
    #[serde(rename = "asset:transfer")]
    AssetTransfer,
    /// Move funds between wallets
    #[serde(rename = "wallet:transfer")]
    WalletTransfer,
    /// Cast a governance vote
    #[serde(rename = "gov:vote")]
    GovVote,
    /// Finalize a governance decision
    #[serde(rename = "gov:finalize")]
    GovFinalize,
    /// Bind an external wallet to the identity
    #[serde(rename = "wallet:link")]
    WalletLink,
    /// Wildcard administrative scope; subsumes all others
    #[serde(rename = "admin:*")]
    AdminAll,
}

impl Scope {
    /// Every scope in the closed vocabulary
    pub const ALL: [Scope; 9] = [
        Scope::PaymentWrite,
        Scope::EscrowCreate,
        Scope::EscrowRelease,
        Scope::AssetTransfer,
        Scope::WalletTransfer,
        Scope::GovVote,
        Scope::GovFinalize,
        Scope::WalletLink,
        Scope::AdminAll,
    ];

    /// Wire string for this scope
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentWrite => "payment:write",
            Self::EscrowCreate => "escrow:create",
            Self::EscrowRelease => "escrow:release",
            Self::AssetTransfer => "asset:transfer",
            Self::WalletTransfer => "wallet:transfer",
            Self::GovVote => "gov:vote",
            Self::GovFinalize => "gov:finalize",
            Self::WalletLink => "wallet:link",
            Self::AdminAll => "admin:*",
        }
    }

    /// Minimum authentication level a session must establish to carry this scope
    pub fn min_auth_level(&self) -> AuthLevel {
        match self {
            Self::GovFinalize | Self::AdminAll => AuthLevel::Maximum,
            Self::EscrowRelease | Self::GovVote => AuthLevel::Elevated,
            _ => AuthLevel::Basic,
        }
    }

    /// Whether a session holding `self` satisfies a requirement for `required`
    ///
    /// Exact match, or the wildcard. Nothing else.
    pub fn subsumes(&self, required: Scope) -> bool {
        *self == required || *self == Scope::AdminAll
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = AuthorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| AuthorityError::InvalidScope {
                scope: s.to_string(),
            })
    }
}

/// Strongest minimum level demanded by a set of requested scopes
///
/// An empty request demands only `basic`.
pub fn required_scope_level(scopes: &[Scope]) -> AuthLevel {
    scopes
        .iter()
        .map(Scope::min_auth_level)
        .max()
        .unwrap_or(AuthLevel::Basic)
}

/// Minimum authentication level required to exercise a role
///
/// The table is static. Unlisted roles default to `elevated` so that a
/// free-form role can never be exercised with a bare single-factor proof.
pub fn role_min_level(role: &str) -> AuthLevel {
    match role {
        "admin.security" => AuthLevel::High,
        "gov.finalizer" => AuthLevel::Maximum,
        _ => AuthLevel::Elevated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_levels_are_ordered() {
        assert!(AuthLevel::Basic < AuthLevel::Elevated);
        assert!(AuthLevel::Elevated < AuthLevel::High);
        assert!(AuthLevel::High < AuthLevel::Maximum);
    }

    #[test]
    fn auth_level_uplift_table() {
        assert_eq!(
            compute_auth_level(false, TrustLevel::Trusted),
            AuthLevel::High
        );
        assert_eq!(
            compute_auth_level(false, TrustLevel::Verified),
            AuthLevel::Elevated
        );
        assert_eq!(
            compute_auth_level(false, TrustLevel::Pending),
            AuthLevel::Basic
        );
        assert_eq!(
            compute_auth_level(true, TrustLevel::Trusted),
            AuthLevel::Maximum
        );
        assert_eq!(
            compute_auth_level(true, TrustLevel::Verified),
            AuthLevel::High
        );
        assert_eq!(
            compute_auth_level(true, TrustLevel::Pending),
            AuthLevel::Elevated
        );
        // Revoked devices never reach the verifier, but the function stays total.
        assert_eq!(
            compute_auth_level(false, TrustLevel::Revoked),
            AuthLevel::Basic
        );
    }

    #[test]
    fn scope_wire_strings_round_trip() {
        for scope in Scope::ALL {
            assert_eq!(scope.as_str().parse::<Scope>().unwrap(), scope);
        }
        assert!(matches!(
            "wallet:burn".parse::<Scope>(),
            Err(AuthorityError::InvalidScope { .. })
        ));
    }

    #[test]
    fn wildcard_subsumes_everything() {
        for scope in Scope::ALL {
            assert!(Scope::AdminAll.subsumes(scope));
        }
        assert!(!Scope::GovVote.subsumes(Scope::GovFinalize));
        assert!(Scope::GovVote.subsumes(Scope::GovVote));
    }

    #[test]
    fn strongest_scope_dictates_level() {
        assert_eq!(required_scope_level(&[]), AuthLevel::Basic);
        assert_eq!(
            required_scope_level(&[Scope::WalletTransfer]),
            AuthLevel::Basic
        );
        assert_eq!(
            required_scope_level(&[Scope::WalletTransfer, Scope::GovVote]),
            AuthLevel::Elevated
        );
        assert_eq!(
            required_scope_level(&[Scope::GovVote, Scope::GovFinalize]),
            AuthLevel::Maximum
        );
    }

    #[test]
    fn role_table_defaults_to_elevated() {
        assert_eq!(role_min_level("admin.security"), AuthLevel::High);
        assert_eq!(role_min_level("gov.finalizer"), AuthLevel::Maximum);
        assert_eq!(role_min_level("support.readonly"), AuthLevel::Elevated);
    }
}
