//! Challenge issuance and proof verification
//!
//! The verification pipeline runs a fixed sequence of checks; any failure
//! short-circuits without advancing state, with two deliberate exceptions:
//! a bad signature records a failed attempt (and may trigger lockout), and
//! the nonce is consumed *before* the auth-level comparison so that a replay
//! of an insufficient proof still fails deterministically with
//! `nonce_reused`.
//!
//! Quota rejections (rate limit, lockout) never count against the identity's
//! failed-attempt tally.

use crate::challenge::{Challenge, LinkProof};
use crate::rate_limit::RateLimiter;
use crate::replay::ReplayLedger;
use crate::store::IdentityStore;
use sigil_core::{
    compute_auth_level, AuthLevel, AuthorityConfig, AuthorityError, AuthorityResult, IdentityId,
    ServiceId, TrustLevel,
};

/// Result of a successful proof verification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationOutcome {
    /// Authentication level the proof established
    pub level: AuthLevel,
    /// Trust standing of the proving device
    pub device_trust: TrustLevel,
    /// Identity risk score in `[0, 1]` at verification time
    pub risk: f64,
}

/// Issue a signing challenge for an identity
///
/// Nothing is written: the challenge lives only in the caller's hands until
/// its nonce is consumed by a proof.
pub fn issue_challenge(
    store: &IdentityStore,
    identity: &IdentityId,
    audience: ServiceId,
    method: impl Into<String>,
    config: &AuthorityConfig,
    now_ns: u64,
) -> AuthorityResult<Challenge> {
    store.get_enabled(identity)?;
    let challenge = Challenge {
        nonce: sigil_crypto::generate_nonce(),
        audience,
        method: method.into(),
        expires_at_ns: now_ns + config.challenge_ttl_ns,
    };
    tracing::debug!(
        identity = %identity,
        method = %challenge.method,
        expires_at_ns = challenge.expires_at_ns,
        "challenge issued"
    );
    Ok(challenge)
}

/// Verify a link proof, requiring at least `min_level`
///
/// On success the nonce is consumed, the device's `last_used_at` advances,
/// and the identity's failed-attempt counter resets.
#[allow(clippy::too_many_arguments)]
pub fn verify_with_level(
    store: &mut IdentityStore,
    nonces: &mut ReplayLedger,
    limiter: &mut RateLimiter,
    config: &AuthorityConfig,
    authority: &ServiceId,
    identity: &IdentityId,
    proof: &LinkProof,
    min_level: AuthLevel,
    now_ns: u64,
) -> AuthorityResult<VerificationOutcome> {
    // 1. Admission. A refused request touches no other state.
    limiter.admit(identity, now_ns)?;

    verify_preadmitted(
        store, nonces, config, authority, identity, proof, min_level, now_ns,
    )
}

/// The verification pipeline minus the admission step
///
/// For callers that already charged the rate window for the surrounding
/// operation (session establishment does) so one request costs one slot.
#[allow(clippy::too_many_arguments)]
pub fn verify_preadmitted(
    store: &mut IdentityStore,
    nonces: &mut ReplayLedger,
    config: &AuthorityConfig,
    authority: &ServiceId,
    identity: &IdentityId,
    proof: &LinkProof,
    min_level: AuthLevel,
    now_ns: u64,
) -> AuthorityResult<VerificationOutcome> {
    // 2. Identity present and enabled.
    let record = store.get_enabled(identity)?;

    // 3. Lockout presents as rate limiting to the caller.
    if record.security.is_locked_out(now_ns) {
        return Err(AuthorityError::rate_limited("identity locked out"));
    }

    // 4. Device triple match.
    let device = record
        .device(&proof.device_id)
        .filter(|d| d.matches(&proof.device_id, &proof.public_key, proof.algo))
        .ok_or_else(|| AuthorityError::DeviceUnknown {
            device: proof.device_id.to_string(),
        })?;
    if device.trust == TrustLevel::Revoked {
        return Err(AuthorityError::DeviceRevoked {
            device: proof.device_id.to_string(),
        });
    }
    let device_trust = device.trust;
    let mfa_enabled = record.security.mfa_enabled;

    // 5. Challenge validity. Expiry is exclusive: a proof at the exact
    //    expiry instant is dead.
    let challenge = &proof.challenge;
    if now_ns >= challenge.expires_at_ns {
        return Err(AuthorityError::expired("challenge lifetime elapsed"));
    }
    if challenge.audience != *authority {
        return Err(AuthorityError::unauthorized("challenge audience mismatch"));
    }

    // 6. Replay.
    let nonce_key = challenge.nonce_key();
    if nonces.is_consumed(&nonce_key) {
        return Err(AuthorityError::NonceReused);
    }

    // 7. Signature over the challenge digest.
    let digest = sigil_crypto::challenge_digest(
        &challenge.audience,
        &challenge.method,
        identity,
        &challenge.nonce,
        challenge.expires_at_ns,
    );
    if let Err(err) =
        sigil_crypto::verify_signature(proof.algo, &proof.public_key, &digest, &proof.signature)
    {
        let locked = store.record_failed_attempt(identity, config, now_ns)?;
        tracing::warn!(
            identity = %identity,
            device = %proof.device_id,
            locked,
            "proof signature rejected"
        );
        return Err(err);
    }

    // 8. Consume the nonce before any further side effect so a replayed
    //    proof fails the same way regardless of what follows.
    nonces.consume(nonce_key, now_ns);

    // 9. Auth level.
    let level = compute_auth_level(mfa_enabled, device_trust);
    if level < min_level {
        return Err(AuthorityError::InsufficientAuthLevel {
            required: min_level,
            actual: level,
        });
    }

    // 10. Commit the success.
    store.record_verification_success(identity, &proof.device_id, level, now_ns)?;
    let risk = store
        .get_known(identity)
        .map(|record| record.security.risk_score)?;
    tracing::debug!(
        identity = %identity,
        device = %proof.device_id,
        level = %level,
        "proof verified"
    );
    Ok(VerificationOutcome {
        level,
        device_trust,
        risk,
    })
}
