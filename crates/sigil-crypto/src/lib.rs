//! # Sigil Crypto
//!
//! Cryptographic primitives for the identity authority: Ed25519 and
//! secp256k1 signature verification, the SHA-256 challenge digest, and
//! CSPRNG token generation for nonces and session identifiers.
//!
//! Verification is the only signing-adjacent operation the authority
//! performs; private keys never enter this crate outside of tests. Every
//! verification failure collapses to [`AuthorityError::SignatureInvalid`] so
//! that callers cannot distinguish a malformed key from a forged signature.

#![forbid(unsafe_code)]

use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sigil_core::constants::{NONCE_BYTES, SESSION_TOKEN_BYTES};
use sigil_core::{AuthorityError, AuthorityResult, IdentityId, ServiceId};
use std::fmt;

static SECP_VERIFY: Lazy<secp256k1::Secp256k1<secp256k1::VerifyOnly>> =
    Lazy::new(secp256k1::Secp256k1::verification_only);

/// Signature algorithm of a registered device key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    /// Ed25519 (RFC 8032): 32-byte keys, 64-byte signatures
    Ed25519,
    /// secp256k1 ECDSA (SEC 1): 33/65-byte keys, 64-byte compact signatures
    Secp256k1,
}

impl KeyAlgorithm {
    /// Wire string for this algorithm
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::Secp256k1 => "secp256k1",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SHA-256 over the concatenation of the given parts
pub fn sha256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Digest a proof must sign to consume a challenge
///
/// `SHA-256(aud ‖ method ‖ identity ‖ nonce ‖ expires_at_be8)` where the
/// principals use their canonical byte encodings, `method` is UTF-8, and
/// `expires_at_be8` is the big-endian u64 nanosecond expiry.
pub fn challenge_digest(
    audience: &ServiceId,
    method: &str,
    identity: &IdentityId,
    nonce: &[u8; 32],
    expires_at_ns: u64,
) -> [u8; 32] {
    sha256_parts(&[
        audience.as_bytes(),
        method.as_bytes(),
        identity.as_bytes(),
        nonce,
        &expires_at_ns.to_be_bytes(),
    ])
}

/// Verify a signature over `message` under the given algorithm
///
/// `public_key` and `signature` are raw wire bytes; parsing failures and
/// verification failures are indistinguishable to the caller.
pub fn verify_signature(
    algo: KeyAlgorithm,
    public_key: &[u8],
    message: &[u8; 32],
    signature: &[u8],
) -> AuthorityResult<()> {
    match algo {
        KeyAlgorithm::Ed25519 => ed25519_verify(public_key, message, signature),
        KeyAlgorithm::Secp256k1 => secp256k1_verify(public_key, message, signature),
    }
}

fn ed25519_verify(public_key: &[u8], message: &[u8; 32], signature: &[u8]) -> AuthorityResult<()> {
    use ed25519_dalek::Verifier;

    let key_bytes: [u8; 32] = public_key.try_into().map_err(|_| {
        tracing::debug!(len = public_key.len(), "ed25519 public key has wrong length");
        AuthorityError::SignatureInvalid
    })?;
    let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes).map_err(|e| {
        tracing::debug!(error = %e, "ed25519 public key rejected");
        AuthorityError::SignatureInvalid
    })?;
    let sig_bytes: [u8; 64] = signature.try_into().map_err(|_| {
        tracing::debug!(len = signature.len(), "ed25519 signature has wrong length");
        AuthorityError::SignatureInvalid
    })?;
    let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);

    verifying_key.verify(message, &signature).map_err(|e| {
        tracing::debug!(error = %e, "ed25519 verification failed");
        AuthorityError::SignatureInvalid
    })
}

fn secp256k1_verify(
    public_key: &[u8],
    message: &[u8; 32],
    signature: &[u8],
) -> AuthorityResult<()> {
    let key = secp256k1::PublicKey::from_slice(public_key).map_err(|e| {
        tracing::debug!(error = %e, "secp256k1 public key rejected");
        AuthorityError::SignatureInvalid
    })?;
    let sig = secp256k1::ecdsa::Signature::from_compact(signature).map_err(|e| {
        tracing::debug!(error = %e, "secp256k1 signature rejected");
        AuthorityError::SignatureInvalid
    })?;
    let digest = secp256k1::Message::from_digest(*message);

    SECP_VERIFY.verify_ecdsa(&digest, &sig, &key).map_err(|e| {
        tracing::debug!(error = %e, "secp256k1 verification failed");
        AuthorityError::SignatureInvalid
    })
}

/// Generate a 32-byte challenge nonce from the OS CSPRNG
pub fn generate_nonce() -> [u8; NONCE_BYTES] {
    let mut nonce = [0u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Generate a 128-bit session token from the OS CSPRNG
pub fn generate_session_token() -> [u8; SESSION_TOKEN_BYTES] {
    let mut token = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut token);
    token
}
