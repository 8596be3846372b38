//! Challenges and link proofs
//!
//! A challenge is a short-lived random token the authority hands to a caller;
//! the authority stores nothing at issuance. The caller returns a
//! [`LinkProof`]: the challenge plus a signature over its digest from a
//! registered device key. Consuming the proof is what writes state (the
//! nonce enters the replay ledger).

use serde::{Deserialize, Serialize};
use sigil_core::{DeviceId, ServiceId};
use sigil_crypto::KeyAlgorithm;

/// A short-lived signing challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    /// 32 random bytes; uniqueness is the replay defense
    pub nonce: [u8; 32],
    /// Service principal the proof is intended for
    pub audience: ServiceId,
    /// Operation the caller intends to perform
    pub method: String,
    /// Instant after which the challenge is dead
    pub expires_at_ns: u64,
}

impl Challenge {
    /// Hex form of the nonce, used as the replay-ledger key
    pub fn nonce_key(&self) -> String {
        hex::encode(self.nonce)
    }
}

/// The signed artifact that consumes a challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkProof {
    /// Algorithm of the signing device key
    pub algo: KeyAlgorithm,
    /// Device that produced the signature
    pub device_id: DeviceId,
    /// Public key the caller claims for that device
    pub public_key: Vec<u8>,
    /// Signature over the challenge digest
    pub signature: Vec<u8>,
    /// The challenge being consumed
    pub challenge: Challenge,
}
