//! Device keys
//!
//! A device is a `(device id, public key, algorithm)` triple bound to exactly
//! one identity, carrying a trust standing that feeds the auth-level
//! computation. Revocation is terminal: a revoked device never authenticates
//! again, and re-activation means registering a new device record.

use serde::{Deserialize, Serialize};
use sigil_core::{DeviceId, TrustLevel};
use sigil_crypto::KeyAlgorithm;

/// A registered device key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceKey {
    /// Caller-assigned identifier, unique within the owning identity
    pub device_id: DeviceId,
    /// Signature algorithm of the key
    pub algo: KeyAlgorithm,
    /// Raw public key bytes in the algorithm's wire encoding
    pub public_key: Vec<u8>,
    /// Optional platform tag (`"ios"`, `"yubikey"`, ...)
    pub platform: Option<String>,
    /// Optional opaque attestation blob recorded at registration
    pub attestation: Option<Vec<u8>>,
    /// Trust standing of this key
    pub trust: TrustLevel,
    /// Registration timestamp
    pub added_at_ns: u64,
    /// Last successful proof from this device, if any
    pub last_used_at_ns: Option<u64>,
}

impl DeviceKey {
    /// Create a new device key awaiting verification
    pub fn new(
        device_id: DeviceId,
        algo: KeyAlgorithm,
        public_key: Vec<u8>,
        added_at_ns: u64,
    ) -> Self {
        Self {
            device_id,
            algo,
            public_key,
            platform: None,
            attestation: None,
            trust: TrustLevel::Pending,
            added_at_ns,
            last_used_at_ns: None,
        }
    }

    /// Attach a platform tag
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Attach an attestation blob
    pub fn with_attestation(mut self, attestation: Vec<u8>) -> Self {
        self.attestation = Some(attestation);
        self
    }

    /// Set the initial trust standing
    pub fn with_trust(mut self, trust: TrustLevel) -> Self {
        self.trust = trust;
        self
    }

    /// Whether the full `(device id, public key, algorithm)` triple matches
    pub fn matches(&self, device_id: &DeviceId, public_key: &[u8], algo: KeyAlgorithm) -> bool {
        self.device_id == *device_id && self.public_key == public_key && self.algo == algo
    }

    /// Whether this key may still authenticate
    pub fn is_active(&self) -> bool {
        self.trust != TrustLevel::Revoked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeviceKey {
        DeviceKey::new(
            DeviceId::new("laptop"),
            KeyAlgorithm::Ed25519,
            vec![1u8; 32],
            1_000,
        )
    }

    #[test]
    fn new_devices_start_pending() {
        let device = sample();
        assert_eq!(device.trust, TrustLevel::Pending);
        assert!(device.is_active());
        assert_eq!(device.last_used_at_ns, None);
    }

    #[test]
    fn triple_matching_is_exact() {
        let device = sample();
        assert!(device.matches(&DeviceId::new("laptop"), &[1u8; 32], KeyAlgorithm::Ed25519));
        assert!(!device.matches(&DeviceId::new("phone"), &[1u8; 32], KeyAlgorithm::Ed25519));
        assert!(!device.matches(&DeviceId::new("laptop"), &[2u8; 32], KeyAlgorithm::Ed25519));
        assert!(!device.matches(
            &DeviceId::new("laptop"),
            &[1u8; 32],
            KeyAlgorithm::Secp256k1
        ));
    }

    #[test]
    fn revoked_devices_are_inactive() {
        let device = sample().with_trust(TrustLevel::Revoked);
        assert!(!device.is_active());
    }
}
