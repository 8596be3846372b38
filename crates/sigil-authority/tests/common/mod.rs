#![allow(dead_code)]
//! Shared fixture for the authority integration suites
//!
//! Builds an authority on a manual clock with one bootstrapped administrator
//! (trusted Ed25519 device, which reaches the `high` level the admin role
//! demands without MFA) and provides actors that can sign real proofs.

use ed25519_dalek::Signer;
use sigil_authority::{
    AuthorityConfig, Challenge, Clock, DeviceId, DeviceKey, IdentityAuthority, IdentityId,
    KeyAlgorithm, LinkProof, ManualClock, ServiceId, TrustLevel,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One second in nanoseconds.
pub const SEC: u64 = 1_000_000_000;

/// A principal with a signing key for one of its devices.
pub struct Actor {
    pub id: IdentityId,
    pub device: DeviceId,
    pub key: ed25519_dalek::SigningKey,
}

impl Actor {
    pub fn generate(id: &str, device: &str) -> Self {
        Self {
            id: IdentityId::from_text(id),
            device: DeviceId::new(device),
            key: ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    pub fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }

    pub fn device_key(&self, trust: TrustLevel, now_ns: u64) -> DeviceKey {
        DeviceKey::new(
            self.device.clone(),
            KeyAlgorithm::Ed25519,
            self.public_key(),
            now_ns,
        )
        .with_trust(trust)
    }

    /// Sign a challenge into a link proof.
    pub fn sign(&self, challenge: Challenge) -> LinkProof {
        let digest = sigil_crypto::challenge_digest(
            &challenge.audience,
            &challenge.method,
            &self.id,
            &challenge.nonce,
            challenge.expires_at_ns,
        );
        LinkProof {
            algo: KeyAlgorithm::Ed25519,
            device_id: self.device.clone(),
            public_key: self.public_key(),
            signature: self.key.sign(&digest).to_bytes().to_vec(),
            challenge,
        }
    }

    /// Issue a challenge from the authority and sign it.
    pub fn proof(&self, authority: &IdentityAuthority, method: &str) -> LinkProof {
        let challenge = authority
            .issue_challenge(&self.id, authority.service_id().clone(), method)
            .expect("challenge issuance");
        self.sign(challenge)
    }
}

/// Authority plus the actors the suites need.
pub struct Harness {
    pub authority: IdentityAuthority,
    pub clock: ManualClock,
    pub admin: Actor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AuthorityConfig::default())
    }

    pub fn with_config(config: AuthorityConfig) -> Self {
        // Ignore the error when a previous test already installed a subscriber.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();

        let clock = ManualClock::starting_at(1_700_000_000 * SEC);
        let mut authority = IdentityAuthority::with_clock(
            ServiceId::from_text("sigil-authority"),
            config,
            Arc::new(clock.clone()),
        )
        .expect("valid configuration");

        let admin = Actor::generate("acct-root", "root-hsm");
        authority
            .create_identity(
                admin.id.clone(),
                admin.device_key(TrustLevel::Trusted, clock.now_ns()),
                BTreeMap::new(),
                BTreeSet::from(["admin.security".to_string()]),
                None,
            )
            .expect("bootstrap admin");

        Self {
            authority,
            clock,
            admin,
        }
    }

    fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    /// Register a new identity with a verified device, admin-authorized.
    pub fn register(&mut self, id: &str, device: &str) -> Actor {
        self.register_with_trust(id, device, TrustLevel::Verified)
    }

    pub fn register_with_trust(&mut self, id: &str, device: &str, trust: TrustLevel) -> Actor {
        let actor = Actor::generate(id, device);
        let admin_proof = self.admin.proof(&self.authority, "create_identity");
        self.authority
            .create_identity(
                actor.id.clone(),
                actor.device_key(trust, self.now_ns()),
                BTreeMap::new(),
                BTreeSet::new(),
                Some(&admin_proof),
            )
            .expect("identity creation");
        actor
    }

    /// Add a second device for an existing actor's identity.
    pub fn add_device(&mut self, owner: &Actor, device: &str, trust: TrustLevel) -> Actor {
        let sibling = Actor {
            id: owner.id.clone(),
            device: DeviceId::new(device),
            key: ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng),
        };
        let admin_proof = self.admin.proof(&self.authority, "add_device_key");
        self.authority
            .add_device_key(
                &owner.id,
                sibling.device_key(trust, self.now_ns()),
                &admin_proof,
            )
            .expect("device addition");
        sibling
    }
}

