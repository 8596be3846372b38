//! # Sigil Authority
//!
//! The root-of-trust façade other services call to answer one question at
//! wire speed: *is this caller allowed to perform this operation now?*
//!
//! [`IdentityAuthority`] composes the identity store, replay ledgers, rate
//! limiter, session manager, event fabric, and correlation tracker into the
//! public operations table: challenge issuance, proof verification, session
//! lifecycle, device and role administration, and the query surface. One
//! struct owns all state and every operation is a single serialized
//! transaction; there are no ambient globals.
//!
//! # Operation flow
//!
//! A caller presents a [`LinkProof`]: the authority admits it through the
//! rate limiter, resolves the identity and device, checks the challenge for
//! expiry and replay, verifies the signature, and only then mutates state.
//! Every state change publishes an event through the priority fabric under
//! the operation's correlation context, after the mutation is committed, so
//! no subscriber ever observes an effect before its cause.

#![forbid(unsafe_code)]

pub mod authority;
pub mod reports;

pub use authority::IdentityAuthority;
pub use reports::{HealthStatus, SystemStats};

// The façade's vocabulary, re-exported so callers depend on one crate.
pub use sigil_core::{
    AuthLevel, AuthorityConfig, AuthorityError, AuthorityResult, Clock, CorrelationId, DeviceId,
    EventId, IdentityId, ManualClock, RiskWeights, Scope, ServiceId, SessionId, SystemClock,
    TrustLevel,
};
pub use sigil_crypto::KeyAlgorithm;
pub use sigil_fabric::{
    CorrelationContext, EventEnvelope, EventFilter, EventPayload, EventType, Priority,
    SubscriberHandler, SubscriberId,
};
pub use sigil_identity::{Challenge, DeviceKey, Identity, LinkProof, VerificationOutcome};
pub use sigil_session::{RiskAction, RiskAssessment, Session, SessionValidation};
