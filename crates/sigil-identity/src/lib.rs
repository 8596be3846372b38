//! # Sigil Identity
//!
//! The identity half of the authority: device-bearing identity records with
//! security profiles, the consumed-nonce ledger, the per-identity rate
//! limiter, and the challenge/proof verifier that ties them together.
//!
//! State here is plain owned data. Nothing spawns, locks, or performs I/O;
//! the façade in `sigil-authority` serializes every mutation, which makes
//! each check-then-mutate sequence in this crate a transaction by
//! construction.

#![forbid(unsafe_code)]

pub mod challenge;
pub mod device;
pub mod profile;
pub mod rate_limit;
pub mod replay;
pub mod store;
pub mod verifier;

pub use challenge::{Challenge, LinkProof};
pub use device::DeviceKey;
pub use profile::SecurityProfile;
pub use rate_limit::RateLimiter;
pub use replay::ReplayLedger;
pub use store::{Identity, IdentityStore, Permission};
pub use verifier::{issue_challenge, verify_preadmitted, verify_with_level, VerificationOutcome};
