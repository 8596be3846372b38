//! # Sigil Session
//!
//! Scoped, time-bounded session tokens that short-circuit the challenge and
//! proof dance for subsequent calls. A session binds an identity and one of
//! its devices to a set of scopes; validation enforces scope subsumption
//! (exact match or the `admin:*` wildcard) and reassesses risk on every use.
//!
//! Sessions are deliberately in-memory only: a restart invalidates them,
//! which is the intended failure-recovery posture for a trust authority.

#![forbid(unsafe_code)]

pub mod manager;
pub mod risk;

pub use manager::{Session, SessionManager, SessionStatus, SessionValidation};
pub use risk::{clamp_ttl, initial_risk, reassess, RiskAction, RiskAssessment};
