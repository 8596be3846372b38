//! # Sigil Core
//!
//! Foundation types shared by every crate in the Sigil identity authority:
//! identifier newtypes, the closed error taxonomy with stable wire codes,
//! the scope/role/auth-level vocabulary, configuration, and the clock
//! abstraction used to keep every subsystem deterministic under test.
//!
//! Nothing in this crate performs I/O. All state-bearing components live in
//! the crates layered above (`sigil-identity`, `sigil-session`,
//! `sigil-fabric`, `sigil-authority`).

#![forbid(unsafe_code)]

pub mod access;
pub mod config;
pub mod constants;
pub mod errors;
pub mod identifiers;
pub mod time;

pub use access::{compute_auth_level, required_scope_level, role_min_level, AuthLevel, Scope, TrustLevel};
pub use config::{AuthorityConfig, RiskWeights};
pub use errors::{AuthorityError, AuthorityResult};
pub use identifiers::{CorrelationId, DeviceId, EventId, IdentityId, ServiceId, SessionId};
pub use time::{Clock, ManualClock, SystemClock};
