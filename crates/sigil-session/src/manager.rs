//! Session manager
//!
//! Owns every live session and the per-identity issuance order used for FIFO
//! eviction. Issuance preconditions (proof verification, correlation replay,
//! risk refusal) are sequenced by the façade; the manager enforces the
//! invariants that belong to the session table itself: the per-identity cap,
//! expiry, status transitions, and scope subsumption at validation.

use crate::risk::{reassess, RiskAssessment};
use serde::{Deserialize, Serialize};
use sigil_core::time::ns_to_secs;
use sigil_core::{
    AuthorityError, AuthorityResult, CorrelationId, DeviceId, IdentityId, Scope, SessionId,
    TrustLevel,
};
use sigil_identity::IdentityStore;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Usable until expiry or revocation
    Active,
    /// Lifetime elapsed
    Expired,
    /// Explicitly revoked
    Revoked,
}

/// A scoped, time-bounded session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token identifying the session
    pub session_id: SessionId,
    /// Identity the session belongs to
    pub identity: IdentityId,
    /// Device whose proof established the session
    pub device_id: DeviceId,
    /// Capabilities granted to the session
    pub scopes: BTreeSet<Scope>,
    /// Issuance instant
    pub issued_at_ns: u64,
    /// Expiry instant
    pub expires_at_ns: u64,
    /// Last validated use
    pub last_activity_at_ns: u64,
    /// Risk score at issuance (0-10)
    pub risk_score: u8,
    /// Correlation under which the session was issued
    pub correlation: CorrelationId,
    /// Lifecycle state
    pub status: SessionStatus,
}

impl Session {
    /// Whether every required scope is subsumed by this session's scopes
    pub fn covers(&self, required: &[Scope]) -> bool {
        required
            .iter()
            .all(|r| self.scopes.iter().any(|held| held.subsumes(*r)))
    }
}

/// A successful validation verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionValidation {
    /// Defensive copy of the validated session
    pub session: Session,
    /// Whole seconds until expiry
    pub seconds_remaining: u64,
    /// Risk verdict computed at this validation
    pub risk: RiskAssessment,
}

/// Owner of the session table
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: HashMap<SessionId, Session>,
    by_identity: HashMap<IdentityId, VecDeque<SessionId>>,
    max_per_identity: usize,
}

impl SessionManager {
    /// Create a manager evicting beyond `max_per_identity` sessions
    pub fn new(max_per_identity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            by_identity: HashMap::new(),
            max_per_identity,
        }
    }

    /// Insert a freshly issued session
    ///
    /// When the identity is at its cap the oldest session is evicted FIFO
    /// and returned so the caller can audit the eviction.
    pub fn insert(&mut self, session: Session) -> Option<Session> {
        let order = self.by_identity.entry(session.identity.clone()).or_default();
        let evicted = if order.len() >= self.max_per_identity {
            order
                .pop_front()
                .and_then(|oldest| self.sessions.remove(&oldest))
        } else {
            None
        };

        let order = self.by_identity.entry(session.identity.clone()).or_default();
        order.push_back(session.session_id);
        tracing::debug!(
            session = %session.session_id,
            identity = %session.identity,
            evicted = evicted.is_some(),
            "session inserted"
        );
        self.sessions.insert(session.session_id, session);
        evicted
    }

    /// Validate a session against required scopes
    ///
    /// Checks run in order: existence, expiry (expired sessions are deleted
    /// on sight), status, scope subsumption, owning identity still enabled,
    /// device binding still live. Success advances `last_activity_at_ns` and
    /// reassesses risk.
    pub fn validate(
        &mut self,
        session_id: &SessionId,
        required: &[Scope],
        store: &IdentityStore,
        now_ns: u64,
    ) -> AuthorityResult<SessionValidation> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| AuthorityError::session_invalid("no such session"))?;

        if now_ns >= session.expires_at_ns {
            let identity = session.identity.clone();
            self.sessions.remove(session_id);
            if let Some(order) = self.by_identity.get_mut(&identity) {
                order.retain(|sid| sid != session_id);
            }
            return Err(AuthorityError::expired("session lifetime elapsed"));
        }
        if session.status != SessionStatus::Active {
            return Err(AuthorityError::session_invalid("session revoked"));
        }
        if !session.covers(required) {
            return Err(AuthorityError::permission_denied(
                "required scope not held by session",
            ));
        }
        let identity = store
            .get_enabled(&session.identity)
            .map_err(|_| AuthorityError::session_invalid("identity no longer enabled"))?;
        let device_live = identity
            .device(&session.device_id)
            .is_some_and(|d| d.trust != TrustLevel::Revoked);
        if !device_live {
            return Err(AuthorityError::session_invalid("bound device revoked"));
        }

        let risk = reassess(
            session.risk_score,
            session.expires_at_ns,
            session.last_activity_at_ns,
            now_ns,
        );
        session.last_activity_at_ns = now_ns;
        Ok(SessionValidation {
            seconds_remaining: ns_to_secs(session.expires_at_ns - now_ns),
            session: session.clone(),
            risk,
        })
    }

    /// Revoke one session; returns the session for audit
    pub fn revoke(&mut self, session_id: &SessionId) -> AuthorityResult<Session> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| AuthorityError::SessionNotFound {
                session: session_id.to_string(),
            })?;
        session.status = SessionStatus::Revoked;
        tracing::info!(session = %session_id, identity = %session.identity, "session revoked");
        Ok(session.clone())
    }

    /// Revoke every session of an identity; returns the affected ids
    pub fn revoke_all_for_identity(&mut self, identity: &IdentityId) -> Vec<SessionId> {
        self.revoke_matching(identity, |_| true)
    }

    /// Revoke the sessions bound to one device of an identity
    pub fn revoke_for_device(&mut self, identity: &IdentityId, device: &DeviceId) -> Vec<SessionId> {
        self.revoke_matching(identity, |session| session.device_id == *device)
    }

    fn revoke_matching(
        &mut self,
        identity: &IdentityId,
        matches: impl Fn(&Session) -> bool,
    ) -> Vec<SessionId> {
        let Some(order) = self.by_identity.get(identity) else {
            return Vec::new();
        };
        let mut revoked = Vec::new();
        for sid in order.clone() {
            if let Some(session) = self.sessions.get_mut(&sid) {
                if session.status == SessionStatus::Active && matches(session) {
                    session.status = SessionStatus::Revoked;
                    revoked.push(sid);
                }
            }
        }
        if !revoked.is_empty() {
            tracing::info!(identity = %identity, count = revoked.len(), "sessions revoked in bulk");
        }
        revoked
    }

    /// Fetch a session without mutating it
    pub fn get(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    /// Number of sessions currently active
    pub fn active_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .count()
    }

    /// Active session count for one identity
    pub fn active_count_for(&self, identity: &IdentityId) -> usize {
        self.by_identity
            .get(identity)
            .map(|order| {
                order
                    .iter()
                    .filter(|sid| {
                        self.sessions
                            .get(sid)
                            .is_some_and(|s| s.status == SessionStatus::Active)
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    /// Drop expired and revoked sessions from the table
    pub fn sweep(&mut self, now_ns: u64) {
        let dead: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.status != SessionStatus::Active || now_ns >= s.expires_at_ns)
            .map(|s| s.session_id)
            .collect();
        for sid in dead {
            if let Some(session) = self.sessions.remove(&sid) {
                if let Some(order) = self.by_identity.get_mut(&session.identity) {
                    order.retain(|held| held != &sid);
                }
            }
        }
        self.by_identity.retain(|_, order| !order.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskAction;
    use sigil_core::time::NANOS_PER_SEC;
    use sigil_core::AuthorityConfig;
    use sigil_crypto::KeyAlgorithm;
    use sigil_identity::DeviceKey;
    use std::collections::BTreeMap;

    fn store_with_alice() -> (IdentityStore, IdentityId) {
        let id = IdentityId::from_text("acct-alice");
        let mut store = IdentityStore::new();
        store
            .create(
                id.clone(),
                DeviceKey::new(
                    DeviceId::new("laptop"),
                    KeyAlgorithm::Ed25519,
                    vec![1u8; 32],
                    0,
                ),
                BTreeMap::new(),
                BTreeSet::new(),
                0,
            )
            .unwrap();
        (store, id)
    }

    fn session(n: u8, identity: &IdentityId, scopes: &[Scope], now: u64) -> Session {
        Session {
            session_id: SessionId::from_bytes([n; 16]),
            identity: identity.clone(),
            device_id: DeviceId::new("laptop"),
            scopes: scopes.iter().copied().collect(),
            issued_at_ns: now,
            expires_at_ns: now + 3_600 * NANOS_PER_SEC,
            last_activity_at_ns: now,
            risk_score: 1,
            correlation: CorrelationId::new(),
            status: SessionStatus::Active,
        }
    }

    #[test]
    fn scope_subsumption() {
        let (store, alice) = store_with_alice();
        let mut manager = SessionManager::new(10);
        let s = session(1, &alice, &[Scope::WalletTransfer], 0);
        let sid = s.session_id;
        manager.insert(s);

        manager
            .validate(&sid, &[Scope::WalletTransfer], &store, 10)
            .unwrap();
        let err = manager
            .validate(&sid, &[Scope::GovFinalize], &store, 20)
            .unwrap_err();
        assert_eq!(err.code(), "permission_denied");
        let err = manager
            .validate(&sid, &[Scope::AdminAll], &store, 30)
            .unwrap_err();
        assert_eq!(err.code(), "permission_denied");
    }

    #[test]
    fn wildcard_session_covers_everything() {
        let (store, alice) = store_with_alice();
        let mut manager = SessionManager::new(10);
        let s = session(1, &alice, &[Scope::AdminAll], 0);
        let sid = s.session_id;
        manager.insert(s);

        manager
            .validate(&sid, &[Scope::GovFinalize, Scope::EscrowRelease], &store, 10)
            .unwrap();
    }

    #[test]
    fn expired_sessions_are_deleted_on_sight() {
        let (store, alice) = store_with_alice();
        let mut manager = SessionManager::new(10);
        let s = session(1, &alice, &[Scope::WalletTransfer], 0);
        let sid = s.session_id;
        let expires = s.expires_at_ns;
        manager.insert(s);

        let err = manager
            .validate(&sid, &[Scope::WalletTransfer], &store, expires)
            .unwrap_err();
        assert_eq!(err.code(), "expired");
        // Gone entirely, not merely marked.
        let err = manager
            .validate(&sid, &[Scope::WalletTransfer], &store, expires)
            .unwrap_err();
        assert_eq!(err.code(), "session_invalid");
        assert_eq!(manager.active_count_for(&alice), 0);
    }

    #[test]
    fn eviction_is_fifo_at_the_cap() {
        let (store, alice) = store_with_alice();
        let mut manager = SessionManager::new(sigil_core::constants::MAX_SESSIONS_PER_IDENTITY);
        for n in 1..=10u8 {
            assert!(manager.insert(session(n, &alice, &[Scope::WalletTransfer], n as u64)).is_none());
        }
        let evicted = manager
            .insert(session(11, &alice, &[Scope::WalletTransfer], 11))
            .expect("oldest session evicted");
        assert_eq!(evicted.session_id, SessionId::from_bytes([1; 16]));
        assert_eq!(manager.active_count_for(&alice), 10);
        assert!(manager
            .validate(
                &SessionId::from_bytes([1; 16]),
                &[Scope::WalletTransfer],
                &store,
                12
            )
            .is_err());
    }

    #[test]
    fn revocation_and_bulk_revocation() {
        let (store, alice) = store_with_alice();
        let mut manager = SessionManager::new(10);
        let s1 = session(1, &alice, &[Scope::WalletTransfer], 0);
        let s2 = session(2, &alice, &[Scope::WalletTransfer], 0);
        let (sid1, sid2) = (s1.session_id, s2.session_id);
        manager.insert(s1);
        manager.insert(s2);

        manager.revoke(&sid1).unwrap();
        let err = manager
            .validate(&sid1, &[Scope::WalletTransfer], &store, 10)
            .unwrap_err();
        assert_eq!(err.code(), "session_invalid");
        manager.validate(&sid2, &[Scope::WalletTransfer], &store, 10).unwrap();

        assert_eq!(manager.revoke_all_for_identity(&alice), vec![sid2]);
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn device_scoped_revocation_spares_other_devices() {
        let (mut store, alice) = store_with_alice();
        store
            .add_device(
                &alice,
                DeviceKey::new(
                    DeviceId::new("phone"),
                    KeyAlgorithm::Ed25519,
                    vec![2u8; 32],
                    0,
                ),
                &AuthorityConfig::default(),
                0,
            )
            .unwrap();

        let mut manager = SessionManager::new(10);
        let laptop = session(1, &alice, &[Scope::WalletTransfer], 0);
        let mut phone = session(2, &alice, &[Scope::WalletTransfer], 0);
        phone.device_id = DeviceId::new("phone");
        let (laptop_sid, phone_sid) = (laptop.session_id, phone.session_id);
        manager.insert(laptop);
        manager.insert(phone);

        let revoked = manager.revoke_for_device(&alice, &DeviceId::new("laptop"));
        assert_eq!(revoked, vec![laptop_sid]);
        manager
            .validate(&phone_sid, &[Scope::WalletTransfer], &store, 10)
            .unwrap();
    }

    #[test]
    fn disabled_identity_invalidates_sessions() {
        let (mut store, alice) = store_with_alice();
        let mut manager = SessionManager::new(10);
        let s = session(1, &alice, &[Scope::WalletTransfer], 0);
        let sid = s.session_id;
        manager.insert(s);

        store.disable(&alice, 5).unwrap();
        let err = manager
            .validate(&sid, &[Scope::WalletTransfer], &store, 10)
            .unwrap_err();
        assert_eq!(err.code(), "session_invalid");
    }

    #[test]
    fn validation_updates_activity_and_reports_remaining() {
        let (store, alice) = store_with_alice();
        let mut manager = SessionManager::new(10);
        let s = session(1, &alice, &[Scope::WalletTransfer], 0);
        let sid = s.session_id;
        manager.insert(s);

        let verdict = manager
            .validate(&sid, &[Scope::WalletTransfer], &store, 600 * NANOS_PER_SEC)
            .unwrap();
        assert_eq!(verdict.seconds_remaining, 3_000);
        assert_eq!(verdict.session.last_activity_at_ns, 600 * NANOS_PER_SEC);
        assert_eq!(verdict.risk.action, RiskAction::Allow);
    }

    #[test]
    fn sweep_clears_dead_sessions() {
        let (_, alice) = store_with_alice();
        let mut manager = SessionManager::new(10);
        let s1 = session(1, &alice, &[Scope::WalletTransfer], 0);
        let s2 = session(2, &alice, &[Scope::WalletTransfer], 0);
        let sid1 = s1.session_id;
        manager.insert(s1);
        manager.insert(s2);
        manager.revoke(&sid1).unwrap();

        manager.sweep(10);
        assert_eq!(manager.active_count(), 1);
        assert!(manager.get(&sid1).is_none());

        manager.sweep(4_000 * NANOS_PER_SEC);
        assert_eq!(manager.active_count(), 0);
    }
}
