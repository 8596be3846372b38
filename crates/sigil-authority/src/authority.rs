//! The authority façade
//!
//! One struct owns every subsystem and serializes every operation, so each
//! check-then-mutate sequence is a transaction by construction. Events are
//! emitted only after the state change they describe has been committed;
//! compound operations record advisory compensation events when a later
//! step fails after earlier mutations stood.

use crate::reports::{HealthStatus, SystemStats};
use sigil_core::constants::{ADMIN_ROLE, MAX_SESSIONS_PER_IDENTITY, WALLET_METADATA_KEY};
use sigil_core::time::secs_to_ns;
use sigil_core::{
    required_scope_level, role_min_level, AuthLevel, AuthorityConfig, AuthorityError,
    AuthorityResult, Clock, CorrelationId, DeviceId, EventId, IdentityId, Scope, ServiceId,
    SessionId, SystemClock, TrustLevel,
};
use sigil_fabric::{
    CorrelationContext, CorrelationTracker, CycleReport, EventDraft, EventFabric, EventFilter,
    EventPayload, EventType, Priority, SubscriberHandler, SubscriberId,
};
use sigil_identity::{
    Challenge, DeviceKey, Identity, IdentityStore, LinkProof, RateLimiter, ReplayLedger,
    VerificationOutcome,
};
use sigil_session::{clamp_ttl, initial_risk, Session, SessionManager, SessionStatus,
    SessionValidation};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// System name stamped on correlations and event envelopes
const SYSTEM: &str = "sigil-authority";

/// The identity and session authority
///
/// All state lives here; callers hold the struct (or something owning it)
/// and invoke operations one at a time.
#[derive(Debug)]
pub struct IdentityAuthority {
    config: AuthorityConfig,
    service_id: ServiceId,
    clock: Arc<dyn Clock>,
    store: IdentityStore,
    nonces: ReplayLedger,
    session_replay: ReplayLedger,
    limiter: RateLimiter,
    sessions: SessionManager,
    fabric: EventFabric,
    tracker: CorrelationTracker,
    started_at_ns: u64,
}

impl IdentityAuthority {
    /// Create an authority on the system clock
    pub fn new(service_id: ServiceId, config: AuthorityConfig) -> AuthorityResult<Self> {
        Self::with_clock(service_id, config, Arc::new(SystemClock))
    }

    /// Create an authority on an explicit clock (tests use a manual one)
    pub fn with_clock(
        service_id: ServiceId,
        config: AuthorityConfig,
        clock: Arc<dyn Clock>,
    ) -> AuthorityResult<Self> {
        config.validate()?;
        let started_at_ns = clock.now_ns();
        Ok(Self {
            nonces: ReplayLedger::new(config.replay_window_ns),
            session_replay: ReplayLedger::new(config.replay_window_ns),
            limiter: RateLimiter::new(config.rate_limit_max, config.rate_window_ns),
            sessions: SessionManager::new(MAX_SESSIONS_PER_IDENTITY),
            fabric: EventFabric::new(&config),
            tracker: CorrelationTracker::new(),
            store: IdentityStore::new(),
            service_id,
            config,
            clock,
            started_at_ns,
        })
    }

    /// The principal this authority answers for
    pub fn service_id(&self) -> &ServiceId {
        &self.service_id
    }

    /// The active configuration
    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    // =========================================================================
    // Challenge / proof operations
    // =========================================================================

    /// Issue a signing challenge; writes nothing
    pub fn issue_challenge(
        &self,
        identity: &IdentityId,
        audience: ServiceId,
        method: &str,
    ) -> AuthorityResult<Challenge> {
        sigil_identity::issue_challenge(
            &self.store,
            identity,
            audience,
            method,
            &self.config,
            self.clock.now_ns(),
        )
    }

    /// Boolean fast path: collapses every failure to `false`
    pub fn verify(&mut self, identity: &IdentityId, proof: &LinkProof) -> bool {
        self.verify_with_level(identity, proof, AuthLevel::Basic)
            .is_ok()
    }

    /// Verify a proof at a minimum authentication level
    pub fn verify_with_level(
        &mut self,
        identity: &IdentityId,
        proof: &LinkProof,
        min_level: AuthLevel,
    ) -> AuthorityResult<VerificationOutcome> {
        let ctx = self.context_for(None, "verify_with_level");
        self.tracker.track_step(
            ctx.correlation_id,
            "verify_proof",
            SYSTEM,
            "verify",
            self.clock.now_ns(),
        );
        let result = self.verify_proof(identity, proof, min_level, &ctx, false);
        self.close_step(&ctx, &result);
        result
    }

    // =========================================================================
    // Session operations
    // =========================================================================

    /// Establish a scoped session from a verified proof
    ///
    /// Preconditions run in order: rate admission, correlation replay check,
    /// device liveness, proof verification at the strongest requested scope's
    /// level, then risk refusal. The TTL falls back to the default when zero
    /// or over the ceiling; the per-identity cap evicts the oldest session.
    pub fn start_session(
        &mut self,
        identity: &IdentityId,
        device_id: &DeviceId,
        scopes: &[Scope],
        ttl_secs: u64,
        proof: &LinkProof,
        correlation: Option<CorrelationId>,
    ) -> AuthorityResult<Session> {
        let now_ns = self.clock.now_ns();
        let ctx = self.context_for(correlation, "start_session");
        self.tracker
            .track_step(ctx.correlation_id, "verify_proof", SYSTEM, "verify", now_ns);

        let result = self.start_session_inner(identity, device_id, scopes, ttl_secs, proof, &ctx);
        if let Err(err) = &result {
            self.tracker.complete_step(
                ctx.correlation_id,
                false,
                Some(err.code().to_string()),
                self.clock.now_ns(),
            );
        }
        result
    }

    fn start_session_inner(
        &mut self,
        identity: &IdentityId,
        device_id: &DeviceId,
        scopes: &[Scope],
        ttl_secs: u64,
        proof: &LinkProof,
        ctx: &CorrelationContext,
    ) -> AuthorityResult<Session> {
        let now_ns = self.clock.now_ns();
        if scopes.is_empty() {
            return Err(AuthorityError::InvalidScope {
                scope: "(empty scope set)".to_string(),
            });
        }

        // Rate admission covers the whole establishment, proof included.
        self.limiter.admit(identity, now_ns)?;

        // Correlation replay: the same establishment request may not run twice.
        let replay_key = ctx.correlation_id.uuid().to_string();
        if self.session_replay.is_consumed(&replay_key) {
            return Err(AuthorityError::Replayed {
                message: "session establishment correlation already used".to_string(),
            });
        }

        if proof.device_id != *device_id {
            return Err(AuthorityError::unauthorized(
                "proof device does not match requested session device",
            ));
        }

        // Device snapshot before verification advances `last_used_at`.
        let (trust, last_used_at_ns) = {
            let record = self.store.get_enabled(identity)?;
            let device =
                record
                    .device(device_id)
                    .ok_or_else(|| AuthorityError::DeviceUnknown {
                        device: device_id.to_string(),
                    })?;
            if device.trust == TrustLevel::Revoked {
                return Err(AuthorityError::DeviceRevoked {
                    device: device_id.to_string(),
                });
            }
            (device.trust, device.last_used_at_ns)
        };

        let min_level = required_scope_level(scopes);
        self.verify_proof(identity, proof, min_level, ctx, true)?;
        self.tracker
            .complete_step(ctx.correlation_id, true, None, now_ns);

        // Risk refusal happens after verification; the consumed nonce stands,
        // which is what the compensation record documents.
        self.tracker
            .track_step(ctx.correlation_id, "assess_risk", SYSTEM, "risk", now_ns);
        let ttl_s = clamp_ttl(ttl_secs, &self.config);
        let (score, factors) = initial_risk(
            &self.config.risk,
            trust,
            scopes,
            ttl_s,
            last_used_at_ns,
            now_ns,
        );
        if score >= self.config.high_risk_threshold {
            self.emit_event(
                EventPayload::SecurityIncident {
                    identity: Some(identity.clone()),
                    description: format!(
                        "session refused at risk {score} ({})",
                        factors.join(", ")
                    ),
                },
                Priority::High,
                ctx,
            );
            self.emit_event(
                EventPayload::CompensationRecorded {
                    operation: "start_session".to_string(),
                    step: "assess_risk".to_string(),
                    reason: "risk_too_high".to_string(),
                },
                Priority::High,
                ctx,
            );
            return Err(AuthorityError::RiskTooHigh { score });
        }
        self.tracker
            .complete_step(ctx.correlation_id, true, None, now_ns);

        self.tracker
            .track_step(ctx.correlation_id, "issue_session", SYSTEM, "issue", now_ns);
        let session = Session {
            session_id: SessionId::from_bytes(sigil_crypto::generate_session_token()),
            identity: identity.clone(),
            device_id: device_id.clone(),
            scopes: scopes.iter().copied().collect(),
            issued_at_ns: now_ns,
            expires_at_ns: now_ns + secs_to_ns(ttl_s),
            last_activity_at_ns: now_ns,
            risk_score: score,
            correlation: ctx.correlation_id,
            status: SessionStatus::Active,
        };
        if let Some(evicted) = self.sessions.insert(session.clone()) {
            self.emit_event(
                EventPayload::SessionEvicted {
                    identity: evicted.identity.clone(),
                    session: evicted.session_id,
                },
                Priority::Normal,
                ctx,
            );
        }
        self.session_replay.consume(replay_key, now_ns);
        self.emit_event(
            EventPayload::SessionIssued {
                identity: identity.clone(),
                session: session.session_id,
                device_id: device_id.clone(),
                scopes: scopes.to_vec(),
            },
            Priority::Normal,
            ctx,
        );
        self.tracker
            .complete_step(ctx.correlation_id, true, None, now_ns);
        Ok(session)
    }

    /// Validate a session against required scopes
    pub fn validate_session(
        &mut self,
        session_id: &SessionId,
        required: &[Scope],
    ) -> AuthorityResult<SessionValidation> {
        self.sessions
            .validate(session_id, required, &self.store, self.clock.now_ns())
    }

    /// Revoke one session; the proof must come from its owner or an admin
    pub fn revoke_session(
        &mut self,
        session_id: &SessionId,
        proof: &LinkProof,
    ) -> AuthorityResult<()> {
        let ctx = self.context_for(None, "revoke_session");
        let owner = self
            .sessions
            .get(session_id)
            .map(|session| session.identity.clone())
            .ok_or_else(|| AuthorityError::SessionNotFound {
                session: session_id.to_string(),
            })?;
        self.verify_actor_proof(&owner, proof, AuthLevel::Basic, &ctx)?;
        let session = self.sessions.revoke(session_id)?;
        self.emit_event(
            EventPayload::SessionRevoked {
                identity: session.identity.clone(),
                session: session.session_id,
            },
            Priority::Normal,
            &ctx,
        );
        Ok(())
    }

    /// Revoke every session of an identity
    pub fn revoke_all_sessions(
        &mut self,
        identity: &IdentityId,
        proof: &LinkProof,
    ) -> AuthorityResult<usize> {
        let ctx = self.context_for(None, "revoke_all_sessions");
        self.verify_actor_proof(identity, proof, AuthLevel::Basic, &ctx)?;
        let revoked = self.revoke_sessions_with_events(identity, None, &ctx);
        Ok(revoked)
    }

    // =========================================================================
    // Identity administration
    // =========================================================================

    /// Register a new identity
    ///
    /// Requires an administrator proof once any enabled identity holds the
    /// admin role; until then creation is open so the first administrator
    /// can be seeded.
    pub fn create_identity(
        &mut self,
        identity: IdentityId,
        initial_device: DeviceKey,
        metadata: BTreeMap<String, String>,
        roles: BTreeSet<String>,
        admin_proof: Option<&LinkProof>,
    ) -> AuthorityResult<()> {
        let ctx = self.context_for(None, "create_identity");
        if self.store.any_enabled_with_role(ADMIN_ROLE) {
            let proof = admin_proof.ok_or_else(|| {
                AuthorityError::unauthorized("identity creation requires an admin proof")
            })?;
            self.verify_admin_proof(proof, &ctx)?;
        }
        let device_id = initial_device.device_id.clone();
        self.store.create(
            identity.clone(),
            initial_device,
            metadata,
            roles,
            self.clock.now_ns(),
        )?;
        self.emit_event(
            EventPayload::IdentityCreated {
                identity,
                device_id,
            },
            Priority::High,
            &ctx,
        );
        Ok(())
    }

    /// Add a device key to an identity (admin operation)
    pub fn add_device_key(
        &mut self,
        identity: &IdentityId,
        device: DeviceKey,
        admin_proof: &LinkProof,
    ) -> AuthorityResult<()> {
        let ctx = self.context_for(None, "add_device_key");
        self.verify_admin_proof(admin_proof, &ctx)?;
        let device_id = device.device_id.clone();
        self.store
            .add_device(identity, device, &self.config, self.clock.now_ns())?;
        self.emit_event(
            EventPayload::DeviceAdded {
                identity: identity.clone(),
                device_id,
            },
            Priority::High,
            &ctx,
        );
        Ok(())
    }

    /// Revoke a device and every session bound to it
    ///
    /// The proof must come from a *different* device: either another device
    /// of the same identity, or an administrator's.
    pub fn revoke_device(
        &mut self,
        identity: &IdentityId,
        device_id: &DeviceId,
        proof: &LinkProof,
    ) -> AuthorityResult<()> {
        let ctx = self.context_for(None, "revoke_device");
        if proof.device_id == *device_id {
            return Err(AuthorityError::CannotRevokeOwnDevice);
        }
        self.verify_actor_proof(identity, proof, AuthLevel::Basic, &ctx)?;
        self.store
            .revoke_device(identity, device_id, self.clock.now_ns())?;
        let revoked = self.revoke_sessions_with_events(identity, Some(device_id), &ctx);
        self.emit_event(
            EventPayload::DeviceRevoked {
                identity: identity.clone(),
                device_id: device_id.clone(),
                sessions_revoked: revoked,
            },
            Priority::High,
            &ctx,
        );
        Ok(())
    }

    /// Rotate a device's key material in place
    ///
    /// Sessions bound to the device are revoked: they were established by a
    /// key that no longer speaks for it.
    pub fn rotate_device_key(
        &mut self,
        identity: &IdentityId,
        device_id: &DeviceId,
        new_public_key: Vec<u8>,
        algo: sigil_crypto::KeyAlgorithm,
        proof: &LinkProof,
    ) -> AuthorityResult<()> {
        let ctx = self.context_for(None, "rotate_device_key");
        self.verify_actor_proof(identity, proof, AuthLevel::Basic, &ctx)?;
        self.store.rotate_device_key(
            identity,
            device_id,
            new_public_key,
            algo,
            self.clock.now_ns(),
        )?;
        self.revoke_sessions_with_events(identity, Some(device_id), &ctx);
        self.emit_event(
            EventPayload::DeviceKeyRotated {
                identity: identity.clone(),
                device_id: device_id.clone(),
            },
            Priority::High,
            &ctx,
        );
        Ok(())
    }

    /// Grant a role (admin operation)
    pub fn grant_role(
        &mut self,
        identity: &IdentityId,
        role: &str,
        admin_proof: &LinkProof,
    ) -> AuthorityResult<()> {
        let ctx = self.context_for(None, "grant_role");
        self.verify_admin_proof(admin_proof, &ctx)?;
        self.store
            .grant_role(identity, role, self.clock.now_ns())?;
        self.emit_event(
            EventPayload::RoleGranted {
                identity: identity.clone(),
                role: role.to_string(),
            },
            Priority::High,
            &ctx,
        );
        Ok(())
    }

    /// Revoke a role (admin operation)
    pub fn revoke_role(
        &mut self,
        identity: &IdentityId,
        role: &str,
        admin_proof: &LinkProof,
    ) -> AuthorityResult<()> {
        let ctx = self.context_for(None, "revoke_role");
        self.verify_admin_proof(admin_proof, &ctx)?;
        self.store
            .revoke_role(identity, role, self.clock.now_ns())?;
        self.emit_event(
            EventPayload::RoleRevoked {
                identity: identity.clone(),
                role: role.to_string(),
            },
            Priority::High,
            &ctx,
        );
        Ok(())
    }

    /// Disable an identity; its sessions die and its rate window is dropped
    pub fn disable_identity(
        &mut self,
        identity: &IdentityId,
        admin_proof: &LinkProof,
    ) -> AuthorityResult<()> {
        let ctx = self.context_for(None, "disable_identity");
        self.verify_admin_proof(admin_proof, &ctx)?;
        self.store.disable(identity, self.clock.now_ns())?;
        self.revoke_sessions_with_events(identity, None, &ctx);
        self.limiter.remove(identity);
        self.emit_event(
            EventPayload::IdentityDisabled {
                identity: identity.clone(),
            },
            Priority::Critical,
            &ctx,
        );
        Ok(())
    }

    /// Bind an external wallet identity; requires an elevated self-proof
    pub fn link_wallet(
        &mut self,
        identity: &IdentityId,
        wallet: &str,
        proof: &LinkProof,
    ) -> AuthorityResult<()> {
        let ctx = self.context_for(None, "link_wallet");
        let owner = self.proof_owner(proof)?;
        if owner != *identity {
            return Err(AuthorityError::unauthorized(
                "wallet links require a proof from the identity itself",
            ));
        }
        self.verify_proof(identity, proof, AuthLevel::Elevated, &ctx, false)?;
        self.store.set_metadata(
            identity,
            WALLET_METADATA_KEY,
            wallet.to_string(),
            self.clock.now_ns(),
        )?;
        self.emit_event(
            EventPayload::WalletLinked {
                identity: identity.clone(),
                wallet: wallet.to_string(),
            },
            Priority::Normal,
            &ctx,
        );
        Ok(())
    }

    /// Toggle MFA enrollment (admin operation)
    pub fn set_mfa(
        &mut self,
        identity: &IdentityId,
        enabled: bool,
        admin_proof: &LinkProof,
    ) -> AuthorityResult<()> {
        let ctx = self.context_for(None, "set_mfa");
        self.verify_admin_proof(admin_proof, &ctx)?;
        self.store
            .set_mfa(identity, enabled, self.clock.now_ns())?;
        self.emit_event(
            EventPayload::MfaToggled {
                identity: identity.clone(),
                enabled,
            },
            Priority::High,
            &ctx,
        );
        Ok(())
    }

    // =========================================================================
    // Event fabric surface
    // =========================================================================

    /// Register an event subscriber
    pub fn subscribe(&mut self, filter: EventFilter, handler: SubscriberHandler) -> SubscriberId {
        self.fabric.subscribe(filter, handler)
    }

    /// Remove an event subscriber
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.fabric.unsubscribe(id)
    }

    /// Run one delivery cycle of the event fabric
    pub fn process_events(&mut self) -> CycleReport {
        self.fabric.process_cycle(self.clock.now_ns())
    }

    /// Route a domain event through the fabric on behalf of another service
    ///
    /// Unlike the authority's own emissions, overflow surfaces to the caller
    /// so the emitting service can shed load.
    pub fn publish_domain_event(
        &mut self,
        event_type: EventType,
        body: serde_json::Value,
        priority: Priority,
        originating_system: &str,
        correlation: Option<CorrelationId>,
    ) -> AuthorityResult<EventId> {
        let ctx = self.context_for(correlation, "publish_domain_event");
        let draft = EventDraft::new(
            EventPayload::Domain { event_type, body },
            priority,
            originating_system,
            ctx,
        );
        self.fabric.emit(draft, self.clock.now_ns())
    }

    // =========================================================================
    // Queries & maintenance
    // =========================================================================

    /// Fetch a defensive copy of an identity record
    pub fn get_identity(&self, identity: &IdentityId) -> Option<Identity> {
        self.store.get(identity).cloned()
    }

    /// Whether the identity exists and carries the role
    pub fn has_role(&self, identity: &IdentityId, role: &str) -> bool {
        self.store.has_role(identity, role)
    }

    /// Fetch a session, if it exists
    pub fn get_session(&self, session_id: &SessionId) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    /// Correlation trace for one operation
    pub fn correlation_trace(&self, correlation: &CorrelationId) -> &[sigil_fabric::FlowStep] {
        self.tracker.trace(correlation)
    }

    /// Liveness snapshot
    pub fn health_check(&self) -> HealthStatus {
        let queue_depths = self.fabric.queue_depths();
        HealthStatus {
            healthy: queue_depths
                .iter()
                .all(|depth| *depth < self.config.max_queue_size),
            identities: self.store.len(),
            enabled_identities: self.store.enabled_count(),
            active_sessions: self.sessions.active_count(),
            queue_depths,
            retry_depth: self.fabric.retry_depth(),
            uptime_ns: self.clock.now_ns().saturating_sub(self.started_at_ns),
        }
    }

    /// Aggregate statistics snapshot
    pub fn get_system_stats(&self) -> SystemStats {
        SystemStats {
            identities: self.store.len(),
            enabled_identities: self.store.enabled_count(),
            active_sessions: self.sessions.active_count(),
            consumed_nonces: self.nonces.len(),
            rate_windows: self.limiter.len(),
            correlations: self.tracker.len(),
            fabric: self.fabric.metrics().clone(),
            queue_depths: self.fabric.queue_depths(),
            event_history: self.fabric.history_len(),
            uptime_ns: self.clock.now_ns().saturating_sub(self.started_at_ns),
        }
    }

    /// Run the periodic eviction sweeps across every subsystem
    pub fn sweep(&mut self) {
        let now_ns = self.clock.now_ns();
        self.nonces.sweep(now_ns);
        self.session_replay.sweep(now_ns);
        self.limiter.sweep(now_ns);
        self.sessions.sweep(now_ns);
        self.fabric.prune_history(now_ns);
        self.tracker.prune(
            now_ns,
            self.config
                .retention_days
                .saturating_mul(sigil_core::time::NANOS_PER_DAY),
        );
    }

    /// Snapshot every identity record for external replication
    pub fn export_identities(&self) -> Vec<Identity> {
        self.store.iter().cloned().collect()
    }

    /// Restore identity records from a snapshot and rebuild the indexes
    ///
    /// Sessions, nonces, rate windows, and queued events are deliberately
    /// not restored; a restart invalidates them by design.
    pub fn restore_identities(&mut self, identities: Vec<Identity>) {
        self.store.restore(identities);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn context_for(&mut self, correlation: Option<CorrelationId>, operation: &str) -> CorrelationContext {
        let now_ns = self.clock.now_ns();
        match correlation {
            Some(cid) => match self.tracker.get(&cid) {
                Some(existing) => existing.clone(),
                None => self.tracker.adopt(CorrelationContext {
                    correlation_id: cid,
                    parent_id: None,
                    root_id: cid,
                    system: SYSTEM.to_string(),
                    operation: operation.to_string(),
                    created_at_ns: now_ns,
                }),
            },
            None => self.tracker.start(SYSTEM, operation, now_ns),
        }
    }

    fn emit_event(&mut self, payload: EventPayload, priority: Priority, ctx: &CorrelationContext) {
        let draft = EventDraft::new(payload, priority, SYSTEM, ctx.clone());
        if let Err(err) = self.fabric.emit(draft, self.clock.now_ns()) {
            // Shedding is the documented overflow posture; the state change
            // the event described has already been committed.
            tracing::warn!(code = err.code(), "authority event shed on overflow");
        }
    }

    fn close_step(&mut self, ctx: &CorrelationContext, result: &AuthorityResult<VerificationOutcome>) {
        let (success, error) = match result {
            Ok(_) => (true, None),
            Err(err) => (false, Some(err.code().to_string())),
        };
        self.tracker
            .complete_step(ctx.correlation_id, success, error, self.clock.now_ns());
    }

    /// Run the verification pipeline and publish its outcome events
    fn verify_proof(
        &mut self,
        identity: &IdentityId,
        proof: &LinkProof,
        min_level: AuthLevel,
        ctx: &CorrelationContext,
        preadmitted: bool,
    ) -> AuthorityResult<VerificationOutcome> {
        let now_ns = self.clock.now_ns();
        let result = if preadmitted {
            sigil_identity::verify_preadmitted(
                &mut self.store,
                &mut self.nonces,
                &self.config,
                &self.service_id,
                identity,
                proof,
                min_level,
                now_ns,
            )
        } else {
            sigil_identity::verify_with_level(
                &mut self.store,
                &mut self.nonces,
                &mut self.limiter,
                &self.config,
                &self.service_id,
                identity,
                proof,
                min_level,
                now_ns,
            )
        };

        match &result {
            Ok(outcome) => {
                self.emit_event(
                    EventPayload::VerificationSucceeded {
                        identity: identity.clone(),
                        device_id: proof.device_id.clone(),
                        level: outcome.level,
                    },
                    Priority::Normal,
                    ctx,
                );
            }
            Err(AuthorityError::SignatureInvalid) => {
                self.emit_event(
                    EventPayload::VerificationFailed {
                        identity: identity.clone(),
                        device_id: proof.device_id.clone(),
                        reason: AuthorityError::SignatureInvalid.code().to_string(),
                    },
                    Priority::High,
                    ctx,
                );
                let lockout_until = self
                    .store
                    .get(identity)
                    .and_then(|record| record.security.lockout_until_ns)
                    .filter(|until| *until > now_ns);
                if let Some(until_ns) = lockout_until {
                    self.emit_event(
                        EventPayload::LockoutTriggered {
                            identity: identity.clone(),
                            until_ns,
                        },
                        Priority::Critical,
                        ctx,
                    );
                }
            }
            Err(_) => {}
        }
        result
    }

    fn proof_owner(&self, proof: &LinkProof) -> AuthorityResult<IdentityId> {
        self.store
            .identity_by_device(&proof.device_id)
            .cloned()
            .ok_or_else(|| AuthorityError::unauthorized("proof device is not registered"))
    }

    /// Verify a proof from an administrator and return their identity
    fn verify_admin_proof(
        &mut self,
        proof: &LinkProof,
        ctx: &CorrelationContext,
    ) -> AuthorityResult<IdentityId> {
        let admin = self.proof_owner(proof)?;
        if !self.store.has_role(&admin, ADMIN_ROLE) {
            return Err(AuthorityError::permission_denied(format!(
                "operation requires the {ADMIN_ROLE} role"
            )));
        }
        self.verify_proof(&admin, proof, role_min_level(ADMIN_ROLE), ctx, false)?;
        Ok(admin)
    }

    /// Verify a proof from the target identity itself, or from an admin
    fn verify_actor_proof(
        &mut self,
        target: &IdentityId,
        proof: &LinkProof,
        min_level: AuthLevel,
        ctx: &CorrelationContext,
    ) -> AuthorityResult<()> {
        let owner = self.proof_owner(proof)?;
        if owner == *target {
            self.verify_proof(target, proof, min_level, ctx, false)?;
            Ok(())
        } else if self.store.has_role(&owner, ADMIN_ROLE) {
            self.verify_proof(&owner, proof, role_min_level(ADMIN_ROLE), ctx, false)?;
            Ok(())
        } else {
            Err(AuthorityError::unauthorized(
                "proof identity may not act on this target",
            ))
        }
    }

    /// Revoke sessions (optionally scoped to one device) and emit per-session events
    fn revoke_sessions_with_events(
        &mut self,
        identity: &IdentityId,
        device: Option<&DeviceId>,
        ctx: &CorrelationContext,
    ) -> usize {
        let revoked = match device {
            Some(device_id) => self.sessions.revoke_for_device(identity, device_id),
            None => self.sessions.revoke_all_for_identity(identity),
        };
        for session_id in &revoked {
            self.emit_event(
                EventPayload::SessionRevoked {
                    identity: identity.clone(),
                    session: *session_id,
                },
                Priority::Normal,
                ctx,
            );
        }
        revoked.len()
    }
}
