//! Event model
//!
//! Events are a closed tagged union: the [`EventPayload`] carries the
//! per-variant record, and the parallel [`EventType`] enum indexes the
//! variants for cheap filtering. Domain events the authority does not own
//! (payments, escrow, governance, ...) are routed through the same fabric
//! with an opaque JSON body, but their type tags stay inside the closed set.

use crate::correlation::CorrelationContext;
use serde::{Deserialize, Serialize};
use sigil_core::{AuthLevel, DeviceId, EventId, IdentityId, Scope, SessionId};
use std::collections::BTreeMap;
use std::fmt;

/// Delivery priority lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Drained to empty every cycle
    Critical,
    /// Full batch per cycle
    High,
    /// Half batch per cycle
    Normal,
    /// Quarter batch per cycle
    Low,
}

impl Priority {
    /// All lanes, in drain order
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Wire string for this lane
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }

    /// Index into per-lane storage
    pub(crate) fn lane(self) -> usize {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Normal => 2,
            Self::Low => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type tag of an event, used by subscription filters
///
/// The set is closed; variants the authority itself never emits exist so
/// that domain services can route their events through the same fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum EventType {
    // Identity lifecycle
    IdentityCreated,
    IdentityDisabled,
    DeviceAdded,
    DeviceRevoked,
    DeviceKeyRotated,
    RoleGranted,
    RoleRevoked,
    WalletLinked,
    MfaToggled,
    // Verification and security
    VerificationSucceeded,
    VerificationFailed,
    LockoutTriggered,
    SecurityIncident,
    CompensationRecorded,
    // Sessions
    SessionIssued,
    SessionRevoked,
    SessionEvicted,
    // Routed domain events (not owned by the authority)
    PaymentInitiated,
    PaymentCompleted,
    PaymentFailed,
    EscrowCreated,
    EscrowReleased,
    EscrowDisputed,
    AssetTransferred,
    AssetMinted,
    GovProposalCreated,
    GovVoteCast,
    GovDecisionFinalized,
    WalletCreated,
    WalletDeposit,
    WalletWithdrawal,
    UserRegistered,
    NotificationDispatched,
}

/// Per-variant event payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    /// A new identity was registered
    IdentityCreated {
        /// The registered principal
        identity: IdentityId,
        /// Its initial device
        device_id: DeviceId,
    },
    /// An identity was soft-deleted
    IdentityDisabled {
        /// The disabled principal
        identity: IdentityId,
    },
    /// A device key was added to an identity
    DeviceAdded {
        /// Owning principal
        identity: IdentityId,
        /// The new device
        device_id: DeviceId,
    },
    /// A device key was revoked
    DeviceRevoked {
        /// Owning principal
        identity: IdentityId,
        /// The revoked device
        device_id: DeviceId,
        /// Sessions cut by the revocation
        sessions_revoked: usize,
    },
    /// A device key was rotated in place
    DeviceKeyRotated {
        /// Owning principal
        identity: IdentityId,
        /// The rotated device
        device_id: DeviceId,
    },
    /// A role was granted
    RoleGranted {
        /// Receiving principal
        identity: IdentityId,
        /// The granted role
        role: String,
    },
    /// A role was revoked
    RoleRevoked {
        /// Affected principal
        identity: IdentityId,
        /// The removed role
        role: String,
    },
    /// An external wallet was bound to the identity
    WalletLinked {
        /// Owning principal
        identity: IdentityId,
        /// Wallet identifier stored in metadata
        wallet: String,
    },
    /// MFA enrollment changed
    MfaToggled {
        /// Affected principal
        identity: IdentityId,
        /// New enrollment state
        enabled: bool,
    },
    /// A proof verified successfully
    VerificationSucceeded {
        /// Proving principal
        identity: IdentityId,
        /// Proving device
        device_id: DeviceId,
        /// Level the proof established
        level: AuthLevel,
    },
    /// A proof failed verification
    VerificationFailed {
        /// Claiming principal
        identity: IdentityId,
        /// Claimed device
        device_id: DeviceId,
        /// Stable error code of the failure
        reason: String,
    },
    /// Repeated failures locked an identity out
    LockoutTriggered {
        /// Locked principal
        identity: IdentityId,
        /// Lockout expiry instant
        until_ns: u64,
    },
    /// Something worth a security review happened
    SecurityIncident {
        /// Involved principal, when attributable
        identity: Option<IdentityId>,
        /// What happened
        description: String,
    },
    /// A compound operation failed mid-way; advisory audit record
    CompensationRecorded {
        /// The compound operation
        operation: String,
        /// The step that failed
        step: String,
        /// Stable error code of the failure
        reason: String,
    },
    /// A session was issued
    SessionIssued {
        /// Owning principal
        identity: IdentityId,
        /// The new session token
        session: SessionId,
        /// Proving device
        device_id: DeviceId,
        /// Granted scopes
        scopes: Vec<Scope>,
    },
    /// A session was revoked
    SessionRevoked {
        /// Owning principal
        identity: IdentityId,
        /// The revoked session
        session: SessionId,
    },
    /// A session was evicted to honor the per-identity cap
    SessionEvicted {
        /// Owning principal
        identity: IdentityId,
        /// The evicted session
        session: SessionId,
    },
    /// A domain event routed through the fabric, body opaque to the core
    Domain {
        /// Type tag within the closed set
        event_type: EventType,
        /// Opaque payload owned by the emitting service
        body: serde_json::Value,
    },
}

impl EventPayload {
    /// The type tag indexing this payload
    pub fn event_type(&self) -> EventType {
        match self {
            Self::IdentityCreated { .. } => EventType::IdentityCreated,
            Self::IdentityDisabled { .. } => EventType::IdentityDisabled,
            Self::DeviceAdded { .. } => EventType::DeviceAdded,
            Self::DeviceRevoked { .. } => EventType::DeviceRevoked,
            Self::DeviceKeyRotated { .. } => EventType::DeviceKeyRotated,
            Self::RoleGranted { .. } => EventType::RoleGranted,
            Self::RoleRevoked { .. } => EventType::RoleRevoked,
            Self::WalletLinked { .. } => EventType::WalletLinked,
            Self::MfaToggled { .. } => EventType::MfaToggled,
            Self::VerificationSucceeded { .. } => EventType::VerificationSucceeded,
            Self::VerificationFailed { .. } => EventType::VerificationFailed,
            Self::LockoutTriggered { .. } => EventType::LockoutTriggered,
            Self::SecurityIncident { .. } => EventType::SecurityIncident,
            Self::CompensationRecorded { .. } => EventType::CompensationRecorded,
            Self::SessionIssued { .. } => EventType::SessionIssued,
            Self::SessionRevoked { .. } => EventType::SessionRevoked,
            Self::SessionEvicted { .. } => EventType::SessionEvicted,
            Self::Domain { event_type, .. } => *event_type,
        }
    }

    /// Principal the payload is about, when attributable
    pub fn principal(&self) -> Option<&IdentityId> {
        match self {
            Self::IdentityCreated { identity, .. }
            | Self::IdentityDisabled { identity }
            | Self::DeviceAdded { identity, .. }
            | Self::DeviceRevoked { identity, .. }
            | Self::DeviceKeyRotated { identity, .. }
            | Self::RoleGranted { identity, .. }
            | Self::RoleRevoked { identity, .. }
            | Self::WalletLinked { identity, .. }
            | Self::MfaToggled { identity, .. }
            | Self::VerificationSucceeded { identity, .. }
            | Self::VerificationFailed { identity, .. }
            | Self::LockoutTriggered { identity, .. }
            | Self::SessionIssued { identity, .. }
            | Self::SessionRevoked { identity, .. }
            | Self::SessionEvicted { identity, .. } => Some(identity),
            Self::SecurityIncident { identity, .. } => identity.as_ref(),
            Self::CompensationRecorded { .. } | Self::Domain { .. } => None,
        }
    }
}

/// A fully-addressed event as delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned at enqueue
    pub event_id: EventId,
    /// Type tag for filtering
    pub event_type: EventType,
    /// The payload record
    pub payload: EventPayload,
    /// Delivery lane
    pub priority: Priority,
    /// Correlation the event belongs to
    pub correlation: CorrelationContext,
    /// System that emitted the event
    pub originating_system: String,
    /// Principal the event is about, when attributable
    pub principal: Option<IdentityId>,
    /// Free-form routing tags
    pub tags: Vec<String>,
    /// Free-form metadata
    pub metadata: BTreeMap<String, String>,
    /// Delivery attempts so far
    pub retry_count: u32,
    /// Enqueue instant
    pub emitted_at_ns: u64,
}

/// An event not yet accepted by the fabric
#[derive(Debug, Clone)]
pub struct EventDraft {
    /// The payload record
    pub payload: EventPayload,
    /// Requested delivery lane
    pub priority: Priority,
    /// System emitting the event
    pub originating_system: String,
    /// Correlation the event belongs to
    pub correlation: CorrelationContext,
    /// Free-form routing tags
    pub tags: Vec<String>,
    /// Free-form metadata
    pub metadata: BTreeMap<String, String>,
}

impl EventDraft {
    /// Create a draft with empty tags and metadata
    pub fn new(
        payload: EventPayload,
        priority: Priority,
        originating_system: impl Into<String>,
        correlation: CorrelationContext,
    ) -> Self {
        Self {
            payload,
            priority,
            originating_system: originating_system.into(),
            correlation,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a routing tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Subscription filter; an unset field matches everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Match only these type tags
    pub event_types: Option<Vec<EventType>>,
    /// Match only events from these systems
    pub sources: Option<Vec<String>>,
    /// Match only events about these principals
    pub principals: Option<Vec<IdentityId>>,
    /// Match only these lanes
    pub priorities: Option<Vec<Priority>>,
    /// Match only events emitted at or after this instant
    pub emitted_after_ns: Option<u64>,
    /// Match only events emitted at or before this instant
    pub emitted_before_ns: Option<u64>,
}

impl EventFilter {
    /// A filter matching every event
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether this filter matches the envelope
    pub fn matches(&self, envelope: &EventEnvelope) -> bool {
        if let Some(types) = &self.event_types {
            if !types.contains(&envelope.event_type) {
                return false;
            }
        }
        if let Some(sources) = &self.sources {
            if !sources.contains(&envelope.originating_system) {
                return false;
            }
        }
        if let Some(principals) = &self.principals {
            match &envelope.principal {
                Some(principal) if principals.contains(principal) => {}
                _ => return false,
            }
        }
        if let Some(priorities) = &self.priorities {
            if !priorities.contains(&envelope.priority) {
                return false;
            }
        }
        if let Some(after) = self.emitted_after_ns {
            if envelope.emitted_at_ns < after {
                return false;
            }
        }
        if let Some(before) = self.emitted_before_ns {
            if envelope.emitted_at_ns > before {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_core::CorrelationId;

    fn envelope(priority: Priority, source: &str) -> EventEnvelope {
        let cid = CorrelationId::new();
        EventEnvelope {
            event_id: EventId::new(1),
            event_type: EventType::SessionIssued,
            payload: EventPayload::SessionIssued {
                identity: IdentityId::from_text("acct-alice"),
                session: SessionId::from_bytes([1; 16]),
                device_id: DeviceId::new("laptop"),
                scopes: vec![Scope::WalletTransfer],
            },
            priority,
            correlation: CorrelationContext {
                correlation_id: cid,
                parent_id: None,
                root_id: cid,
                system: "authority".into(),
                operation: "start_session".into(),
                created_at_ns: 0,
            },
            originating_system: source.into(),
            principal: Some(IdentityId::from_text("acct-alice")),
            tags: Vec::new(),
            metadata: BTreeMap::new(),
            retry_count: 0,
            emitted_at_ns: 1_000,
        }
    }

    #[test]
    fn payload_type_tags_line_up() {
        let payload = EventPayload::IdentityDisabled {
            identity: IdentityId::from_text("a"),
        };
        assert_eq!(payload.event_type(), EventType::IdentityDisabled);
        let routed = EventPayload::Domain {
            event_type: EventType::EscrowReleased,
            body: serde_json::json!({"escrow": 7}),
        };
        assert_eq!(routed.event_type(), EventType::EscrowReleased);
    }

    #[test]
    fn default_filter_matches_everything() {
        assert!(EventFilter::all().matches(&envelope(Priority::Low, "authority")));
    }

    #[test]
    fn filters_restrict_by_each_dimension() {
        let e = envelope(Priority::High, "authority");

        let by_type = EventFilter {
            event_types: Some(vec![EventType::SessionRevoked]),
            ..EventFilter::default()
        };
        assert!(!by_type.matches(&e));

        let by_source = EventFilter {
            sources: Some(vec!["other".into()]),
            ..EventFilter::default()
        };
        assert!(!by_source.matches(&e));

        let by_principal = EventFilter {
            principals: Some(vec![IdentityId::from_text("acct-bob")]),
            ..EventFilter::default()
        };
        assert!(!by_principal.matches(&e));

        let by_priority = EventFilter {
            priorities: Some(vec![Priority::High, Priority::Critical]),
            ..EventFilter::default()
        };
        assert!(by_priority.matches(&e));

        let by_window = EventFilter {
            emitted_after_ns: Some(2_000),
            ..EventFilter::default()
        };
        assert!(!by_window.matches(&e));
    }

    #[test]
    fn wire_names_are_snake_case() {
        let json = serde_json::to_string(&EventType::VerificationFailed).unwrap();
        assert_eq!(json, "\"verification_failed\"");
        let json = serde_json::to_string(&Priority::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
