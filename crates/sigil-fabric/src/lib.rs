//! # Sigil Fabric
//!
//! The event side of the authority: a four-lane priority delivery fabric
//! with bounded queues, filtered subscriptions, retry-then-drop semantics,
//! and running delivery metrics; plus the correlation tracker that ties the
//! events of one logical operation into a causally-linked trace.
//!
//! Subscribers receive envelopes by reference but every envelope is built
//! from owned data, so a subscriber can never reach back into core state.

#![forbid(unsafe_code)]

pub mod correlation;
pub mod event;
pub mod fabric;

pub use correlation::{CorrelationContext, CorrelationTracker, FlowStatus, FlowStep};
pub use event::{EventDraft, EventEnvelope, EventFilter, EventPayload, EventType, Priority};
pub use fabric::{CycleReport, EventFabric, FabricMetrics, SubscriberHandler, SubscriberId};
