//! Priority event fabric
//!
//! Four bounded FIFO lanes feed a single scheduler: one cycle first replays
//! the retry queue, then drains critical to empty, then takes a full batch
//! from high and half and quarter batches from normal and low. Overflow is
//! reported to the emitter as `queue_full`, never silently dropped.
//!
//! An event counts as delivered when at least one matching subscriber
//! handler succeeds, or when no subscriber matches at all. Failed events
//! re-enter the retry queue until `max_retries` is exhausted, after which
//! they are dropped and the failure counter advances.

use crate::event::{EventDraft, EventEnvelope, EventFilter, Priority};
use serde::{Deserialize, Serialize};
use sigil_core::time::NANOS_PER_DAY;
use sigil_core::{AuthorityConfig, AuthorityError, AuthorityResult, CorrelationId, EventId};
use std::collections::VecDeque;
use std::fmt;

/// Handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(u64);

/// Subscriber callback; a returned error counts as a failed delivery
pub type SubscriberHandler = Box<dyn FnMut(&EventEnvelope) -> Result<(), String> + Send>;

struct Subscription {
    id: SubscriberId,
    filter: EventFilter,
    handler: SubscriberHandler,
}

/// Running delivery counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FabricMetrics {
    /// Events accepted by `emit`
    pub emitted_total: u64,
    /// Accepted events per lane, in `Priority::ALL` order
    pub emitted_by_priority: [u64; 4],
    /// Events delivered (including vacuous deliveries)
    pub processed: u64,
    /// Events dropped after exhausting retries
    pub failed: u64,
    /// Re-enqueues into the retry queue
    pub retried: u64,
    /// Emissions refused because a lane was full
    pub overflows: u64,
    /// Instant of the last counter change
    pub last_updated_ns: u64,
}

impl FabricMetrics {
    /// Failed deliveries as a fraction of all completed deliveries
    pub fn error_rate(&self) -> f64 {
        let total = self.processed + self.failed;
        if total == 0 {
            0.0
        } else {
            self.failed as f64 / total as f64
        }
    }
}

/// Outcome summary of one scheduler cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Events delivered this cycle
    pub delivered: usize,
    /// Events pushed (back) into the retry queue
    pub retried: usize,
    /// Events dropped after exhausting retries
    pub dropped: usize,
}

/// Compact record of a delivered event, kept for the retention window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct HistoryRecord {
    event_id: EventId,
    priority: Priority,
    correlation_id: CorrelationId,
    delivered_at_ns: u64,
}

enum Delivery {
    Delivered,
    Retried,
    Dropped,
}

/// The four-lane delivery fabric
pub struct EventFabric {
    queues: [VecDeque<EventEnvelope>; 4],
    retry: VecDeque<EventEnvelope>,
    subscribers: Vec<Subscription>,
    history: VecDeque<HistoryRecord>,
    next_sequence: u64,
    next_subscriber: u64,
    metrics: FabricMetrics,
    max_queue_size: usize,
    max_retries: u32,
    batch_high: usize,
    retention_ns: u64,
    auto_prune: bool,
    preserve_critical: bool,
}

impl EventFabric {
    /// Create a fabric tuned by the authority configuration
    pub fn new(config: &AuthorityConfig) -> Self {
        Self {
            queues: Default::default(),
            retry: VecDeque::new(),
            subscribers: Vec::new(),
            history: VecDeque::new(),
            next_sequence: 0,
            next_subscriber: 0,
            metrics: FabricMetrics::default(),
            max_queue_size: config.max_queue_size,
            max_retries: config.max_retries,
            batch_high: config.default_batch_size.clamp(20, 50),
            retention_ns: config.retention_days.saturating_mul(NANOS_PER_DAY),
            auto_prune: config.auto_prune,
            preserve_critical: config.preserve_critical,
        }
    }

    /// Register a subscriber
    pub fn subscribe(&mut self, filter: EventFilter, handler: SubscriberHandler) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;
        self.subscribers.push(Subscription {
            id,
            filter,
            handler,
        });
        id
    }

    /// Remove a subscriber; returns whether it existed
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    /// Accept an event into its priority lane
    ///
    /// A full lane refuses the event; the emitter decides whether to shed
    /// load or degrade.
    pub fn emit(&mut self, draft: EventDraft, now_ns: u64) -> AuthorityResult<EventId> {
        let lane = draft.priority.lane();
        if self.queues[lane].len() >= self.max_queue_size {
            self.metrics.overflows += 1;
            self.metrics.last_updated_ns = now_ns;
            tracing::warn!(priority = %draft.priority, "event lane full, emission refused");
            return Err(AuthorityError::QueueFull {
                priority: draft.priority.as_str().to_string(),
            });
        }

        let event_id = EventId::new(self.next_sequence);
        self.next_sequence += 1;
        let envelope = EventEnvelope {
            event_id,
            event_type: draft.payload.event_type(),
            principal: draft.payload.principal().cloned(),
            payload: draft.payload,
            priority: draft.priority,
            correlation: draft.correlation,
            originating_system: draft.originating_system,
            tags: draft.tags,
            metadata: draft.metadata,
            retry_count: 0,
            emitted_at_ns: now_ns,
        };

        self.metrics.emitted_total += 1;
        self.metrics.emitted_by_priority[lane] += 1;
        self.metrics.last_updated_ns = now_ns;
        self.queues[lane].push_back(envelope);
        Ok(event_id)
    }

    /// Run one scheduler cycle
    pub fn process_cycle(&mut self, now_ns: u64) -> CycleReport {
        let mut report = CycleReport::default();

        // Retry queue first: these events are the oldest debt.
        let pending: Vec<EventEnvelope> = self.retry.drain(..).collect();
        for envelope in pending {
            Self::account(self.dispatch(envelope, now_ns), &mut report);
        }

        // Critical drains to empty every cycle.
        while let Some(envelope) = self.queues[Priority::Critical.lane()].pop_front() {
            Self::account(self.dispatch(envelope, now_ns), &mut report);
        }

        // Remaining lanes take proportional batches.
        let batches = [
            (Priority::High, self.batch_high),
            (Priority::Normal, self.batch_high / 2),
            (Priority::Low, self.batch_high / 4),
        ];
        for (priority, batch) in batches {
            for _ in 0..batch {
                let Some(envelope) = self.queues[priority.lane()].pop_front() else {
                    break;
                };
                Self::account(self.dispatch(envelope, now_ns), &mut report);
            }
        }

        if self.auto_prune {
            self.prune_history(now_ns);
        }
        self.metrics.last_updated_ns = now_ns;
        report
    }

    /// Deliver one envelope, routing failures into the retry queue
    fn dispatch(&mut self, mut envelope: EventEnvelope, now_ns: u64) -> Delivery {
        let mut matched = false;
        let mut succeeded = false;
        for subscription in &mut self.subscribers {
            if !subscription.filter.matches(&envelope) {
                continue;
            }
            matched = true;
            match (subscription.handler)(&envelope) {
                Ok(()) => succeeded = true,
                Err(error) => {
                    tracing::debug!(
                        event = %envelope.event_id,
                        subscriber = ?subscription.id,
                        error,
                        "subscriber handler failed"
                    );
                }
            }
        }

        if succeeded || !matched {
            self.metrics.processed += 1;
            self.history.push_back(HistoryRecord {
                event_id: envelope.event_id,
                priority: envelope.priority,
                correlation_id: envelope.correlation.correlation_id,
                delivered_at_ns: now_ns,
            });
            return Delivery::Delivered;
        }

        envelope.retry_count += 1;
        if envelope.retry_count > self.max_retries || self.retry.len() >= self.max_queue_size {
            self.metrics.failed += 1;
            tracing::warn!(
                event = %envelope.event_id,
                attempts = envelope.retry_count,
                "event dropped after exhausting retries"
            );
            Delivery::Dropped
        } else {
            self.metrics.retried += 1;
            self.retry.push_back(envelope);
            Delivery::Retried
        }
    }

    fn account(delivery: Delivery, report: &mut CycleReport) {
        match delivery {
            Delivery::Delivered => report.delivered += 1,
            Delivery::Retried => report.retried += 1,
            Delivery::Dropped => report.dropped += 1,
        }
    }

    /// Drop history entries past the retention window, in insertion order
    ///
    /// Critical entries survive pruning while `preserve_critical` is set.
    pub fn prune_history(&mut self, now_ns: u64) {
        let horizon = now_ns.saturating_sub(self.retention_ns);
        let preserve_critical = self.preserve_critical;
        self.history.retain(|record| {
            record.delivered_at_ns >= horizon
                || (preserve_critical && record.priority == Priority::Critical)
        });
    }

    /// Depth of each lane, in `Priority::ALL` order
    pub fn queue_depths(&self) -> [usize; 4] {
        [
            self.queues[0].len(),
            self.queues[1].len(),
            self.queues[2].len(),
            self.queues[3].len(),
        ]
    }

    /// Events awaiting redelivery
    pub fn retry_depth(&self) -> usize {
        self.retry.len()
    }

    /// Delivered-event history size
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Snapshot of the running counters
    pub fn metrics(&self) -> &FabricMetrics {
        &self.metrics
    }

    /// Whether every lane and the retry queue are empty
    pub fn is_drained(&self) -> bool {
        self.retry.is_empty() && self.queues.iter().all(VecDeque::is_empty)
    }
}

impl fmt::Debug for EventFabric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventFabric")
            .field("queue_depths", &self.queue_depths())
            .field("retry_depth", &self.retry.len())
            .field("subscribers", &self.subscribers.len())
            .field("metrics", &self.metrics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventPayload, EventType};
    use sigil_core::IdentityId;
    use std::sync::{Arc, Mutex};

    fn config() -> AuthorityConfig {
        AuthorityConfig::default()
    }

    fn draft(priority: Priority, n: u64) -> EventDraft {
        let correlation = crate::correlation::CorrelationContext {
            correlation_id: CorrelationId::new(),
            parent_id: None,
            root_id: CorrelationId::new(),
            system: "test".into(),
            operation: "emit".into(),
            created_at_ns: 0,
        };
        EventDraft::new(
            EventPayload::Domain {
                event_type: EventType::WalletDeposit,
                body: serde_json::json!({ "n": n }),
            },
            priority,
            "test",
            correlation,
        )
    }

    fn incident_draft(priority: Priority) -> EventDraft {
        let correlation = crate::correlation::CorrelationContext {
            correlation_id: CorrelationId::new(),
            parent_id: None,
            root_id: CorrelationId::new(),
            system: "test".into(),
            operation: "emit".into(),
            created_at_ns: 0,
        };
        EventDraft::new(
            EventPayload::SecurityIncident {
                identity: Some(IdentityId::from_text("acct-alice")),
                description: "anomaly".into(),
            },
            priority,
            "test",
            correlation,
        )
    }

    fn recording_subscriber(
        fabric: &mut EventFabric,
        filter: EventFilter,
    ) -> Arc<Mutex<Vec<(EventId, Priority)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        fabric.subscribe(
            filter,
            Box::new(move |envelope| {
                sink.lock().unwrap().push((envelope.event_id, envelope.priority));
                Ok(())
            }),
        );
        seen
    }

    #[test]
    fn critical_is_drained_before_low_backlog() {
        let mut fabric = EventFabric::new(&config());
        let seen = recording_subscriber(&mut fabric, EventFilter::all());

        for n in 0..100 {
            fabric.emit(draft(Priority::Low, n), 10).unwrap();
        }
        fabric.emit(incident_draft(Priority::Critical), 11).unwrap();

        // One cycle delivers the critical event plus a quarter batch of low.
        fabric.process_cycle(20);
        {
            let seen = seen.lock().unwrap();
            assert_eq!(seen[0].1, Priority::Critical);
            assert!(seen.len() < 101);
        }

        // Every event is delivered once the scheduler catches up.
        let mut cycles = 0;
        while !fabric.is_drained() {
            fabric.process_cycle(30 + cycles);
            cycles += 1;
            assert!(cycles < 100, "scheduler failed to drain");
        }
        assert_eq!(seen.lock().unwrap().len(), 101);
    }

    #[test]
    fn fifo_within_one_lane() {
        let mut fabric = EventFabric::new(&config());
        let seen = recording_subscriber(&mut fabric, EventFilter::all());

        let first = fabric.emit(draft(Priority::High, 1), 10).unwrap();
        let second = fabric.emit(draft(Priority::High, 2), 11).unwrap();
        fabric.process_cycle(20);

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].0, first);
        assert_eq!(seen[1].0, second);
    }

    #[test]
    fn overflow_is_reported_not_dropped() {
        let mut cfg = config();
        cfg.max_queue_size = 2;
        let mut fabric = EventFabric::new(&cfg);

        fabric.emit(draft(Priority::Normal, 1), 10).unwrap();
        fabric.emit(draft(Priority::Normal, 2), 10).unwrap();
        let err = fabric.emit(draft(Priority::Normal, 3), 10).unwrap_err();
        assert_eq!(err.code(), "queue_full");
        assert_eq!(fabric.metrics().overflows, 1);
        // Other lanes still accept.
        fabric.emit(draft(Priority::High, 4), 10).unwrap();
    }

    #[test]
    fn failing_subscriber_retries_then_drops() {
        let mut fabric = EventFabric::new(&config());
        let attempts = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&attempts);
        fabric.subscribe(
            EventFilter::all(),
            Box::new(move |_| {
                *counter.lock().unwrap() += 1;
                Err("handler down".into())
            }),
        );

        fabric.emit(draft(Priority::Normal, 1), 10).unwrap();
        let mut dropped = 0;
        for cycle in 0..10 {
            dropped += fabric.process_cycle(20 + cycle).dropped;
        }

        // One initial attempt plus max_retries redeliveries.
        assert_eq!(*attempts.lock().unwrap(), 1 + config().max_retries);
        assert_eq!(dropped, 1);
        assert_eq!(fabric.metrics().failed, 1);
        assert!(fabric.metrics().error_rate() > 0.99);
        assert!(fabric.is_drained());
    }

    #[test]
    fn one_successful_subscriber_is_enough() {
        let mut fabric = EventFabric::new(&config());
        fabric.subscribe(EventFilter::all(), Box::new(|_| Err("always down".into())));
        let seen = recording_subscriber(&mut fabric, EventFilter::all());

        fabric.emit(draft(Priority::Normal, 1), 10).unwrap();
        let report = fabric.process_cycle(20);

        assert_eq!(report.delivered, 1);
        assert_eq!(report.retried, 0);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(fabric.metrics().failed, 0);
    }

    #[test]
    fn no_matching_subscriber_counts_as_delivered() {
        let mut fabric = EventFabric::new(&config());
        let seen = recording_subscriber(
            &mut fabric,
            EventFilter {
                event_types: Some(vec![EventType::SessionRevoked]),
                ..EventFilter::default()
            },
        );

        fabric.emit(draft(Priority::Normal, 1), 10).unwrap();
        let report = fabric.process_cycle(20);

        assert_eq!(report.delivered, 1);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(fabric.metrics().processed, 1);
    }

    #[test]
    fn filters_route_by_principal() {
        let mut fabric = EventFabric::new(&config());
        let seen = recording_subscriber(
            &mut fabric,
            EventFilter {
                principals: Some(vec![IdentityId::from_text("acct-alice")]),
                ..EventFilter::default()
            },
        );

        fabric.emit(incident_draft(Priority::High), 10).unwrap();
        fabric.emit(draft(Priority::High, 1), 10).unwrap(); // no principal
        fabric.process_cycle(20);

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut fabric = EventFabric::new(&config());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = fabric.subscribe(
            EventFilter::all(),
            Box::new(move |e| {
                sink.lock().unwrap().push(e.event_id);
                Ok(())
            }),
        );

        assert!(fabric.unsubscribe(id));
        assert!(!fabric.unsubscribe(id));
        fabric.emit(draft(Priority::Normal, 1), 10).unwrap();
        fabric.process_cycle(20);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn history_prunes_by_retention_but_keeps_critical() {
        let mut cfg = config();
        cfg.retention_days = 1;
        let mut fabric = EventFabric::new(&cfg);

        fabric.emit(incident_draft(Priority::Critical), 10).unwrap();
        fabric.emit(draft(Priority::Low, 1), 10).unwrap();
        fabric.process_cycle(20);
        assert_eq!(fabric.history_len(), 2);

        fabric.prune_history(20 + 2 * NANOS_PER_DAY);
        assert_eq!(fabric.history_len(), 1);
    }

    #[test]
    fn event_ids_are_monotonic() {
        let mut fabric = EventFabric::new(&config());
        let a = fabric.emit(draft(Priority::Low, 1), 10).unwrap();
        let b = fabric.emit(draft(Priority::Critical, 2), 10).unwrap();
        assert!(b > a);
    }
}
