//! Health and statistics reports
//!
//! Query-surface snapshots assembled by the façade for liveness probes and
//! the observability services downstream of the event fabric.

use serde::{Deserialize, Serialize};
use sigil_fabric::FabricMetrics;

/// Liveness snapshot returned by `health_check`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// False when any event lane is saturated
    pub healthy: bool,
    /// Total identities, enabled or not
    pub identities: usize,
    /// Identities still enabled
    pub enabled_identities: usize,
    /// Sessions currently active
    pub active_sessions: usize,
    /// Event lane depths in priority order
    pub queue_depths: [usize; 4],
    /// Events awaiting redelivery
    pub retry_depth: usize,
    /// Nanoseconds since the authority was constructed
    pub uptime_ns: u64,
}

/// Aggregate counters returned by `get_system_stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    /// Total identities, enabled or not
    pub identities: usize,
    /// Identities still enabled
    pub enabled_identities: usize,
    /// Sessions currently active
    pub active_sessions: usize,
    /// Challenge nonces consumed and still inside the replay window
    pub consumed_nonces: usize,
    /// Identities with a live rate window
    pub rate_windows: usize,
    /// Correlation contexts currently tracked
    pub correlations: usize,
    /// Event fabric delivery counters
    pub fabric: FabricMetrics,
    /// Event lane depths in priority order
    pub queue_depths: [usize; 4],
    /// Delivered-event history size
    pub event_history: usize,
    /// Nanoseconds since the authority was constructed
    pub uptime_ns: u64,
}
