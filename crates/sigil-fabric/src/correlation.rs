//! Correlation tracking
//!
//! Every façade entry point runs under a correlation context; contexts form
//! a tree whose root and parent links are immutable once created, so a
//! single user-visible operation can be reconstructed across dozens of
//! internal events. Flow steps are lightweight trace records appended in
//! call order.

use serde::{Deserialize, Serialize};
use sigil_core::CorrelationId;
use std::collections::HashMap;

/// One node in the correlation tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationContext {
    /// This node's identifier
    pub correlation_id: CorrelationId,
    /// Parent node, absent for roots
    pub parent_id: Option<CorrelationId>,
    /// Root of the tree this node belongs to
    pub root_id: CorrelationId,
    /// System that opened the context
    pub system: String,
    /// Operation the context covers
    pub operation: String,
    /// Creation instant
    pub created_at_ns: u64,
}

/// Completion state of a flow step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    /// Step has started and not yet completed
    InProgress,
    /// Step completed successfully
    Succeeded,
    /// Step completed with an error
    Failed,
}

/// A trace record within one correlation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    /// Step name, e.g. `"verify_proof"`
    pub step: String,
    /// System executing the step
    pub system: String,
    /// Pipeline stage label
    pub stage: String,
    /// Completion state
    pub status: FlowStatus,
    /// Start instant
    pub started_at_ns: u64,
    /// Completion instant, once closed
    pub completed_at_ns: Option<u64>,
    /// Error text for failed steps
    pub error: Option<String>,
}

/// Registry of correlation contexts and their flow traces
#[derive(Debug, Default)]
pub struct CorrelationTracker {
    contexts: HashMap<CorrelationId, CorrelationContext>,
    steps: HashMap<CorrelationId, Vec<FlowStep>>,
}

impl CorrelationTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a root context
    pub fn start(
        &mut self,
        system: impl Into<String>,
        operation: impl Into<String>,
        now_ns: u64,
    ) -> CorrelationContext {
        let id = CorrelationId::new();
        let context = CorrelationContext {
            correlation_id: id,
            parent_id: None,
            root_id: id,
            system: system.into(),
            operation: operation.into(),
            created_at_ns: now_ns,
        };
        self.contexts.insert(id, context.clone());
        context
    }

    /// Open a child context under `parent`
    ///
    /// The child inherits the parent's root. An unknown parent is tolerated:
    /// the child then roots a fresh tree, which keeps callers that pass
    /// pre-generated correlation ids working.
    pub fn child(
        &mut self,
        parent: CorrelationId,
        system: impl Into<String>,
        operation: impl Into<String>,
        now_ns: u64,
    ) -> CorrelationContext {
        let id = CorrelationId::new();
        let root_id = self
            .contexts
            .get(&parent)
            .map(|ctx| ctx.root_id)
            .unwrap_or(id);
        let context = CorrelationContext {
            correlation_id: id,
            parent_id: Some(parent),
            root_id,
            system: system.into(),
            operation: operation.into(),
            created_at_ns: now_ns,
        };
        self.contexts.insert(id, context.clone());
        context
    }

    /// Register a caller-supplied context, e.g. one arriving with a request
    ///
    /// An already-registered id keeps its original record; root and parent
    /// links never change after creation.
    pub fn adopt(&mut self, context: CorrelationContext) -> CorrelationContext {
        self.contexts
            .entry(context.correlation_id)
            .or_insert(context)
            .clone()
    }

    /// Append an in-progress flow step to a correlation
    pub fn track_step(
        &mut self,
        correlation_id: CorrelationId,
        step: impl Into<String>,
        system: impl Into<String>,
        stage: impl Into<String>,
        now_ns: u64,
    ) {
        self.steps
            .entry(correlation_id)
            .or_default()
            .push(FlowStep {
                step: step.into(),
                system: system.into(),
                stage: stage.into(),
                status: FlowStatus::InProgress,
                started_at_ns: now_ns,
                completed_at_ns: None,
                error: None,
            });
    }

    /// Close the most recent in-progress step of a correlation
    pub fn complete_step(
        &mut self,
        correlation_id: CorrelationId,
        success: bool,
        error: Option<String>,
        now_ns: u64,
    ) {
        if let Some(steps) = self.steps.get_mut(&correlation_id) {
            if let Some(step) = steps
                .iter_mut()
                .rev()
                .find(|s| s.status == FlowStatus::InProgress)
            {
                step.status = if success {
                    FlowStatus::Succeeded
                } else {
                    FlowStatus::Failed
                };
                step.completed_at_ns = Some(now_ns);
                step.error = error;
            }
        }
    }

    /// Fetch a context
    pub fn get(&self, correlation_id: &CorrelationId) -> Option<&CorrelationContext> {
        self.contexts.get(correlation_id)
    }

    /// Flow trace of a correlation, in call order
    pub fn trace(&self, correlation_id: &CorrelationId) -> &[FlowStep] {
        self.steps
            .get(correlation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of tracked contexts
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether no context is tracked
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Drop contexts (and their traces) created before the retention horizon
    pub fn prune(&mut self, now_ns: u64, retention_ns: u64) {
        let horizon = now_ns.saturating_sub(retention_ns);
        self.contexts.retain(|_, ctx| ctx.created_at_ns >= horizon);
        let contexts = &self.contexts;
        self.steps.retain(|cid, _| contexts.contains_key(cid));
    }
}
