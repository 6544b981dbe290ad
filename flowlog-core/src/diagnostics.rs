use crate::types::{BranchKey, InstanceId, NodeId};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Why a condition operand could not be reduced to a scalar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnresolvedReason {
    /// The path expression had no match in the payload.
    PathUnresolved,
    /// The path matched an object or array, which is never a scalar.
    CompositeValue,
}

/// Structured diagnostics surfaced to operators. These are first-class
/// events rather than console lines so downstream tooling and tests can
/// assert on them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DiagnosticEvent {
    /// No conditional flow matched and no default flow exists; the instance
    /// cannot progress past this gateway.
    GatewayStuck {
        instance_id: InstanceId,
        flow_element_id: NodeId,
        flow_element_id_str: String,
    },
    /// A flow's condition could not be decided for this payload; the flow
    /// was excluded from matching and evaluation moved on.
    ConditionUnresolved {
        instance_id: InstanceId,
        flow_id: String,
        reason: UnresolvedReason,
    },
    /// The key index has no payload position for the branch key; the step
    /// cannot be evaluated at all. Distinct from a payload that resolved
    /// to nil.
    MissingBranchPayload {
        instance_id: InstanceId,
        branch_key: BranchKey,
        flow_element_id: NodeId,
    },
    /// The branch payload on the log is not a readable document. Every path
    /// operand against it is unresolved, so evaluation falls through to the
    /// default flow or reports the gateway stuck.
    MalformedBranchPayload {
        instance_id: InstanceId,
        branch_key: BranchKey,
        flow_element_id: NodeId,
    },
}

/// Sink for diagnostic events. Implementations must be cheap; handlers emit
/// from the hot path.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

/// In-memory sink retaining every event plus per-kind counters.
#[derive(Default)]
pub struct MemoryDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
    stuck: AtomicU64,
    unresolved: AtomicU64,
    missing_payload: AtomicU64,
    malformed_payload: AtomicU64,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn stuck_count(&self) -> u64 {
        self.stuck.load(Ordering::Relaxed)
    }

    pub fn unresolved_count(&self) -> u64 {
        self.unresolved.load(Ordering::Relaxed)
    }

    pub fn missing_payload_count(&self) -> u64 {
        self.missing_payload.load(Ordering::Relaxed)
    }

    pub fn malformed_payload_count(&self) -> u64 {
        self.malformed_payload.load(Ordering::Relaxed)
    }
}

impl DiagnosticSink for MemoryDiagnostics {
    fn emit(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::GatewayStuck { .. } => self.stuck.fetch_add(1, Ordering::Relaxed),
            DiagnosticEvent::ConditionUnresolved { .. } => {
                self.unresolved.fetch_add(1, Ordering::Relaxed)
            }
            DiagnosticEvent::MissingBranchPayload { .. } => {
                self.missing_payload.fetch_add(1, Ordering::Relaxed)
            }
            DiagnosticEvent::MalformedBranchPayload { .. } => {
                self.malformed_payload.fetch_add(1, Ordering::Relaxed)
            }
        };
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
