use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

// ─── Scalar aliases ───────────────────────────────────────────

/// Dense flow-element id. Doubles as the index into the graph's node arena.
pub type NodeId = u32;

/// Position of a record on the append-only log.
pub type LogPosition = u64;

/// Correlation key tying a record to a process-instance execution branch.
pub type BranchKey = u64;

/// Id of a deployed process definition.
pub type ProcessId = u64;

/// Id of a running process instance.
pub type InstanceId = u64;

// ─── ScalarValue ──────────────────────────────────────────────

/// A dynamically typed scalar extracted from a payload document or written
/// as a condition literal. `Nil` is a resolved value — "the path matched
/// and the value is null" — and must not be confused with a path that did
/// not resolve at all.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Nil,
}

impl ScalarValue {
    pub fn is_bool(&self) -> bool {
        matches!(self, ScalarValue::Bool(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, ScalarValue::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ScalarValue::Float(_))
    }

    pub fn is_str(&self) -> bool {
        matches!(self, ScalarValue::Str(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, ScalarValue::Nil)
    }
}

// ─── Condition operators ──────────────────────────────────────

/// Comparison operator on a sequence-flow condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LowerThan,
    LowerThanOrEqual,
}

// ─── Id generation ────────────────────────────────────────────

/// Monotonic id source for new instances and branch keys. Ids are plain
/// u64s; uniqueness holds per partition, which is all the log needs.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
