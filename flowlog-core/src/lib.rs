//! Event-sourced BPMN flow-resolution engine.
//!
//! Client commands and derived events live on an append-only log; process
//! execution state is never stored directly but reconstructed by handling
//! records against a compact, immutable process graph. The pieces:
//!
//! - [`graph`]: arena-backed process graph plus the positioned
//!   [`graph::FlowElementVisitor`] cursor.
//! - [`log`]: append-only record log with a branch-key index for O(1)
//!   payload lookup.
//! - [`document`]: reusable payload view with path-expression resolution.
//! - [`condition`]: three-valued comparison logic over resolved scalars.
//! - [`handlers`]: the aspect/handler dispatch seam; the exclusive-gateway
//!   resolver lives here.
//! - [`engine`]: the single-threaded per-partition dispatch loop.

pub mod condition;
pub mod diagnostics;
pub mod document;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod handlers;
pub mod log;
pub mod types;

pub use condition::{evaluate, Tri};
pub use diagnostics::{DiagnosticEvent, DiagnosticSink, MemoryDiagnostics};
pub use document::{PathResolution, PayloadDocument};
pub use engine::{PartitionProcessor, Progress};
pub use error::{GraphBuildError, GraphContractError};
pub use events::{BranchEvent, ExecutionEventType, FlowElementEvent, RecordValue};
pub use graph::{
    BpmnAspect, Condition, FlowElementVisitor, Operand, ProcessGraph, ProcessGraphBuilder,
};
pub use handlers::{FlowElementHandler, HandleOutcome, HandlerRegistry, StuckReason};
pub use log::{LogReader, LogRecord, LogStore, MemoryLog};
pub use types::{ConditionOperator, IdGenerator, ScalarValue};
