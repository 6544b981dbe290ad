pub mod exclusive_gateway;
pub mod flow;

pub use exclusive_gateway::ExclusiveGatewayHandler;
pub use flow::{ActivateElementHandler, EndProcessHandler, TakeSequenceFlowHandler};

use crate::events::FlowElementEvent;
use crate::graph::{BpmnAspect, ProcessGraph};
use crate::log::LogStore;
use crate::types::IdGenerator;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Why a step could not advance its instance. The partition keeps running
/// either way; only the instance is affected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StuckReason {
    /// No conditional flow matched and no default flow exists.
    NoFlowSelected,
    /// The key index holds no payload position for the branch key.
    MissingBranchPayload,
}

/// Outcome of handling one record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleOutcome {
    /// A follow-up record was appended; execution advances.
    Advanced,
    /// No record was appended; this instance makes no further progress.
    Stuck(StuckReason),
}

/// Shared contract for everything that advances execution at a flow
/// element. Handlers are single-threaded per partition and may keep
/// mutable scratch state (hence `&mut self`); data-dependent conditions
/// come back as [`HandleOutcome`] values, never as errors — only
/// graph-contract violations propagate as `Err`.
#[async_trait]
pub trait FlowElementHandler: Send + Sync {
    /// The aspect this handler is registered under.
    fn handled_aspect(&self) -> BpmnAspect;

    async fn handle(
        &mut self,
        event: &FlowElementEvent,
        graph: &ProcessGraph,
        log: &dyn LogStore,
        ids: &IdGenerator,
    ) -> Result<HandleOutcome>;
}

/// Second stage of aspect dispatch: the node's aspect table picks a
/// [`BpmnAspect`] for the arriving event type, the registry picks the
/// handler for that aspect. New node kinds are added by registering new
/// pairs at startup; nothing else changes.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<BpmnAspect, Box<dyn FlowElementHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Box<dyn FlowElementHandler>) {
        self.handlers.insert(handler.handled_aspect(), handler);
    }

    // The spelled-out `'static` bound keeps the trait object's lifetime
    // independent of the `&mut self` borrow; eliding it would reject the
    // reborrow out of the box.
    pub fn get_mut(&mut self, aspect: BpmnAspect) -> Option<&mut (dyn FlowElementHandler + 'static)> {
        self.handlers.get_mut(&aspect).map(|h| &mut **h)
    }

    pub fn is_registered(&self, aspect: BpmnAspect) -> bool {
        self.handlers.contains_key(&aspect)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────
