//! The non-gateway handlers: plain sequence-flow traversal, element
//! activation, and process completion. Each one is a registry entry like
//! the gateway; together they chain execution node to node.

use crate::events::{ExecutionEventType, FlowElementEvent, RecordValue};
use crate::graph::{BpmnAspect, FlowElementVisitor, ProcessGraph};
use crate::handlers::{FlowElementHandler, HandleOutcome};
use crate::log::LogStore;
use crate::types::IdGenerator;
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// An element completed and has a single outgoing flow: take it. The
/// graph compiler only assigns this aspect to nodes with exactly one
/// outgoing flow; more than one would mean a gateway.
pub struct TakeSequenceFlowHandler;

#[async_trait]
impl FlowElementHandler for TakeSequenceFlowHandler {
    fn handled_aspect(&self) -> BpmnAspect {
        BpmnAspect::TakeSequenceFlow
    }

    async fn handle(
        &mut self,
        event: &FlowElementEvent,
        graph: &ProcessGraph,
        log: &dyn LogStore,
        _ids: &IdGenerator,
    ) -> Result<HandleOutcome> {
        let mut visitor = FlowElementVisitor::new(graph);
        visitor.move_to_node(event.flow_element_id)?;
        visitor.traverse_sequence_flow(0)?;

        let transition = FlowElementEvent {
            event_type: ExecutionEventType::SequenceFlowTaken,
            flow_element_id: visitor.node_id()?,
            flow_element_id_str: visitor.string_id()?.to_owned(),
            process_id: event.process_id,
            instance_id: event.instance_id,
            branch_key: event.branch_key,
        };
        log.append(event.branch_key, RecordValue::FlowElement(transition))
            .await?;
        Ok(HandleOutcome::Advanced)
    }
}

/// A flow pointing at this element was taken: activate the element so its
/// own aspect (task, gateway, end event) can react next.
pub struct ActivateElementHandler;

#[async_trait]
impl FlowElementHandler for ActivateElementHandler {
    fn handled_aspect(&self) -> BpmnAspect {
        BpmnAspect::ActivateElement
    }

    async fn handle(
        &mut self,
        event: &FlowElementEvent,
        graph: &ProcessGraph,
        log: &dyn LogStore,
        _ids: &IdGenerator,
    ) -> Result<HandleOutcome> {
        let mut visitor = FlowElementVisitor::new(graph);
        visitor.move_to_node(event.flow_element_id)?;

        let activation = FlowElementEvent {
            event_type: ExecutionEventType::ElementActivated,
            flow_element_id: visitor.node_id()?,
            flow_element_id_str: visitor.string_id()?.to_owned(),
            process_id: event.process_id,
            instance_id: event.instance_id,
            branch_key: event.branch_key,
        };
        debug!(
            instance_id = event.instance_id,
            element = activation.flow_element_id_str,
            "element activated"
        );
        log.append(event.branch_key, RecordValue::FlowElement(activation))
            .await?;
        Ok(HandleOutcome::Advanced)
    }
}

/// A terminal element was activated: record process completion.
pub struct EndProcessHandler;

#[async_trait]
impl FlowElementHandler for EndProcessHandler {
    fn handled_aspect(&self) -> BpmnAspect {
        BpmnAspect::EndProcess
    }

    async fn handle(
        &mut self,
        event: &FlowElementEvent,
        graph: &ProcessGraph,
        log: &dyn LogStore,
        _ids: &IdGenerator,
    ) -> Result<HandleOutcome> {
        let mut visitor = FlowElementVisitor::new(graph);
        visitor.move_to_node(event.flow_element_id)?;

        let completed = FlowElementEvent {
            event_type: ExecutionEventType::ProcessCompleted,
            flow_element_id: visitor.node_id()?,
            flow_element_id_str: visitor.string_id()?.to_owned(),
            process_id: event.process_id,
            instance_id: event.instance_id,
            branch_key: event.branch_key,
        };
        debug!(
            instance_id = event.instance_id,
            "process completed"
        );
        log.append(event.branch_key, RecordValue::FlowElement(completed))
            .await?;
        Ok(HandleOutcome::Advanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ProcessGraphBuilder;
    use crate::log::MemoryLog;
    use std::sync::Arc;

    fn event_at(node: u32, event_type: ExecutionEventType) -> FlowElementEvent {
        FlowElementEvent {
            event_type,
            flow_element_id: node,
            flow_element_id_str: format!("n{node}"),
            process_id: 1,
            instance_id: 2,
            branch_key: 3,
        }
    }

    #[tokio::test]
    async fn take_sequence_flow_targets_the_single_outgoing_flow() {
        let mut b = ProcessGraphBuilder::new(1);
        let t = b.node("task");
        let next = b.node("next");
        b.sequence_flow(t, next, "f", None);
        let graph = b.build().unwrap();

        let log = Arc::new(MemoryLog::new());
        let ids = IdGenerator::new();
        let mut handler = TakeSequenceFlowHandler;
        let outcome = handler
            .handle(
                &event_at(t, ExecutionEventType::ElementCompleted),
                &graph,
                log.as_ref(),
                &ids,
            )
            .await
            .unwrap();

        assert_eq!(outcome, HandleOutcome::Advanced);
        let record = log.read(0).await.unwrap();
        match record.value {
            RecordValue::FlowElement(e) => {
                assert_eq!(e.event_type, ExecutionEventType::SequenceFlowTaken);
                assert_eq!(e.flow_element_id, next);
                assert_eq!(e.flow_element_id_str, "next");
            }
            other => panic!("unexpected record {other:?}"),
        }
    }

    #[tokio::test]
    async fn activate_then_end_completes_the_process() {
        let mut b = ProcessGraphBuilder::new(1);
        let end = b.node("end");
        b.aspect(
            end,
            ExecutionEventType::SequenceFlowTaken,
            BpmnAspect::ActivateElement,
        );
        b.aspect(
            end,
            ExecutionEventType::ElementActivated,
            BpmnAspect::EndProcess,
        );
        let graph = b.build().unwrap();

        let log = Arc::new(MemoryLog::new());
        let ids = IdGenerator::new();

        let mut activate = ActivateElementHandler;
        activate
            .handle(
                &event_at(end, ExecutionEventType::SequenceFlowTaken),
                &graph,
                log.as_ref(),
                &ids,
            )
            .await
            .unwrap();

        let mut finish = EndProcessHandler;
        finish
            .handle(
                &event_at(end, ExecutionEventType::ElementActivated),
                &graph,
                log.as_ref(),
                &ids,
            )
            .await
            .unwrap();

        let records = log.read_from(0).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(
            &records[1].value,
            RecordValue::FlowElement(e)
                if e.event_type == ExecutionEventType::ProcessCompleted
        ));
    }
}
