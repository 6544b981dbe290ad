use crate::events::{BranchEvent, ExecutionEventType, FlowElementEvent, RecordValue};
use crate::graph::{FlowElementVisitor, ProcessGraph};
use crate::handlers::{HandleOutcome, HandlerRegistry};
use crate::log::{LogReader, LogStore};
use crate::types::{IdGenerator, InstanceId, LogPosition, NodeId};
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// What one call to [`PartitionProcessor::process_next`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// No durable records past the read position.
    CaughtUp,
    /// The record required no handler (payload record, or no aspect
    /// registered for the event type at that node).
    Skipped,
    /// A handler ran.
    Handled(HandleOutcome),
}

/// Single-threaded dispatch loop for one partition's log.
///
/// Exactly one processor drives a partition at a time, so handlers and
/// their scratch state need no locking; the graph is immutable and shared
/// read-only across partitions. A graph-contract error from `process_next`
/// means a corrupt deployment: the caller must stop driving the partition.
pub struct PartitionProcessor {
    graph: Arc<ProcessGraph>,
    log: Arc<dyn LogStore>,
    reader: LogReader,
    registry: HandlerRegistry,
    ids: Arc<IdGenerator>,
}

impl PartitionProcessor {
    pub fn new(
        graph: Arc<ProcessGraph>,
        log: Arc<dyn LogStore>,
        registry: HandlerRegistry,
        ids: Arc<IdGenerator>,
    ) -> Self {
        Self {
            graph,
            reader: LogReader::new(log.clone()),
            log,
            registry,
            ids,
        }
    }

    pub fn read_position(&self) -> LogPosition {
        self.reader.position()
    }

    /// Seed a new instance: append its branch payload, update the key index
    /// in the same logical step, then activate the start node. Returns the
    /// new instance id.
    pub async fn start_instance(
        &self,
        start_node: NodeId,
        payload: &[u8],
    ) -> Result<InstanceId> {
        let instance_id = self.ids.next_id();
        let branch_key = self.ids.next_id();

        let mut visitor = FlowElementVisitor::new(&self.graph);
        visitor.move_to_node(start_node)?;
        let string_id = visitor.string_id()?.to_owned();

        let position = self
            .log
            .append(
                branch_key,
                RecordValue::Branch(BranchEvent {
                    branch_key,
                    instance_id,
                    payload: payload.to_vec(),
                }),
            )
            .await?;
        self.log.index_put(branch_key, position).await?;

        self.log
            .append(
                branch_key,
                RecordValue::FlowElement(FlowElementEvent {
                    event_type: ExecutionEventType::ElementActivated,
                    flow_element_id: start_node,
                    flow_element_id_str: string_id,
                    process_id: self.graph.process_id(),
                    instance_id,
                    branch_key,
                }),
            )
            .await?;

        Ok(instance_id)
    }

    /// Read and dispatch the next record, if any.
    pub async fn process_next(&mut self) -> Result<Progress> {
        let Some(record) = self.reader.next().await? else {
            return Ok(Progress::CaughtUp);
        };

        let RecordValue::FlowElement(event) = &record.value else {
            return Ok(Progress::Skipped);
        };

        let graph = Arc::clone(&self.graph);
        let log = Arc::clone(&self.log);
        let ids = Arc::clone(&self.ids);

        let mut visitor = FlowElementVisitor::new(&graph);
        visitor.move_to_node(event.flow_element_id)?;
        let Some(aspect) = visitor.aspect_for(event.event_type)? else {
            debug!(
                element = event.flow_element_id_str,
                event_type = ?event.event_type,
                "no aspect for event type; record skipped"
            );
            return Ok(Progress::Skipped);
        };
        let Some(handler) = self.registry.get_mut(aspect) else {
            debug!(?aspect, "no handler registered; record skipped");
            return Ok(Progress::Skipped);
        };

        let outcome = handler.handle(event, &graph, log.as_ref(), &ids).await?;
        Ok(Progress::Handled(outcome))
    }

    /// Drain the log up to the current tail, collecting handler outcomes.
    pub async fn run_until_caught_up(&mut self) -> Result<Vec<HandleOutcome>> {
        let mut outcomes = Vec::new();
        loop {
            match self.process_next().await? {
                Progress::CaughtUp => return Ok(outcomes),
                Progress::Skipped => continue,
                Progress::Handled(outcome) => outcomes.push(outcome),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemoryDiagnostics;
    use crate::graph::{BpmnAspect, Condition, Operand, ProcessGraphBuilder};
    use crate::handlers::{
        ActivateElementHandler, EndProcessHandler, ExclusiveGatewayHandler, StuckReason,
    };
    use crate::log::MemoryLog;
    use crate::types::{ConditionOperator, ScalarValue};

    /// start → g; g has a conditional flow to `x` (amount > 100) and a
    /// default to `y`; both are end events.
    fn amount_graph() -> ProcessGraph {
        let mut b = ProcessGraphBuilder::new(42);
        let g = b.node("g");
        let x = b.node("x");
        let y = b.node("y");
        b.aspect(
            g,
            ExecutionEventType::ElementActivated,
            BpmnAspect::ExclusiveSplit,
        );
        for end in [x, y] {
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
        }
        b.sequence_flow(
            g,
            x,
            "flow_to_x",
            Some(Condition::new(
                ConditionOperator::GreaterThan,
                Operand::Path("$.amount".into()),
                Operand::Literal(ScalarValue::Int(100)),
            )),
        );
        b.default_flow(g, y, "flow_to_y");
        b.build().unwrap()
    }

    struct Harness {
        log: Arc<MemoryLog>,
        diagnostics: Arc<MemoryDiagnostics>,
        processor: PartitionProcessor,
    }

    fn harness(graph: ProcessGraph) -> Harness {
        let log: Arc<MemoryLog> = Arc::new(MemoryLog::new());
        let diagnostics = Arc::new(MemoryDiagnostics::new());
        let mut registry = HandlerRegistry::new();
        registry.register(Box::new(ExclusiveGatewayHandler::new(
            log.clone(),
            diagnostics.clone(),
        )));
        registry.register(Box::new(ActivateElementHandler));
        registry.register(Box::new(EndProcessHandler));

        let processor = PartitionProcessor::new(
            Arc::new(graph),
            log.clone(),
            registry,
            Arc::new(IdGenerator::new()),
        );
        Harness {
            log,
            diagnostics,
            processor,
        }
    }

    async fn completed_at(log: &MemoryLog) -> Option<String> {
        log.read_from(0)
            .await
            .unwrap()
            .into_iter()
            .find_map(|r| match r.value {
                RecordValue::FlowElement(e)
                    if e.event_type == ExecutionEventType::ProcessCompleted =>
                {
                    Some(e.flow_element_id_str)
                }
                _ => None,
            })
    }

    #[tokio::test]
    async fn high_amount_flows_through_x_to_completion() {
        let mut h = harness(amount_graph());
        h.processor
            .start_instance(0, br#"{"amount":150}"#)
            .await
            .unwrap();

        let outcomes = h.processor.run_until_caught_up().await.unwrap();
        assert!(outcomes.iter().all(|o| *o == HandleOutcome::Advanced));
        assert_eq!(completed_at(&h.log).await.as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn low_amount_takes_the_default_to_y() {
        let mut h = harness(amount_graph());
        h.processor
            .start_instance(0, br#"{"amount":50}"#)
            .await
            .unwrap();

        h.processor.run_until_caught_up().await.unwrap();
        assert_eq!(completed_at(&h.log).await.as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn undecidable_amount_takes_the_default_without_failing() {
        let mut h = harness(amount_graph());
        h.processor
            .start_instance(0, br#"{"amount":"oops"}"#)
            .await
            .unwrap();

        h.processor.run_until_caught_up().await.unwrap();
        assert_eq!(completed_at(&h.log).await.as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn unreadable_payload_takes_the_default_without_failing() {
        let mut h = harness(amount_graph());
        h.processor
            .start_instance(0, b"not a document")
            .await
            .unwrap();

        // The partition must keep draining: bad payload bytes never surface
        // as an error from the dispatch loop.
        let outcomes = h.processor.run_until_caught_up().await.unwrap();
        assert!(outcomes.iter().all(|o| *o == HandleOutcome::Advanced));
        assert_eq!(completed_at(&h.log).await.as_deref(), Some("y"));
        assert_eq!(h.diagnostics.malformed_payload_count(), 1);
    }

    #[tokio::test]
    async fn stuck_gateway_leaves_partition_running() {
        // No default flow: a low amount strands the instance.
        let mut b = ProcessGraphBuilder::new(42);
        let g = b.node("g");
        let x = b.node("x");
        b.aspect(
            g,
            ExecutionEventType::ElementActivated,
            BpmnAspect::ExclusiveSplit,
        );
        b.sequence_flow(
            g,
            x,
            "flow_to_x",
            Some(Condition::new(
                ConditionOperator::GreaterThan,
                Operand::Path("$.amount".into()),
                Operand::Literal(ScalarValue::Int(100)),
            )),
        );
        let graph = b.build().unwrap();

        let mut h = harness(graph);
        h.processor
            .start_instance(0, br#"{"amount":5}"#)
            .await
            .unwrap();

        let outcomes = h.processor.run_until_caught_up().await.unwrap();
        assert_eq!(
            outcomes,
            vec![HandleOutcome::Stuck(StuckReason::NoFlowSelected)]
        );
        assert_eq!(h.diagnostics.stuck_count(), 1);

        // A second instance on the same partition still progresses.
        h.processor
            .start_instance(0, br#"{"amount":500}"#)
            .await
            .unwrap();
        let outcomes = h.processor.run_until_caught_up().await.unwrap();
        assert!(outcomes.contains(&HandleOutcome::Advanced));
    }

    #[tokio::test]
    async fn nodes_without_aspects_are_skipped() {
        let mut b = ProcessGraphBuilder::new(1);
        let lone = b.node("lone");
        let graph = b.build().unwrap();

        let mut h = harness(graph);
        h.processor
            .start_instance(lone, br#"{}"#)
            .await
            .unwrap();

        // Payload record and an activation with no aspect: nothing handled.
        assert_eq!(h.processor.process_next().await.unwrap(), Progress::Skipped);
        assert_eq!(h.processor.process_next().await.unwrap(), Progress::Skipped);
        assert_eq!(h.processor.process_next().await.unwrap(), Progress::CaughtUp);
    }

    #[tokio::test]
    async fn replaying_the_same_records_is_deterministic() {
        async fn records_of(log: &MemoryLog) -> Vec<crate::log::LogRecord> {
            log.read_from(0).await.unwrap()
        }

        let mut first = harness(amount_graph());
        first
            .processor
            .start_instance(0, br#"{"amount":150}"#)
            .await
            .unwrap();
        first.processor.run_until_caught_up().await.unwrap();

        let mut second = harness(amount_graph());
        second
            .processor
            .start_instance(0, br#"{"amount":150}"#)
            .await
            .unwrap();
        second.processor.run_until_caught_up().await.unwrap();

        assert_eq!(
            records_of(&first.log).await,
            records_of(&second.log).await
        );
    }
}
