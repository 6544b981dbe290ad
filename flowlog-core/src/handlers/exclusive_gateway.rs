use crate::condition::{evaluate, Tri};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, UnresolvedReason};
use crate::document::{PathResolution, PayloadDocument};
use crate::events::{ExecutionEventType, FlowElementEvent, RecordValue};
use crate::graph::{BpmnAspect, Condition, FlowElementVisitor, Operand, ProcessGraph};
use crate::handlers::{FlowElementHandler, HandleOutcome, StuckReason};
use crate::log::{LogReader, LogStore};
use crate::types::IdGenerator;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves an exclusive (XOR) split: evaluates the gateway's outgoing
/// flows in declared order against the branch payload and takes the first
/// one whose condition holds, falling back to the default flow.
///
/// Owns a reusable [`PayloadDocument`] scratch view and a [`LogReader`]
/// cursor for payload lookups; one handler instance serves one partition's
/// single-threaded execution context.
pub struct ExclusiveGatewayHandler {
    log: Arc<dyn LogStore>,
    reader: LogReader,
    diagnostics: Arc<dyn DiagnosticSink>,
    document: PayloadDocument,
}

impl ExclusiveGatewayHandler {
    pub fn new(log: Arc<dyn LogStore>, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            reader: LogReader::new(log.clone()),
            log,
            diagnostics,
            document: PayloadDocument::new(),
        }
    }

    /// Load the correlated payload into the scratch document. `Ok(false)`
    /// means the key index has no entry — fatal to this instance's step but
    /// not to the partition. A payload that is not a readable document is
    /// reported and leaves the scratch empty, so every path operand against
    /// it is unresolved; only log/index contract violations return `Err`.
    async fn wrap_branch_payload(&mut self, event: &FlowElementEvent) -> Result<bool> {
        let Some(position) = self.log.index_get(event.branch_key).await? else {
            return Ok(false);
        };
        self.reader.seek(position);
        let Some(record) = self.reader.next().await? else {
            bail!(
                "index for branch key {} points past the durable tail at position {}",
                event.branch_key,
                position
            );
        };
        let RecordValue::Branch(branch) = record.value else {
            bail!(
                "index for branch key {} points at a non-payload record at position {}",
                event.branch_key,
                position
            );
        };
        if let Err(error) = self.document.wrap(&branch.payload) {
            warn!(
                instance_id = event.instance_id,
                branch_key = event.branch_key,
                %error,
                "branch payload is not a readable document; its conditions cannot resolve"
            );
            self.diagnostics
                .emit(DiagnosticEvent::MalformedBranchPayload {
                    instance_id: event.instance_id,
                    branch_key: event.branch_key,
                    flow_element_id: event.flow_element_id,
                });
        }
        Ok(true)
    }

    /// Pick the flow index to take, or `None` when the gateway is stuck.
    /// First conditional flow evaluating to True wins, in declared order,
    /// short-circuiting the rest; otherwise the remembered default.
    fn determine_activated_flow(
        &self,
        event: &FlowElementEvent,
        graph: &ProcessGraph,
    ) -> Result<Option<usize>> {
        let mut visitor = FlowElementVisitor::new(graph);
        visitor.move_to_node(event.flow_element_id)?;
        let flow_count = visitor.outgoing_sequence_flows_count()?;

        let mut default_flow = None;
        for index in 0..flow_count {
            visitor.move_to_node(event.flow_element_id)?;
            visitor.traverse_sequence_flow(index)?;

            if visitor.is_default_flow()? {
                // Uniqueness is a graph invariant; nothing to re-check here.
                default_flow = Some(index);
                continue;
            }

            let result = match visitor.condition()? {
                Some(condition) => {
                    self.evaluate_flow_condition(event, visitor.flow_string_id()?, condition)
                }
                // Unconditional non-default flow: always applicable.
                None => Tri::True,
            };
            debug!(
                instance_id = event.instance_id,
                flow = visitor.flow_string_id()?,
                ?result,
                "condition evaluated"
            );
            if result.is_true() {
                return Ok(Some(index));
            }
        }

        Ok(default_flow)
    }

    fn evaluate_flow_condition(
        &self,
        event: &FlowElementEvent,
        flow_id: &str,
        condition: &Condition,
    ) -> Tri {
        let lhs = self.resolve_operand(event, flow_id, &condition.operand1);
        let rhs = self.resolve_operand(event, flow_id, &condition.operand2);
        evaluate(condition.operator, &lhs, &rhs)
    }

    /// Literals pass through; path expressions resolve against the wrapped
    /// payload. A non-scalar resolution is reported and excluded from
    /// matching — it is undecidable, not false.
    fn resolve_operand(
        &self,
        event: &FlowElementEvent,
        flow_id: &str,
        operand: &Operand,
    ) -> PathResolution {
        match operand {
            Operand::Literal(value) => PathResolution::Primitive(value.clone()),
            Operand::Path(expression) => {
                let resolution = self.document.resolve_path(expression);
                let reason = match resolution {
                    PathResolution::Unresolved => Some(UnresolvedReason::PathUnresolved),
                    PathResolution::Composite => Some(UnresolvedReason::CompositeValue),
                    PathResolution::Primitive(_) => None,
                };
                if let Some(reason) = reason {
                    warn!(
                        instance_id = event.instance_id,
                        flow = flow_id,
                        path = expression,
                        ?reason,
                        "condition operand did not resolve to a scalar"
                    );
                    self.diagnostics.emit(DiagnosticEvent::ConditionUnresolved {
                        instance_id: event.instance_id,
                        flow_id: flow_id.to_owned(),
                        reason,
                    });
                }
                resolution
            }
        }
    }

    /// Append the transition record for the selected flow. It carries the
    /// target node's identity and the originating process/instance/branch
    /// identifiers, and drives the next dispatch step.
    async fn take_sequence_flow(
        &self,
        event: &FlowElementEvent,
        graph: &ProcessGraph,
        log: &dyn LogStore,
        flow_index: usize,
    ) -> Result<()> {
        let mut visitor = FlowElementVisitor::new(graph);
        visitor.move_to_node(event.flow_element_id)?;
        visitor.traverse_sequence_flow(flow_index)?;

        let transition = FlowElementEvent {
            event_type: ExecutionEventType::SequenceFlowTaken,
            flow_element_id: visitor.node_id()?,
            flow_element_id_str: visitor.string_id()?.to_owned(),
            process_id: event.process_id,
            instance_id: event.instance_id,
            branch_key: event.branch_key,
        };
        debug!(
            instance_id = event.instance_id,
            flow = visitor.flow_string_id()?,
            target = transition.flow_element_id_str,
            "sequence flow taken"
        );
        log.append(event.branch_key, RecordValue::FlowElement(transition))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FlowElementHandler for ExclusiveGatewayHandler {
    fn handled_aspect(&self) -> BpmnAspect {
        BpmnAspect::ExclusiveSplit
    }

    async fn handle(
        &mut self,
        event: &FlowElementEvent,
        graph: &ProcessGraph,
        log: &dyn LogStore,
        _ids: &IdGenerator,
    ) -> Result<HandleOutcome> {
        if !self.wrap_branch_payload(event).await? {
            warn!(
                instance_id = event.instance_id,
                branch_key = event.branch_key,
                "no payload indexed for branch key; instance cannot take this step"
            );
            self.diagnostics.emit(DiagnosticEvent::MissingBranchPayload {
                instance_id: event.instance_id,
                branch_key: event.branch_key,
                flow_element_id: event.flow_element_id,
            });
            return Ok(HandleOutcome::Stuck(StuckReason::MissingBranchPayload));
        }

        match self.determine_activated_flow(event, graph)? {
            Some(flow_index) => {
                self.take_sequence_flow(event, graph, log, flow_index)
                    .await?;
                Ok(HandleOutcome::Advanced)
            }
            None => {
                warn!(
                    instance_id = event.instance_id,
                    gateway = event.flow_element_id_str,
                    "no outgoing sequence flow applies; instance is stuck"
                );
                self.diagnostics.emit(DiagnosticEvent::GatewayStuck {
                    instance_id: event.instance_id,
                    flow_element_id: event.flow_element_id,
                    flow_element_id_str: event.flow_element_id_str.clone(),
                });
                Ok(HandleOutcome::Stuck(StuckReason::NoFlowSelected))
            }
        }
    }
}
