use crate::error::{GraphBuildError, GraphContractError};
use crate::events::ExecutionEventType;
use crate::types::{ConditionOperator, NodeId, ProcessId, ScalarValue};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// ─── Aspects ──────────────────────────────────────────────────

/// Tag on a (node, event type) pair selecting which handler logic applies.
/// New node kinds register new aspect/handler pairs; graph and gateway code
/// stay untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BpmnAspect {
    /// Exclusive (XOR) split: pick the single outgoing flow by condition.
    ExclusiveSplit,
    /// Element completed; take its single outgoing flow.
    TakeSequenceFlow,
    /// A flow pointing at this element was taken; activate the element.
    ActivateElement,
    /// Terminal element reached; complete the process.
    EndProcess,
}

// ─── Conditions ───────────────────────────────────────────────

/// One side of a condition: a literal scalar, or a path expression resolved
/// against the branch payload at evaluation time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Literal(ScalarValue),
    Path(String),
}

/// Condition guarding a sequence flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub operator: ConditionOperator,
    pub operand1: Operand,
    pub operand2: Operand,
}

impl Condition {
    pub fn new(operator: ConditionOperator, operand1: Operand, operand2: Operand) -> Self {
        Self {
            operator,
            operand1,
            operand2,
        }
    }
}

// ─── Graph arena ──────────────────────────────────────────────

/// Directed edge to another flow element, in declared order on its source
/// node. At most one outgoing flow per node may be the default flow, and a
/// default flow never carries a condition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequenceFlow {
    pub target: NodeId,
    pub string_id: String,
    pub is_default: bool,
    pub condition: Option<Condition>,
}

/// A flow element: task, gateway, or event node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: NodeId,
    pub string_id: String,
    pub aspects: BTreeMap<ExecutionEventType, BpmnAspect>,
    pub outgoing: Vec<SequenceFlow>,
}

/// Immutable compiled process graph. Node ids are dense from 0 and index
/// directly into the arena, so cursor repositioning is O(1). Built once at
/// deployment time and shared read-only across partitions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessGraph {
    process_id: ProcessId,
    nodes: Vec<FlowNode>,
}

#[derive(Serialize, Deserialize)]
struct GraphEnvelope {
    version: [u8; 32],
    graph: Vec<u8>,
}

impl ProcessGraph {
    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Result<&FlowNode, GraphContractError> {
        self.nodes
            .get(id as usize)
            .ok_or(GraphContractError::NodeOutOfRange {
                id,
                node_count: self.nodes.len(),
            })
    }

    /// Encode into the versioned binary buffer handed across deployments:
    /// a sha256 content hash followed by the serialized arena.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let graph = bincode::serialize(self)?;
        let version = content_hash(&graph);
        Ok(bincode::serialize(&GraphEnvelope { version, graph })?)
    }

    /// Decode a graph buffer, verifying the version hash and re-validating
    /// every structural invariant. A buffer that fails here is a corrupt
    /// deployment, not a runtime condition.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self, GraphBuildError> {
        let envelope: GraphEnvelope =
            bincode::deserialize(buffer).map_err(|e| GraphBuildError::Decode(e.to_string()))?;
        if content_hash(&envelope.graph) != envelope.version {
            return Err(GraphBuildError::VersionMismatch);
        }
        let graph: ProcessGraph = bincode::deserialize(&envelope.graph)
            .map_err(|e| GraphBuildError::Decode(e.to_string()))?;
        graph.validate()?;
        Ok(graph)
    }

    fn validate(&self) -> Result<(), GraphBuildError> {
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id as usize != index {
                return Err(GraphBuildError::NonDenseNodeIds {
                    index,
                    id: node.id,
                });
            }
            let mut default_seen = false;
            for flow in &node.outgoing {
                if flow.target as usize >= self.nodes.len() {
                    return Err(GraphBuildError::DanglingFlowTarget {
                        node: node.id,
                        flow: flow.string_id.clone(),
                        target: flow.target,
                    });
                }
                if flow.is_default {
                    if default_seen {
                        return Err(GraphBuildError::MultipleDefaultFlows { node: node.id });
                    }
                    if flow.condition.is_some() {
                        return Err(GraphBuildError::ConditionalDefaultFlow {
                            node: node.id,
                            flow: flow.string_id.clone(),
                        });
                    }
                    default_seen = true;
                }
            }
        }
        Ok(())
    }
}

fn content_hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

// ─── Builder ──────────────────────────────────────────────────

/// Stand-in for the external BPMN compiler: assembles a graph node by node
/// and enforces the structural invariants at `build()`.
pub struct ProcessGraphBuilder {
    process_id: ProcessId,
    nodes: Vec<FlowNode>,
}

impl ProcessGraphBuilder {
    pub fn new(process_id: ProcessId) -> Self {
        Self {
            process_id,
            nodes: Vec::new(),
        }
    }

    /// Add a node; ids are assigned densely in insertion order.
    pub fn node(&mut self, string_id: &str) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(FlowNode {
            id,
            string_id: string_id.to_owned(),
            aspects: BTreeMap::new(),
            outgoing: Vec::new(),
        });
        id
    }

    pub fn aspect(&mut self, node: NodeId, event_type: ExecutionEventType, aspect: BpmnAspect) {
        if let Some(n) = self.nodes.get_mut(node as usize) {
            n.aspects.insert(event_type, aspect);
        }
    }

    /// Append an outgoing sequence flow; declared order is evaluation order.
    pub fn sequence_flow(
        &mut self,
        from: NodeId,
        to: NodeId,
        string_id: &str,
        condition: Option<Condition>,
    ) {
        self.push_flow(from, to, string_id, false, condition);
    }

    pub fn default_flow(&mut self, from: NodeId, to: NodeId, string_id: &str) {
        self.push_flow(from, to, string_id, true, None);
    }

    fn push_flow(
        &mut self,
        from: NodeId,
        to: NodeId,
        string_id: &str,
        is_default: bool,
        condition: Option<Condition>,
    ) {
        if let Some(n) = self.nodes.get_mut(from as usize) {
            n.outgoing.push(SequenceFlow {
                target: to,
                string_id: string_id.to_owned(),
                is_default,
                condition,
            });
        }
    }

    pub fn build(self) -> Result<ProcessGraph, GraphBuildError> {
        let graph = ProcessGraph {
            process_id: self.process_id,
            nodes: self.nodes,
        };
        graph.validate()?;
        Ok(graph)
    }
}

// ─── Visitor ──────────────────────────────────────────────────

/// Positioned cursor over a process graph. Holds only the current node
/// index plus the last traversed edge, so repositioning is O(1) and the
/// graph itself stays immutably shared. Single-threaded scratch object:
/// concurrent traversals each take their own visitor.
pub struct FlowElementVisitor<'g> {
    graph: &'g ProcessGraph,
    node: Option<NodeId>,
    traversed: Option<(NodeId, usize)>,
}

impl<'g> FlowElementVisitor<'g> {
    pub fn new(graph: &'g ProcessGraph) -> Self {
        Self {
            graph,
            node: None,
            traversed: None,
        }
    }

    /// Reposition on a node by dense id. Clears any traversed-edge state.
    pub fn move_to_node(&mut self, id: NodeId) -> Result<(), GraphContractError> {
        self.graph.node(id)?;
        self.node = Some(id);
        self.traversed = None;
        Ok(())
    }

    fn current(&self) -> Result<&'g FlowNode, GraphContractError> {
        let id = self.node.ok_or(GraphContractError::NotPositioned)?;
        self.graph.node(id)
    }

    pub fn node_id(&self) -> Result<NodeId, GraphContractError> {
        self.node.ok_or(GraphContractError::NotPositioned)
    }

    pub fn string_id(&self) -> Result<&'g str, GraphContractError> {
        Ok(&self.current()?.string_id)
    }

    pub fn aspect_for(
        &self,
        event_type: ExecutionEventType,
    ) -> Result<Option<BpmnAspect>, GraphContractError> {
        Ok(self.current()?.aspects.get(&event_type).copied())
    }

    pub fn outgoing_sequence_flows_count(&self) -> Result<usize, GraphContractError> {
        Ok(self.current()?.outgoing.len())
    }

    /// Follow the i-th outgoing flow of the current node, in declared
    /// order. The cursor moves to the flow's target node; the flow itself
    /// stays inspectable through [`is_default_flow`](Self::is_default_flow),
    /// [`condition`](Self::condition) and
    /// [`flow_string_id`](Self::flow_string_id).
    pub fn traverse_sequence_flow(&mut self, index: usize) -> Result<(), GraphContractError> {
        let node = self.current()?;
        let flow = node
            .outgoing
            .get(index)
            .ok_or(GraphContractError::FlowIndexOutOfRange {
                node: node.id,
                index,
                flow_count: node.outgoing.len(),
            })?;
        self.traversed = Some((node.id, index));
        self.node = Some(flow.target);
        Ok(())
    }

    fn traversed_flow(&self) -> Result<&'g SequenceFlow, GraphContractError> {
        let (source, index) = self.traversed.ok_or(GraphContractError::NoFlowTraversed)?;
        // source/index were validated when the edge was traversed.
        Ok(&self.graph.node(source)?.outgoing[index])
    }

    pub fn is_default_flow(&self) -> Result<bool, GraphContractError> {
        Ok(self.traversed_flow()?.is_default)
    }

    pub fn condition(&self) -> Result<Option<&'g Condition>, GraphContractError> {
        Ok(self.traversed_flow()?.condition.as_ref())
    }

    pub fn flow_string_id(&self) -> Result<&'g str, GraphContractError> {
        Ok(&self.traversed_flow()?.string_id)
    }
}
