use crate::types::NodeId;
use thiserror::Error;

/// Programming-contract violations on graph traversal. These indicate a
/// corrupt compiled graph or a bad caller, never a data-dependent runtime
/// condition: the partition must stop mutating its log until the deployment
/// is corrected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GraphContractError {
    #[error("node id {id} out of range (graph has {node_count} nodes)")]
    NodeOutOfRange { id: NodeId, node_count: usize },

    #[error("sequence flow index {index} out of range (node {node} has {flow_count} outgoing flows)")]
    FlowIndexOutOfRange {
        node: NodeId,
        index: usize,
        flow_count: usize,
    },

    #[error("visitor is not positioned on a node")]
    NotPositioned,

    #[error("visitor has not traversed a sequence flow")]
    NoFlowTraversed,
}

/// Violations of the compiled-graph invariants, caught at build time by the
/// builder and again when decoding a graph buffer.
#[derive(Debug, Error)]
pub enum GraphBuildError {
    #[error("node ids must be dense from 0: node at index {index} has id {id}")]
    NonDenseNodeIds { index: usize, id: NodeId },

    #[error("node {node} declares more than one default flow")]
    MultipleDefaultFlows { node: NodeId },

    #[error("default flow '{flow}' on node {node} must not carry a condition")]
    ConditionalDefaultFlow { node: NodeId, flow: String },

    #[error("sequence flow '{flow}' from node {node} targets unknown node {target}")]
    DanglingFlowTarget {
        node: NodeId,
        flow: String,
        target: NodeId,
    },

    #[error("graph buffer failed to decode: {0}")]
    Decode(String),

    #[error("graph buffer content hash does not match its version header")]
    VersionMismatch,
}
