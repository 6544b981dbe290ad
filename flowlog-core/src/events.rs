use crate::types::{BranchKey, InstanceId, NodeId, ProcessId};
use serde::{Deserialize, Serialize};

/// Execution event types driving aspect dispatch. A node's aspect table is
/// keyed by these, so the same element can react differently to an
/// activation than to a taken flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExecutionEventType {
    ProcessStarted,
    ElementActivated,
    SequenceFlowTaken,
    ElementCompleted,
    ProcessCompleted,
}

/// Event on a flow element. `SequenceFlowTaken` is the transition record:
/// it carries the *target* node's identity plus the process, instance and
/// branch identifiers copied from the event that triggered the transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowElementEvent {
    pub event_type: ExecutionEventType,
    pub flow_element_id: NodeId,
    pub flow_element_id_str: String,
    pub process_id: ProcessId,
    pub instance_id: InstanceId,
    pub branch_key: BranchKey,
}

/// Payload-bearing record for an execution branch. The key index maps the
/// branch key to the position of the most recent one of these; conditions
/// are only ever evaluated against payloads already durable on the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchEvent {
    pub branch_key: BranchKey,
    pub instance_id: InstanceId,
    pub payload: Vec<u8>,
}

/// The record body variants that live on the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RecordValue {
    FlowElement(FlowElementEvent),
    Branch(BranchEvent),
}
