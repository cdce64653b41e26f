use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use uuid::Uuid;

new_key_type! {
    /// Identifies a process node (source, sink, step, chain storage) inside a chain.
    pub struct NodeId;
}

/// Scopes one attempt of a process step to satisfy an output request.
///
/// Branch numbers are issued monotonically per step; the uuid keeps the
/// identifier unique across steps and chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputBranchIdentifier {
    pub branch_number: u64,
    pub uuid: Uuid,
}

impl OutputBranchIdentifier {
    pub fn new(branch_number: u64) -> Self {
        Self {
            branch_number,
            uuid: Uuid::new_v4(),
        }
    }
}

/// Scopes the sub-request of one named input stream inside an output branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamBranchIdentifier {
    pub stream_name: String,
    pub uuid: Uuid,
    pub parent_output_identifier: OutputBranchIdentifier,
}

impl StreamBranchIdentifier {
    pub fn new(stream_name: &str, parent_output_identifier: OutputBranchIdentifier) -> Self {
        Self {
            stream_name: stream_name.to_string(),
            uuid: Uuid::new_v4(),
            parent_output_identifier,
        }
    }
}

/// Scopes one delivery on an input stream.
///
/// `branch_number` equals the count of deliveries already completed on the
/// same stream branch when the identifier was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalBranchIdentifier {
    pub branch_number: u64,
    pub uuid: Uuid,
    pub parent_output_identifier: OutputBranchIdentifier,
}

impl TemporalBranchIdentifier {
    pub fn new(branch_number: u64, parent_output_identifier: OutputBranchIdentifier) -> Self {
        Self {
            branch_number,
            uuid: Uuid::new_v4(),
            parent_output_identifier,
        }
    }
}
