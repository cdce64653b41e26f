//! Messages exchanged between process nodes.
//!
//! Upstream operations travel against the material flow (requests), downstream
//! operations travel with it (confirmations). Every chain run is one strictly
//! ordered sequence of these.

use serde::{Deserialize, Serialize};

use crate::id::TemporalBranchIdentifier;
use crate::stream::StreamState;

/// Payload shared by every addressed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOperationData {
    pub sender_name: String,
    pub next_node_name: String,
    pub stream_name: String,
    pub stream_state: StreamState,
    /// Delivery of the requesting node this operation is about. Echoed back
    /// unchanged by the provider.
    pub requester_branch: TemporalBranchIdentifier,
}

impl NodeOperationData {
    /// Same stream and delivery, sent by `sender` back to this operation's
    /// sender.
    pub fn reply(&self, sender: &str, stream_state: StreamState) -> NodeOperationData {
        NodeOperationData {
            sender_name: sender.to_string(),
            next_node_name: self.sender_name.clone(),
            stream_name: self.stream_name.clone(),
            stream_state,
            requester_branch: self.requester_branch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeOperation {
    /// Deliver `stream_state` on `stream_name`.
    UpstreamNewProductionOrder(NodeOperationData),
    /// The requested delivery is planned exactly as `stream_state`.
    DownstreamValidationOrder(NodeOperationData),
    /// The provider can only deliver `stream_state` instead.
    DownstreamAdaptionOrder(NodeOperationData),
    /// The requester accepted the adapted `stream_state`.
    UpstreamAdaptionOrder(NodeOperationData),
    /// Nothing left to plan.
    TerminateProduction { sender_name: String },
}

impl NodeOperation {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeOperation::UpstreamNewProductionOrder(_) => "UpstreamNewProductionOrder",
            NodeOperation::DownstreamValidationOrder(_) => "DownstreamValidationOrder",
            NodeOperation::DownstreamAdaptionOrder(_) => "DownstreamAdaptionOrder",
            NodeOperation::UpstreamAdaptionOrder(_) => "UpstreamAdaptionOrder",
            NodeOperation::TerminateProduction { .. } => "TerminateProduction",
        }
    }

    pub fn data(&self) -> Option<&NodeOperationData> {
        match self {
            NodeOperation::UpstreamNewProductionOrder(d)
            | NodeOperation::DownstreamValidationOrder(d)
            | NodeOperation::DownstreamAdaptionOrder(d)
            | NodeOperation::UpstreamAdaptionOrder(d) => Some(d),
            NodeOperation::TerminateProduction { .. } => None,
        }
    }

    /// Addressee, `None` for [`NodeOperation::TerminateProduction`].
    pub fn next_node_name(&self) -> Option<&str> {
        self.data().map(|d| d.next_node_name.as_str())
    }

    pub fn sender_name(&self) -> &str {
        match self {
            NodeOperation::TerminateProduction { sender_name } => sender_name,
            other => other.data().map_or("", |d| d.sender_name.as_str()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeOperation::TerminateProduction { .. })
    }
}
