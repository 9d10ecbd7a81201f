// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::node::NodeId;
use std::fmt;

/// Unique identifier for a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(pub u32);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge from one node's output pin to another node's input pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Unique link ID
    pub id: LinkId,
    /// Source node ID
    pub from_node: NodeId,
    /// Index into the source node's outputs
    pub from_pin: usize,
    /// Target node ID
    pub to_node: NodeId,
    /// Index into the target node's inputs
    pub to_pin: usize,
}

impl Link {
    /// Create a new link
    pub fn new(id: LinkId, from_node: NodeId, from_pin: usize, to_node: NodeId, to_pin: usize) -> Self {
        Self {
            id,
            from_node,
            from_pin,
            to_node,
            to_pin,
        }
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from_node == node_id || self.to_node == node_id
    }

    /// Check if this link feeds a specific input pin
    pub fn feeds(&self, node_id: NodeId, pin_index: usize) -> bool {
        self.to_node == node_id && self.to_pin == pin_index
    }
}
