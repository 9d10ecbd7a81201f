// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and links.

use crate::connection::{Link, LinkId};
use crate::node::{Node, NodeId, PinTemplate};
use crate::port::{Pin, PinDirection, PinId, PinType};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// A node graph.
///
/// Nodes, pins and links draw their IDs from one counter, so an ID is
/// unique across all three and is never handed out twice.
#[derive(Debug, Clone)]
pub struct NodeGraph {
    /// Nodes in the graph
    nodes: IndexMap<NodeId, Node>,
    /// Links between nodes
    links: IndexMap<LinkId, Link>,
    /// Next ID to hand out
    next_id: u32,
}

impl NodeGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self {
            nodes: IndexMap::new(),
            links: IndexMap::new(),
            next_id: 1,
        }
    }

    /// Build a graph from nodes and links that were already validated,
    /// typically by an earlier serialization pass.
    ///
    /// No connection checks run here. The ID counter continues after the
    /// largest node, pin or link ID found, which fails when that ID is
    /// `u32::MAX`.
    pub fn from_parts(nodes: Vec<Node>, links: Vec<Link>) -> Result<Self, IdsExhausted> {
        let max_node = nodes
            .iter()
            .flat_map(|node| std::iter::once(node.id.0).chain(node.pins().map(|pin| pin.id.0)))
            .max()
            .unwrap_or(0);
        let max_link = links.iter().map(|link| link.id.0).max().unwrap_or(0);
        let next_id = max_node.max(max_link).checked_add(1).ok_or(IdsExhausted)?;

        Ok(Self {
            nodes: nodes.into_iter().map(|node| (node.id, node)).collect(),
            links: links.into_iter().map(|link| (link.id, link)).collect(),
            next_id,
        })
    }

    /// Hand out a fresh ID from the shared counter.
    ///
    /// # Panics
    ///
    /// Panics once every `u32` ID has been handed out, in the same way
    /// `Vec::push` panics on capacity overflow.
    pub fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = match id.checked_add(1) {
            Some(next) => next,
            None => panic!("{}", IdsExhausted),
        };
        id
    }

    /// The ID the next allocation will return
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Add a node without pins
    pub fn add_node(&mut self, type_name: impl Into<String>, position: [f32; 2]) -> NodeId {
        let id = NodeId(self.allocate_id());
        self.nodes.insert(id, Node::new(id, type_name, position));
        id
    }

    /// Append a pin built from `template` to a node
    pub fn add_pin(&mut self, node_id: NodeId, direction: PinDirection, template: &PinTemplate) -> Option<PinId> {
        if !self.nodes.contains_key(&node_id) {
            return None;
        }
        let id = PinId(self.allocate_id());
        let pin = Pin::new(id, template.name.clone(), template.pin_type, direction)
            .with_default(template.default_value.clone());

        let node = self.nodes.get_mut(&node_id)?;
        match direction {
            PinDirection::Input => node.inputs.push(pin),
            PinDirection::Output => node.outputs.push(pin),
        }
        Some(id)
    }

    /// Append an input pin holding the zero value of its type
    pub fn add_input_pin(&mut self, node_id: NodeId, name: impl Into<String>, pin_type: PinType) -> Option<PinId> {
        self.add_pin(node_id, PinDirection::Input, &PinTemplate::new(name, pin_type))
    }

    /// Append an output pin holding the zero value of its type
    pub fn add_output_pin(&mut self, node_id: NodeId, name: impl Into<String>, pin_type: PinType) -> Option<PinId> {
        self.add_pin(node_id, PinDirection::Output, &PinTemplate::new(name, pin_type))
    }

    /// Remove a node and every link touching it
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        self.links.retain(|_, link| !link.involves_node(node_id));
        self.nodes.shift_remove(&node_id)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Get all nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs, in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check every rule a new link has to satisfy, in order: no self-loop,
    /// both nodes exist, both pin indices are in range, output feeds input,
    /// and the pin types are compatible.
    ///
    /// This is the only place pin-level link rules are checked.
    pub fn validate_connection(
        &self,
        from_node: NodeId,
        from_pin: usize,
        to_node: NodeId,
        to_pin: usize,
    ) -> Result<(), ConnectionError> {
        if from_node == to_node {
            return Err(ConnectionError::SelfLoop);
        }

        let source_node = self.nodes.get(&from_node)
            .ok_or(ConnectionError::NodeNotFound(from_node))?;
        let target_node = self.nodes.get(&to_node)
            .ok_or(ConnectionError::NodeNotFound(to_node))?;

        let source = source_node.output(from_pin)
            .ok_or(ConnectionError::OutputOutOfRange { node: from_node, index: from_pin })?;
        let target = target_node.input(to_pin)
            .ok_or(ConnectionError::InputOutOfRange { node: to_node, index: to_pin })?;

        if source.direction != PinDirection::Output || target.direction != PinDirection::Input {
            return Err(ConnectionError::WrongDirection);
        }

        if !source.pin_type.can_connect_to(target.pin_type) {
            return Err(ConnectionError::IncompatibleTypes {
                from: source.pin_type,
                to: target.pin_type,
            });
        }

        Ok(())
    }

    /// Whether a link between these pins would be valid
    pub fn can_connect(&self, from_node: NodeId, from_pin: usize, to_node: NodeId, to_pin: usize) -> bool {
        self.validate_connection(from_node, from_pin, to_node, to_pin).is_ok()
    }

    /// Link an output pin to an input pin.
    ///
    /// An input accepts a single link: any link already feeding `to_pin` is
    /// replaced. Nothing changes when validation fails.
    pub fn add_link(
        &mut self,
        from_node: NodeId,
        from_pin: usize,
        to_node: NodeId,
        to_pin: usize,
    ) -> Result<LinkId, ConnectionError> {
        if let Err(err) = self.validate_connection(from_node, from_pin, to_node, to_pin) {
            tracing::debug!(
                "Rejected link {from_node}[{from_pin}] -> {to_node}[{to_pin}]: {err}"
            );
            return Err(err);
        }

        self.links.retain(|_, link| !link.feeds(to_node, to_pin));

        let id = LinkId(self.allocate_id());
        self.links.insert(id, Link::new(id, from_node, from_pin, to_node, to_pin));
        Ok(id)
    }

    /// Remove a link
    pub fn remove_link(&mut self, link_id: LinkId) -> Option<Link> {
        self.links.shift_remove(&link_id)
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links.get(&link_id)
    }

    /// Get all links, in insertion order
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Get the link feeding an input pin
    pub fn input_link(&self, node_id: NodeId, pin_index: usize) -> Option<&Link> {
        self.links.values().find(|link| link.feeds(node_id, pin_index))
    }

    /// Get links involving a node
    pub fn links_for_node(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.values().filter(move |link| link.involves_node(node_id))
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Remove everything and restart IDs at 1
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.next_id = 1;
    }

    /// Get nodes in dependency order: every node comes after the nodes
    /// feeding its inputs.
    ///
    /// Roots are visited in insertion order and dependencies in link order,
    /// so the result is deterministic.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut dependencies: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for link in self.links.values() {
            // Links to nodes that are gone carry no ordering constraint
            if self.nodes.contains_key(&link.from_node) {
                dependencies.entry(link.to_node).or_default().push(link.from_node);
            }
        }

        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut order = Vec::with_capacity(self.nodes.len());

        for node_id in self.nodes.keys() {
            if !visited.contains(node_id) {
                visit(*node_id, &dependencies, &mut visited, &mut on_stack, &mut order)?;
            }
        }

        Ok(order)
    }
}

/// Iterative depth-first walk from `root`. Each stack frame holds a node and
/// the index of its next dependency to look at.
fn visit(
    root: NodeId,
    dependencies: &HashMap<NodeId, Vec<NodeId>>,
    visited: &mut HashSet<NodeId>,
    on_stack: &mut HashSet<NodeId>,
    order: &mut Vec<NodeId>,
) -> Result<(), CycleError> {
    let mut stack = vec![(root, 0usize)];
    on_stack.insert(root);

    while let Some((node_id, next)) = stack.last_mut() {
        let node_deps = dependencies.get(node_id).map_or(&[][..], Vec::as_slice);

        if let Some(&dependency) = node_deps.get(*next) {
            *next += 1;
            if on_stack.contains(&dependency) {
                return Err(CycleError);
            }
            if !visited.contains(&dependency) {
                on_stack.insert(dependency);
                stack.push((dependency, 0));
            }
        } else {
            let done = *node_id;
            stack.pop();
            on_stack.remove(&done);
            visited.insert(done);
            order.push(done);
        }
    }

    Ok(())
}

impl Default for NodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Error when creating a link
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    /// Source and target are the same node
    #[error("Self-loop not allowed")]
    SelfLoop,

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Source pin index is out of range
    #[error("Node {node} has no output {index}")]
    OutputOutOfRange {
        /// Source node
        node: NodeId,
        /// Requested output index
        index: usize,
    },

    /// Target pin index is out of range
    #[error("Node {node} has no input {index}")]
    InputOutOfRange {
        /// Target node
        node: NodeId,
        /// Requested input index
        index: usize,
    },

    /// The link does not run from an output to an input
    #[error("Links must run from an output pin to an input pin")]
    WrongDirection,

    /// Incompatible pin types
    #[error("Cannot connect {from} to {to}")]
    IncompatibleTypes {
        /// Source pin type
        from: PinType,
        /// Target pin type
        to: PinType,
    },
}

/// Error when the shared ID counter has no IDs left
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Graph ID space is exhausted")]
pub struct IdsExhausted;

/// Error when graph contains a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Graph contains a cycle")]
pub struct CycleError;
