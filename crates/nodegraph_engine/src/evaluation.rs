// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph evaluation and execution.
//!
//! Evaluation is pull-based over a topological order: each node sees the
//! outputs of the nodes feeding it, or its pins' default values where no
//! link is attached. The whole graph is evaluated from scratch on every call.

use crate::graph::{CycleError, NodeGraph};
use crate::node::{Node, NodeId};
use crate::port::PinValue;
use std::collections::{BTreeMap, HashMap};

/// Values keyed by pin index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PinValues {
    values: BTreeMap<usize, PinValue>,
}

impl PinValues {
    /// Create an empty set of values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of a pin
    pub fn set(&mut self, pin_index: usize, value: impl Into<PinValue>) {
        self.values.insert(pin_index, value.into());
    }

    /// Get the value of a pin
    pub fn get(&self, pin_index: usize) -> Option<&PinValue> {
        self.values.get(&pin_index)
    }

    /// Value of the lowest pin index
    pub fn first(&self) -> Option<&PinValue> {
        self.values.values().next()
    }

    /// Iterate over values in pin order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PinValue)> {
        self.values.iter().map(|(index, value)| (*index, value))
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(usize, PinValue)> for PinValues {
    fn from_iter<I: IntoIterator<Item = (usize, PinValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Per-type node logic supplied by whatever embeds the graph
pub trait NodeEvaluator {
    /// Map a node's input values to its output values
    fn evaluate(&self, node: &Node, inputs: &PinValues) -> PinValues;
}

impl<F> NodeEvaluator for F
where
    F: Fn(&Node, &PinValues) -> PinValues,
{
    fn evaluate(&self, node: &Node, inputs: &PinValues) -> PinValues {
        self(node, inputs)
    }
}

/// Evaluators keyed by node type name
pub type EvaluatorTable = HashMap<String, Box<dyn NodeEvaluator>>;

/// Outputs of every evaluated node
pub type NodeOutputs = BTreeMap<NodeId, PinValues>;

/// Context for one evaluation pass
pub struct EvaluationContext<'a> {
    /// The graph being evaluated
    pub graph: &'a NodeGraph,
    /// Outputs of nodes evaluated so far
    outputs: NodeOutputs,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(graph: &'a NodeGraph) -> Self {
        Self {
            graph,
            outputs: NodeOutputs::new(),
        }
    }

    /// Value arriving over the link into an input pin, if the source has
    /// produced one
    pub fn linked_input(&self, node_id: NodeId, pin_index: usize) -> Option<&PinValue> {
        let link = self.graph.input_link(node_id, pin_index)?;
        self.outputs.get(&link.from_node)?.get(link.from_pin)
    }

    /// Gather every input of a node, falling back to pin defaults
    pub fn inputs_for(&self, node: &Node) -> PinValues {
        node.inputs
            .iter()
            .enumerate()
            .map(|(index, pin)| {
                let value = self
                    .linked_input(node.id, index)
                    .unwrap_or(&pin.default_value);
                (index, value.clone())
            })
            .collect()
    }

    /// Record the outputs of a node
    pub fn set_outputs(&mut self, node_id: NodeId, outputs: PinValues) {
        self.outputs.insert(node_id, outputs);
    }

    /// Get the outputs of a node
    pub fn outputs_of(&self, node_id: NodeId) -> Option<&PinValues> {
        self.outputs.get(&node_id)
    }

    /// Finish the pass
    pub fn into_outputs(self) -> NodeOutputs {
        self.outputs
    }
}

/// Sorts and evaluates graphs; holds no state between calls
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphEvaluator;

impl GraphEvaluator {
    /// Create a new evaluator
    pub fn new() -> Self {
        Self
    }

    /// Dependency order of the graph, or an error if it has a cycle
    pub fn try_topological_order(&self, graph: &NodeGraph) -> Result<Vec<NodeId>, CycleError> {
        graph.topological_order()
    }

    /// Dependency order of the graph; empty if it has a cycle.
    ///
    /// An empty result is also returned for an empty graph, use
    /// [`has_cycles`](Self::has_cycles) to tell the two apart.
    pub fn topological_sort(&self, graph: &NodeGraph) -> Vec<NodeId> {
        graph.topological_order().unwrap_or_default()
    }

    /// Whether the graph has at least one node and no valid order
    pub fn has_cycles(&self, graph: &NodeGraph) -> bool {
        self.topological_sort(graph).is_empty() && !graph.is_empty()
    }

    /// Evaluate every node, returning all output values per node.
    ///
    /// Nodes whose type has no evaluator are skipped and produce nothing;
    /// their consumers see default values instead. A cyclic graph yields an
    /// empty result.
    pub fn evaluate(&self, graph: &NodeGraph, evaluators: &EvaluatorTable) -> NodeOutputs {
        let order = match graph.topological_order() {
            Ok(order) => order,
            Err(err) => {
                tracing::warn!("Skipping evaluation: {err}");
                return NodeOutputs::new();
            }
        };

        let mut ctx = EvaluationContext::new(graph);
        for node_id in order {
            let Some(node) = graph.node(node_id) else {
                continue;
            };
            let Some(evaluator) = evaluators.get(&node.type_name) else {
                tracing::debug!("No evaluator for {} (node {node_id}), skipping", node.type_name);
                continue;
            };

            let inputs = ctx.inputs_for(node);
            let outputs = evaluator.evaluate(node, &inputs);
            tracing::trace!("Evaluated node {node_id}: {} outputs", outputs.len());
            ctx.set_outputs(node_id, outputs);
        }

        ctx.into_outputs()
    }

    /// Evaluate and keep one value per node: the output with the lowest
    /// pin index. Nodes that produced no outputs are left out.
    pub fn evaluate_primary(&self, graph: &NodeGraph, evaluators: &EvaluatorTable) -> BTreeMap<NodeId, PinValue> {
        self.evaluate(graph, evaluators)
            .into_iter()
            .filter_map(|(node_id, outputs)| outputs.first().cloned().map(|value| (node_id, value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PinType;

    fn constant(node: &Node, _: &PinValues) -> PinValues {
        let mut out = PinValues::new();
        out.set(0, node.outputs[0].default_value.clone());
        out
    }

    fn double(_: &Node, inputs: &PinValues) -> PinValues {
        let value = inputs.get(0).and_then(PinValue::as_float).unwrap_or(0.0);
        let mut out = PinValues::new();
        out.set(0, value * 2.0);
        out
    }

    fn table() -> EvaluatorTable {
        let mut table = EvaluatorTable::new();
        table.insert("Const".to_string(), Box::new(constant));
        table.insert("Double".to_string(), Box::new(double));
        table
    }

    fn const_double() -> (NodeGraph, NodeId, NodeId) {
        let mut graph = NodeGraph::new();
        let a = graph.add_node("Const", [0.0, 0.0]);
        let b = graph.add_node("Double", [200.0, 0.0]);
        graph.add_output_pin(a, "Value", PinType::Float).unwrap();
        graph.node_mut(a).unwrap().outputs[0].default_value = PinValue::Float(5.0);
        graph.add_input_pin(b, "In", PinType::Float).unwrap();
        graph.add_output_pin(b, "Out", PinType::Float).unwrap();
        (graph, a, b)
    }

    #[test]
    fn test_linked_value_flows_downstream() {
        let (mut graph, a, b) = const_double();
        graph.add_link(a, 0, b, 0).unwrap();

        let results = GraphEvaluator::new().evaluate_primary(&graph, &table());
        assert_eq!(results.get(&a), Some(&PinValue::Float(5.0)));
        assert_eq!(results.get(&b), Some(&PinValue::Float(10.0)));
    }

    #[test]
    fn test_unlinked_input_uses_default() {
        let (mut graph, _, b) = const_double();
        graph.node_mut(b).unwrap().inputs[0].default_value = PinValue::Float(1.5);

        let outputs = GraphEvaluator::new().evaluate(&graph, &table());
        assert_eq!(outputs[&b].get(0), Some(&PinValue::Float(3.0)));
    }

    #[test]
    fn test_missing_evaluator_is_skipped() {
        let (mut graph, a, b) = const_double();
        graph.add_link(a, 0, b, 0).unwrap();
        let mut evaluators = table();
        evaluators.remove("Const");

        let outputs = GraphEvaluator::new().evaluate(&graph, &evaluators);
        assert!(!outputs.contains_key(&a));
        // Falls back to the input default of 0.0
        assert_eq!(outputs[&b].get(0), Some(&PinValue::Float(0.0)));
    }

    #[test]
    fn test_every_output_is_kept() {
        let mut graph = NodeGraph::new();
        let split = graph.add_node("Split", [0.0, 0.0]);
        graph.add_output_pin(split, "X", PinType::Float).unwrap();
        graph.add_output_pin(split, "Y", PinType::Float).unwrap();

        let mut evaluators = EvaluatorTable::new();
        evaluators.insert(
            "Split".to_string(),
            Box::new(|_: &Node, _: &PinValues| -> PinValues {
                [(0, PinValue::Float(1.0)), (1, PinValue::Float(2.0))].into_iter().collect()
            }),
        );

        let evaluator = GraphEvaluator::new();
        let outputs = evaluator.evaluate(&graph, &evaluators);
        assert_eq!(outputs[&split].len(), 2);
        assert_eq!(outputs[&split].get(1), Some(&PinValue::Float(2.0)));
        assert_eq!(evaluator.evaluate_primary(&graph, &evaluators)[&split], PinValue::Float(1.0));
    }

    #[test]
    fn test_cycle_yields_nothing() {
        let (mut graph, a, b) = const_double();
        graph.add_input_pin(a, "In", PinType::Float).unwrap();
        graph.add_link(a, 0, b, 0).unwrap();
        graph.add_link(b, 0, a, 0).unwrap();

        let evaluator = GraphEvaluator::new();
        assert!(evaluator.has_cycles(&graph));
        assert!(evaluator.topological_sort(&graph).is_empty());
        assert!(evaluator.try_topological_order(&graph).is_err());
        assert!(evaluator.evaluate(&graph, &table()).is_empty());
    }

    #[test]
    fn test_empty_graph_has_no_cycles() {
        let graph = NodeGraph::new();
        let evaluator = GraphEvaluator::new();
        assert!(evaluator.topological_sort(&graph).is_empty());
        assert!(!evaluator.has_cycles(&graph));
        assert!(evaluator.evaluate(&graph, &table()).is_empty());
    }

    #[test]
    fn test_context_reports_linked_inputs() {
        let (mut graph, a, b) = const_double();
        graph.add_link(a, 0, b, 0).unwrap();

        let mut ctx = EvaluationContext::new(&graph);
        assert!(ctx.linked_input(b, 0).is_none());
        let mut out = PinValues::new();
        out.set(0, 7.0_f32);
        ctx.set_outputs(a, out);
        assert_eq!(ctx.linked_input(b, 0), Some(&PinValue::Float(7.0)));
        assert_eq!(ctx.outputs_of(a).map(PinValues::len), Some(1));
    }
}
