// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions and the node type registry.

use crate::evaluation::{EvaluatorTable, NodeEvaluator};
use crate::graph::NodeGraph;
use crate::port::{Pin, PinDirection, PinType, PinValue};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node instance in the graph
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Registered type, either `name` or `category/name`
    pub type_name: String,
    /// Position in the editor; not used by evaluation
    pub position: [f32; 2],
    /// Input pins
    pub inputs: Vec<Pin>,
    /// Output pins
    pub outputs: Vec<Pin>,
    /// Per-instance configuration
    pub properties: IndexMap<String, PinValue>,
}

impl Node {
    /// Create a node without pins
    pub fn new(id: NodeId, type_name: impl Into<String>, position: [f32; 2]) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            position,
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: IndexMap::new(),
        }
    }

    /// Get an input pin by index
    pub fn input(&self, index: usize) -> Option<&Pin> {
        self.inputs.get(index)
    }

    /// Get an output pin by index
    pub fn output(&self, index: usize) -> Option<&Pin> {
        self.outputs.get(index)
    }

    /// Get all pins, inputs first
    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Get a property value
    pub fn property(&self, name: &str) -> Option<&PinValue> {
        self.properties.get(name)
    }

    /// Set a property value
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<PinValue>) {
        self.properties.insert(name.into(), value.into());
    }
}

/// Pin shape used to populate new nodes of a registered type
#[derive(Debug, Clone, PartialEq)]
pub struct PinTemplate {
    /// Pin name
    pub name: String,
    /// Data type
    pub pin_type: PinType,
    /// Default value copied into the new pin
    pub default_value: PinValue,
}

impl PinTemplate {
    /// Create a template holding the zero value of its type
    pub fn new(name: impl Into<String>, pin_type: PinType) -> Self {
        Self {
            name: name.into(),
            pin_type,
            default_value: PinValue::default_for(pin_type),
        }
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<PinValue>) -> Self {
        self.default_value = value.into();
        self
    }
}

/// Produces a fresh evaluator for a node type
pub type EvaluatorFactory = Arc<dyn Fn() -> Box<dyn NodeEvaluator> + Send + Sync>;

/// Node type definition
#[derive(Clone)]
pub struct NodeTypeDefinition {
    /// Type name
    pub name: String,
    /// Category, may be empty
    pub category: String,
    /// Description
    pub description: String,
    /// Template input pins
    pub inputs: Vec<PinTemplate>,
    /// Template output pins
    pub outputs: Vec<PinTemplate>,
    /// Evaluator factory
    pub factory: Option<EvaluatorFactory>,
}

impl NodeTypeDefinition {
    /// Create a definition with no pins and no evaluator
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            factory: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a template input pin
    pub fn with_input(mut self, pin: PinTemplate) -> Self {
        self.inputs.push(pin);
        self
    }

    /// Append a template output pin
    pub fn with_output(mut self, pin: PinTemplate) -> Self {
        self.outputs.push(pin);
        self
    }

    /// Set the evaluator factory
    pub fn with_evaluator<F, E>(mut self, factory: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
        E: NodeEvaluator + 'static,
    {
        self.factory = Some(Arc::new(move || Box::new(factory()) as Box<dyn NodeEvaluator>));
        self
    }

    /// `category/name`, or the bare name when the category is empty
    pub fn full_name(&self) -> String {
        build_full_name(&self.category, &self.name)
    }

    /// Create a fresh evaluator, if the type has a factory
    pub fn create_evaluator(&self) -> Option<Box<dyn NodeEvaluator>> {
        self.factory.as_ref().map(|factory| factory())
    }
}

impl fmt::Debug for NodeTypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeTypeDefinition")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("description", &self.description)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

fn build_full_name(category: &str, name: &str) -> String {
    if category.is_empty() {
        name.to_owned()
    } else {
        format!("{category}/{name}")
    }
}

/// Registry of available node types.
///
/// Registration never de-duplicates; lookups return the earliest match.
#[derive(Debug, Clone, Default)]
pub struct NodeTypeRegistry {
    types: Vec<NodeTypeDefinition>,
}

impl NodeTypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node type
    pub fn register(&mut self, definition: NodeTypeDefinition) {
        tracing::trace!("Registered node type {}", definition.full_name());
        self.types.push(definition);
    }

    /// Get a node type by bare name, falling back to `category/name`
    pub fn get(&self, name: &str) -> Option<&NodeTypeDefinition> {
        self.types
            .iter()
            .find(|def| def.name == name)
            .or_else(|| self.types.iter().find(|def| def.full_name() == name))
    }

    /// Sorted, de-duplicated categories
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = self.types.iter().map(|def| def.category.as_str()).collect();
        categories.sort_unstable();
        categories.dedup();
        categories
    }

    /// Get types in a category, in registration order
    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a NodeTypeDefinition> {
        self.types.iter().filter(move |def| def.category == category)
    }

    /// Get all registered types, in registration order
    pub fn all(&self) -> impl Iterator<Item = &NodeTypeDefinition> {
        self.types.iter()
    }

    /// Number of registered definitions
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Remove every definition
    pub fn clear(&mut self) {
        self.types.clear();
    }

    /// Add a node of a registered type to `graph`, with pins built from the
    /// type's templates.
    pub fn create_node(&self, graph: &mut NodeGraph, name: &str, position: [f32; 2]) -> Option<NodeId> {
        let Some(def) = self.get(name) else {
            tracing::debug!("Cannot create node: unknown type {name}");
            return None;
        };

        let node_id = graph.add_node(def.full_name(), position);
        for template in &def.inputs {
            graph.add_pin(node_id, PinDirection::Input, template)?;
        }
        for template in &def.outputs {
            graph.add_pin(node_id, PinDirection::Output, template)?;
        }
        Some(node_id)
    }

    /// Build an evaluator table from every registered factory.
    ///
    /// Each type is reachable by its full name and by its bare name; the
    /// earliest registration wins on collisions.
    pub fn evaluators(&self) -> EvaluatorTable {
        let mut table = EvaluatorTable::new();
        for def in &self.types {
            let Some(factory) = &def.factory else {
                continue;
            };
            for key in [def.full_name(), def.name.clone()] {
                table.entry(key).or_insert_with(|| factory());
            }
        }
        table
    }
}
