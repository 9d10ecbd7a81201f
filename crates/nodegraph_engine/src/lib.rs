// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node graph evaluation engine.
//!
//! This crate provides a generic graph of typed nodes, pins and links that
//! can back shader graphs, AI graphs or visual scripting.
//!
//! ## Architecture
//!
//! - Typed input/output pins with a directed compatibility relation
//! - Connection validation on every link
//! - A registry of node types with evaluator factories
//! - Topological evaluation with cycle detection
//! - Versioned JSON serialization
//!
//! Concrete node logic is supplied by the embedder through
//! [`NodeEvaluator`] implementations.

pub mod port;
pub mod node;
pub mod connection;
pub mod graph;
pub mod evaluation;
pub mod serializer;

pub use port::{Pin, PinDirection, PinId, PinType, PinValue};
pub use node::{Node, NodeId, NodeTypeDefinition, NodeTypeRegistry, PinTemplate};
pub use connection::{Link, LinkId};
pub use graph::{ConnectionError, CycleError, IdsExhausted, NodeGraph};
pub use evaluation::{EvaluatorTable, GraphEvaluator, NodeEvaluator, NodeOutputs, PinValues};
pub use serializer::{
    FsTextStore, GraphSerializer, SerializeError, SerializeOptions, TextStore, GRAPH_FORMAT_VERSION,
    MAX_DOCUMENT_ID,
};
