// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON persistence for node graphs.
//!
//! ```json
//! {
//!   "version": 1,
//!   "nodes": [
//!     {
//!       "id": 1, "type": "Math/Add", "position": [120.0, 40.0],
//!       "inputs":  [{"id": 2, "name": "A", "type": 3, "default_value": 0.0}],
//!       "outputs": [{"id": 3, "name": "Result", "type": 3, "default_value": 0.0}],
//!       "properties": {}
//!     }
//!   ],
//!   "links": [{"id": 10, "from_node": 1, "from_pin": 0, "to_node": 2, "to_pin": 0}]
//! }
//! ```
//!
//! Pin `type` is the [`PinType`] ordinal. Values are written untagged. On
//! read, a value shaped like the owning pin's type decodes as that type and
//! anything else by its JSON shape. Node properties are written but not read
//! back.

use crate::connection::{Link, LinkId};
use crate::graph::{IdsExhausted, NodeGraph};
use crate::node::{Node, NodeId};
use crate::port::{Pin, PinDirection, PinId, PinType, PinValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::path::Path;

/// Format version written to and required from every document
pub const GRAPH_FORMAT_VERSION: i64 = 1;

/// Largest node, pin or link ID a document may carry. IDs above it are
/// rejected so a loaded graph always has room to allocate new IDs.
pub const MAX_DOCUMENT_ID: u32 = i32::MAX as u32;

#[derive(Serialize, Deserialize)]
struct GraphDocument<V> {
    version: i64,
    #[serde(default)]
    nodes: Vec<NodeRecord<V>>,
    #[serde(default)]
    links: Vec<LinkRecord>,
}

#[derive(Serialize, Deserialize)]
struct NodeRecord<V> {
    id: u32,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    position: [f32; 2],
    #[serde(default)]
    inputs: Vec<PinRecord<V>>,
    #[serde(default)]
    outputs: Vec<PinRecord<V>>,
    #[serde(default)]
    properties: IndexMap<String, V>,
}

#[derive(Serialize, Deserialize)]
struct PinRecord<V> {
    id: u32,
    name: String,
    #[serde(rename = "type")]
    pin_type: i64,
    #[serde(default)]
    default_value: V,
}

#[derive(Serialize, Deserialize)]
struct LinkRecord {
    id: u32,
    from_node: u32,
    from_pin: usize,
    to_node: u32,
    to_pin: usize,
}

/// Output settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Indent with two spaces instead of writing one line
    pub pretty: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self { pretty: true }
    }
}

/// Text file access used by [`GraphSerializer::save`] and
/// [`GraphSerializer::load`]
pub trait TextStore {
    /// Read a whole file as UTF-8
    fn read_text(&self, path: &Path) -> io::Result<String>;

    /// Create or replace a file
    fn write_text(&self, path: &Path, contents: &str) -> io::Result<()>;
}

/// [`TextStore`] backed by the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTextStore;

impl TextStore for FsTextStore {
    fn read_text(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_text(&self, path: &Path, contents: &str) -> io::Result<()> {
        std::fs::write(path, contents)
    }
}

/// Reads and writes graph documents
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphSerializer {
    options: SerializeOptions,
}

impl GraphSerializer {
    /// Serializer with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializer with custom options
    pub fn with_options(options: SerializeOptions) -> Self {
        Self { options }
    }

    /// Write a graph to a JSON string
    pub fn serialize(&self, graph: &NodeGraph) -> Result<String, SerializeError> {
        let document = GraphDocument {
            version: GRAPH_FORMAT_VERSION,
            nodes: graph.nodes().map(node_record).collect(),
            links: graph
                .links()
                .map(|link| LinkRecord {
                    id: link.id.0,
                    from_node: link.from_node.0,
                    from_pin: link.from_pin,
                    to_node: link.to_node.0,
                    to_pin: link.to_pin,
                })
                .collect(),
        };

        let json = if self.options.pretty {
            serde_json::to_string_pretty(&document)?
        } else {
            serde_json::to_string(&document)?
        };
        Ok(json)
    }

    /// Read a graph from a JSON string.
    ///
    /// The document's version must equal [`GRAPH_FORMAT_VERSION`]. Links
    /// are restored as written, without connection checks.
    pub fn deserialize(&self, json: &str) -> Result<NodeGraph, SerializeError> {
        let value: Value = serde_json::from_str(json)?;

        let version = value
            .get("version")
            .and_then(Value::as_i64)
            .ok_or(SerializeError::MissingVersion)?;
        if version != GRAPH_FORMAT_VERSION {
            tracing::warn!("Graph format version {version} is not supported (expected {GRAPH_FORMAT_VERSION})");
            return Err(SerializeError::VersionMismatch {
                found: version,
                expected: GRAPH_FORMAT_VERSION,
            });
        }

        let document: GraphDocument<Value> = serde_json::from_value(value)?;

        let nodes = document
            .nodes
            .into_iter()
            .map(read_node)
            .collect::<Result<Vec<_>, _>>()?;
        let links = document
            .links
            .into_iter()
            .map(|link| {
                Ok(Link::new(
                    LinkId(document_id(link.id)?),
                    NodeId(link.from_node),
                    link.from_pin,
                    NodeId(link.to_node),
                    link.to_pin,
                ))
            })
            .collect::<Result<Vec<_>, SerializeError>>()?;

        NodeGraph::from_parts(nodes, links).map_err(SerializeError::from)
    }

    /// Replace `graph` with the graph read from `json`. On error `graph` is
    /// left untouched.
    pub fn deserialize_into(&self, json: &str, graph: &mut NodeGraph) -> Result<(), SerializeError> {
        match self.deserialize(json) {
            Ok(loaded) => {
                *graph = loaded;
                Ok(())
            }
            Err(err) => {
                tracing::debug!("Failed to read graph: {err}");
                Err(err)
            }
        }
    }

    /// Serialize `graph` and write it through `store`
    pub fn save(&self, graph: &NodeGraph, store: &impl TextStore, path: &Path) -> Result<(), SerializeError> {
        let json = self.serialize(graph)?;
        store.write_text(path, &json)?;
        Ok(())
    }

    /// Read a graph through `store` into `graph`. On error `graph` is left
    /// untouched.
    pub fn load(&self, store: &impl TextStore, path: &Path, graph: &mut NodeGraph) -> Result<(), SerializeError> {
        let json = store.read_text(path)?;
        self.deserialize_into(&json, graph)
    }
}

fn node_record(node: &Node) -> NodeRecord<&PinValue> {
    fn pin_record(pin: &Pin) -> PinRecord<&PinValue> {
        PinRecord {
            id: pin.id.0,
            name: pin.name.clone(),
            pin_type: i64::from(pin.pin_type.ordinal()),
            default_value: &pin.default_value,
        }
    }

    NodeRecord {
        id: node.id.0,
        type_name: node.type_name.clone(),
        position: node.position,
        inputs: node.inputs.iter().map(pin_record).collect(),
        outputs: node.outputs.iter().map(pin_record).collect(),
        properties: node
            .properties
            .iter()
            .map(|(name, value)| (name.clone(), value))
            .collect(),
    }
}

fn read_node(record: NodeRecord<Value>) -> Result<Node, SerializeError> {
    let mut node = Node::new(NodeId(document_id(record.id)?), record.type_name, record.position);
    node.inputs = record
        .inputs
        .into_iter()
        .map(|pin| read_pin(pin, PinDirection::Input))
        .collect::<Result<_, _>>()?;
    node.outputs = record
        .outputs
        .into_iter()
        .map(|pin| read_pin(pin, PinDirection::Output))
        .collect::<Result<_, _>>()?;
    // TODO: restore properties once node types declare their property types
    Ok(node)
}

fn read_pin(record: PinRecord<Value>, direction: PinDirection) -> Result<Pin, SerializeError> {
    let pin_type = PinType::from_ordinal(record.pin_type)
        .ok_or(SerializeError::UnknownPinType(record.pin_type))?;
    let default_value = read_value(&record.default_value, pin_type)?;
    Ok(Pin::new(PinId(document_id(record.id)?), record.name, pin_type, direction).with_default(default_value))
}

fn document_id(id: u32) -> Result<u32, SerializeError> {
    if id > MAX_DOCUMENT_ID {
        return Err(SerializeError::IdOutOfRange(id));
    }
    Ok(id)
}

/// Decode an untagged value for a pin of type `pin_type`.
///
/// A pin may hold a value of another variant than its type, written by
/// shape. Such values are read back by shape as well.
fn read_value(value: &Value, pin_type: PinType) -> Result<PinValue, SerializeError> {
    if value.is_null() {
        return Ok(PinValue::default_for(pin_type));
    }

    exact_value(value, pin_type)
        .or_else(|| infer_value(value))
        .or_else(|| vector_fallback(value, pin_type))
        .ok_or_else(|| SerializeError::InvalidValue {
            pin_type,
            value: value.to_string(),
        })
}

/// Decode a value whose JSON shape is exactly what `pin_type` writes
fn exact_value(value: &Value, pin_type: PinType) -> Option<PinValue> {
    match pin_type {
        PinType::Bool => value.as_bool().map(PinValue::Bool),
        PinType::Int | PinType::Texture => as_i32(value).map(PinValue::Int),
        // Floats are always written with a fraction or exponent
        PinType::Float if value.is_f64() => value.as_f64().map(|v| PinValue::Float(v as f32)),
        PinType::Vec2 => components(value).map(PinValue::Vec2),
        PinType::Vec3 => components(value).map(PinValue::Vec3),
        PinType::Vec4 | PinType::Color => components(value).map(PinValue::Vec4),
        PinType::String => value.as_str().map(PinValue::from),
        PinType::Float | PinType::Flow | PinType::Any => None,
    }
}

/// Decode a value by its JSON shape alone
fn infer_value(value: &Value) -> Option<PinValue> {
    match value {
        Value::Bool(v) => Some(PinValue::Bool(*v)),
        Value::Number(_) => as_i32(value)
            .map(PinValue::Int)
            .or_else(|| value.as_f64().map(|v| PinValue::Float(v as f32))),
        Value::String(v) => Some(PinValue::String(v.clone())),
        Value::Array(_) => components(value)
            .map(PinValue::Vec2)
            .or_else(|| components(value).map(PinValue::Vec3))
            .or_else(|| components(value).map(PinValue::Vec4)),
        Value::Null | Value::Object(_) => None,
    }
}

/// Vector pins keep the leading components of a long array and fall back to
/// zero for anything else
fn vector_fallback(value: &Value, pin_type: PinType) -> Option<PinValue> {
    let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
    match pin_type {
        PinType::Vec2 => Some(PinValue::Vec2(leading_components(items).unwrap_or([0.0; 2]))),
        PinType::Vec3 => Some(PinValue::Vec3(leading_components(items).unwrap_or([0.0; 3]))),
        PinType::Vec4 | PinType::Color => Some(PinValue::Vec4(leading_components(items).unwrap_or([0.0; 4]))),
        _ => None,
    }
}

fn as_i32(value: &Value) -> Option<i32> {
    value.as_i64().and_then(|v| i32::try_from(v).ok())
}

/// An array of exactly `N` numbers
fn components<const N: usize>(value: &Value) -> Option<[f32; N]> {
    let items = value.as_array()?;
    if items.len() != N {
        return None;
    }
    leading_components(items)
}

fn leading_components<const N: usize>(items: &[Value]) -> Option<[f32; N]> {
    if items.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item.as_f64()? as f32;
    }
    Some(out)
}

/// Error while reading or writing a graph document
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// Malformed or mis-shaped JSON
    #[error("Invalid graph JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// No integer `version` field
    #[error("Graph document has no version")]
    MissingVersion,

    /// Unsupported format version
    #[error("Graph format version {found} is not supported (expected {expected})")]
    VersionMismatch {
        /// Version found in the document
        found: i64,
        /// Version this build reads
        expected: i64,
    },

    /// Pin type ordinal out of range
    #[error("Unknown pin type ordinal {0}")]
    UnknownPinType(i64),

    /// Node, pin or link ID above [`MAX_DOCUMENT_ID`]
    #[error("ID {0} is out of range (at most {max})", max = MAX_DOCUMENT_ID)]
    IdOutOfRange(u32),

    /// The loaded IDs leave no room for new ones
    #[error(transparent)]
    Ids(#[from] IdsExhausted),

    /// Default value has no readable shape
    #[error("Value {value} is not a valid {pin_type}")]
    InvalidValue {
        /// Type of the pin holding the value
        pin_type: PinType,
        /// The offending JSON
        value: String,
    },

    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
