// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pin definitions, pin values and the type compatibility relation.

use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::fmt;

/// Unique identifier for a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PinId(pub u32);

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinDirection {
    /// Input pin
    Input,
    /// Output pin
    Output,
}

/// Data type that can flow through pins.
///
/// The discriminants are the ordinals written to disk, so variants must
/// never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PinType {
    /// Execution flow
    Flow = 0,
    /// Boolean value
    Bool = 1,
    /// Integer value
    Int = 2,
    /// Floating point value
    Float = 3,
    /// 2D vector
    Vec2 = 4,
    /// 3D vector
    Vec3 = 5,
    /// 4D vector
    Vec4 = 6,
    /// Color (RGBA), stored as a 4D vector
    Color = 7,
    /// String value
    String = 8,
    /// Texture handle, stored as an integer
    Texture = 9,
    /// Any type (for generic nodes)
    Any = 10,
}

impl PinType {
    /// Every pin type, in ordinal order
    pub const ALL: [PinType; 11] = [
        Self::Flow,
        Self::Bool,
        Self::Int,
        Self::Float,
        Self::Vec2,
        Self::Vec3,
        Self::Vec4,
        Self::Color,
        Self::String,
        Self::Texture,
        Self::Any,
    ];

    /// Ordinal used by the persisted format
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Look up a pin type by its persisted ordinal
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Flow => "Flow",
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Vec2 => "Vec2",
            Self::Vec3 => "Vec3",
            Self::Vec4 => "Vec4",
            Self::Color => "Color",
            Self::String => "String",
            Self::Texture => "Texture",
            Self::Any => "Any",
        }
    }

    /// Check if a value of this type may flow into a pin of type `other`.
    ///
    /// The relation is directed: `Float -> Vec3` is allowed, `Vec3 -> Float`
    /// is not. Rules are checked in order and the first match wins.
    pub fn can_connect_to(self, other: PinType) -> bool {
        if self == other {
            return true;
        }

        // Flow only pairs with Flow, even through Any
        if self == Self::Flow || other == Self::Flow {
            return false;
        }

        if self == Self::Any || other == Self::Any {
            return true;
        }

        matches!(
            (self, other),
            (Self::Color, Self::Vec4)
                | (Self::Vec4, Self::Color)
                // Scalar splat
                | (Self::Float, Self::Vec2 | Self::Vec3 | Self::Vec4 | Self::Color)
                | (Self::Vec2, Self::Vec3 | Self::Vec4)
                | (Self::Vec3, Self::Vec4)
                | (Self::Int, Self::Float)
                | (Self::Bool, Self::Int)
        )
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value that can be stored in a pin or produced by an evaluator
#[derive(Debug, Clone, PartialEq)]
pub enum PinValue {
    /// Boolean
    Bool(bool),
    /// Integer (also used for texture handles)
    Int(i32),
    /// Float
    Float(f32),
    /// 2D vector
    Vec2([f32; 2]),
    /// 3D vector
    Vec3([f32; 3]),
    /// 4D vector or color
    Vec4([f32; 4]),
    /// String
    String(String),
}

impl PinValue {
    /// Get the natural pin type for this value
    pub fn pin_type(&self) -> PinType {
        match self {
            Self::Bool(_) => PinType::Bool,
            Self::Int(_) => PinType::Int,
            Self::Float(_) => PinType::Float,
            Self::Vec2(_) => PinType::Vec2,
            Self::Vec3(_) => PinType::Vec3,
            Self::Vec4(_) => PinType::Vec4,
            Self::String(_) => PinType::String,
        }
    }

    /// Zero value stored in a fresh pin of the given type
    pub fn default_for(pin_type: PinType) -> Self {
        match pin_type {
            PinType::Bool => Self::Bool(false),
            PinType::Int | PinType::Texture => Self::Int(0),
            PinType::Vec2 => Self::Vec2([0.0; 2]),
            PinType::Vec3 => Self::Vec3([0.0; 3]),
            PinType::Vec4 | PinType::Color => Self::Vec4([0.0; 4]),
            PinType::String => Self::String(String::new()),
            PinType::Flow | PinType::Float | PinType::Any => Self::Float(0.0),
        }
    }

    /// Get the value as a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an integer
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a float
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a 2D vector
    pub fn as_vec2(&self) -> Option<[f32; 2]> {
        match self {
            Self::Vec2(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a 3D vector
    pub fn as_vec3(&self) -> Option<[f32; 3]> {
        match self {
            Self::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a 4D vector
    pub fn as_vec4(&self) -> Option<[f32; 4]> {
        match self {
            Self::Vec4(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for PinValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PinValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for PinValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<[f32; 2]> for PinValue {
    fn from(value: [f32; 2]) -> Self {
        Self::Vec2(value)
    }
}

impl From<[f32; 3]> for PinValue {
    fn from(value: [f32; 3]) -> Self {
        Self::Vec3(value)
    }
}

impl From<[f32; 4]> for PinValue {
    fn from(value: [f32; 4]) -> Self {
        Self::Vec4(value)
    }
}

impl From<&str> for PinValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for PinValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

// Written untagged: the owning pin's type tells the reader how to decode it.
impl Serialize for PinValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        fn components<S: Serializer>(serializer: S, values: &[f32]) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(values.len()))?;
            for value in values {
                seq.serialize_element(value)?;
            }
            seq.end()
        }

        match self {
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i32(*v),
            Self::Float(v) => serializer.serialize_f32(*v),
            Self::Vec2(v) => components(serializer, v),
            Self::Vec3(v) => components(serializer, v),
            Self::Vec4(v) => components(serializer, v),
            Self::String(v) => serializer.serialize_str(v),
        }
    }
}

/// A typed connection point on a node
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    /// Graph-unique pin ID
    pub id: PinId,
    /// Pin name
    pub name: String,
    /// Data type
    pub pin_type: PinType,
    /// Pin direction
    pub direction: PinDirection,
    /// Value used when an input has no incoming link
    pub default_value: PinValue,
}

impl Pin {
    /// Create a new pin holding the zero value of its type
    pub fn new(
        id: PinId,
        name: impl Into<String>,
        pin_type: PinType,
        direction: PinDirection,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            pin_type,
            direction,
            default_value: PinValue::default_for(pin_type),
        }
    }

    /// Create a new input pin
    pub fn input(id: PinId, name: impl Into<String>, pin_type: PinType) -> Self {
        Self::new(id, name, pin_type, PinDirection::Input)
    }

    /// Create a new output pin
    pub fn output(id: PinId, name: impl Into<String>, pin_type: PinType) -> Self {
        Self::new(id, name, pin_type, PinDirection::Output)
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<PinValue>) -> Self {
        self.default_value = value.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(from: PinType, to: PinType) -> bool {
        use PinType::*;
        if from == to {
            return true;
        }
        if from == Flow || to == Flow {
            return false;
        }
        if from == Any || to == Any {
            return true;
        }
        matches!(
            (from, to),
            (Color, Vec4)
                | (Vec4, Color)
                | (Float, Vec2)
                | (Float, Vec3)
                | (Float, Vec4)
                | (Float, Color)
                | (Vec2, Vec3)
                | (Vec2, Vec4)
                | (Vec3, Vec4)
                | (Int, Float)
                | (Bool, Int)
        )
    }

    #[test]
    fn test_compatibility_table() {
        let mut allowed = 0;
        for from in PinType::ALL {
            for to in PinType::ALL {
                assert_eq!(
                    from.can_connect_to(to),
                    expected(from, to),
                    "{from} -> {to}"
                );
                if from.can_connect_to(to) {
                    allowed += 1;
                }
            }
        }
        // identities, pairs through Any, promotions
        assert_eq!(allowed, 11 + 18 + 11);
    }

    #[test]
    fn test_compatibility_is_directed() {
        assert!(PinType::Float.can_connect_to(PinType::Vec3));
        assert!(!PinType::Vec3.can_connect_to(PinType::Float));
        assert!(PinType::Int.can_connect_to(PinType::Float));
        assert!(!PinType::Float.can_connect_to(PinType::Int));
        assert!(PinType::Bool.can_connect_to(PinType::Int));
        assert!(!PinType::Int.can_connect_to(PinType::Bool));
        assert!(!PinType::Bool.can_connect_to(PinType::Float));
    }

    #[test]
    fn test_flow_never_meets_any() {
        assert!(PinType::Flow.can_connect_to(PinType::Flow));
        assert!(!PinType::Any.can_connect_to(PinType::Flow));
        assert!(!PinType::Flow.can_connect_to(PinType::Any));
        assert!(PinType::Any.can_connect_to(PinType::Texture));
        assert!(PinType::String.can_connect_to(PinType::Any));
    }

    #[test]
    fn test_ordinals() {
        for (index, pin_type) in PinType::ALL.iter().enumerate() {
            assert_eq!(usize::from(pin_type.ordinal()), index);
            assert_eq!(PinType::from_ordinal(index as i64), Some(*pin_type));
        }
        assert_eq!(PinType::Float.ordinal(), 3);
        assert_eq!(PinType::from_ordinal(11), None);
        assert_eq!(PinType::from_ordinal(-1), None);
    }

    #[test]
    fn test_default_values_match_type() {
        assert_eq!(PinValue::default_for(PinType::Color), PinValue::Vec4([0.0; 4]));
        assert_eq!(PinValue::default_for(PinType::Texture), PinValue::Int(0));
        assert_eq!(PinValue::default_for(PinType::Vec3).pin_type(), PinType::Vec3);
    }

    #[test]
    fn test_value_serializes_bare() {
        let json = serde_json::to_string(&PinValue::Vec3([1.0, 2.5, 3.0])).unwrap();
        assert_eq!(json, "[1.0,2.5,3.0]");
        let json = serde_json::to_string(&PinValue::Float(3.14)).unwrap();
        assert_eq!(json, "3.14");
        let json = serde_json::to_string(&PinValue::from("tex")).unwrap();
        assert_eq!(json, "\"tex\"");
    }
}
