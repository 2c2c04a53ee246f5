// SPDX-License-Identifier: MIT

//! Attribute types and typed values
//!
//! Every block and builder attribute is stored as a [`TypedValue`]: a raw
//! JSON value tagged with the [`AttrType`] it was declared with. On disk a
//! typed value is the pair `["<TypeName>", <rawValue>]`. Older blueprints
//! stored bare values; their type is recovered with
//! [`guess_type_from_value`].

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use super::error::AttrError;

/// Ordered attribute map, insertion order is display and save order
pub type AttrMap = IndexMap<String, TypedValue>;

/// Closed set of attribute kinds understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrType {
    String,
    Int,
    Float,
    Bool,
    List,
    Dict,
    Script,
    Path,
    Chooser,
    Input,
    NamedObject,
}

impl AttrType {
    pub const ALL: [AttrType; 11] = [
        AttrType::String,
        AttrType::Int,
        AttrType::Float,
        AttrType::Bool,
        AttrType::List,
        AttrType::Dict,
        AttrType::Script,
        AttrType::Path,
        AttrType::Chooser,
        AttrType::Input,
        AttrType::NamedObject,
    ];

    /// Canonical name, used as the serialization tag
    pub fn name(self) -> &'static str {
        match self {
            AttrType::String => "String",
            AttrType::Int => "Int",
            AttrType::Float => "Float",
            AttrType::Bool => "Bool",
            AttrType::List => "List",
            AttrType::Dict => "Dict",
            AttrType::Script => "Script",
            AttrType::Path => "Path",
            AttrType::Chooser => "Chooser",
            AttrType::Input => "Input",
            AttrType::NamedObject => "NamedObject",
        }
    }

    /// Whether `value` has the native shape of this type
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            AttrType::String
            | AttrType::Script
            | AttrType::Path
            | AttrType::Chooser
            | AttrType::NamedObject => value.is_string(),
            AttrType::Int => value.is_i64() || value.is_u64(),
            AttrType::Float => value.is_number(),
            AttrType::Bool => value.is_boolean(),
            AttrType::List => value.is_array(),
            AttrType::Dict => value.is_object(),
            AttrType::Input => parse_input_ref(value).is_some(),
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static TYPES_BY_NAME: Lazy<HashMap<&'static str, AttrType>> =
    Lazy::new(|| AttrType::ALL.iter().map(|t| (t.name(), *t)).collect());

/// Exact lookup of an attribute type by its canonical name
pub fn type_from_name(name: &str) -> Result<AttrType, AttrError> {
    TYPES_BY_NAME
        .get(name)
        .copied()
        .ok_or_else(|| AttrError::UnknownType(name.to_string()))
}

/// Infer the type of an untagged legacy value.
///
/// Checked in order: string, boolean, integer, float, list, mapping.
pub fn guess_type_from_value(value: &Value) -> Result<AttrType, AttrError> {
    match value {
        Value::String(_) => Ok(AttrType::String),
        Value::Bool(_) => Ok(AttrType::Bool),
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(AttrType::Int),
        Value::Number(_) => Ok(AttrType::Float),
        Value::Array(_) => Ok(AttrType::List),
        Value::Object(_) => Ok(AttrType::Dict),
        Value::Null => Err(AttrError::Unguessable(value.to_string())),
    }
}

fn parse_input_ref(value: &Value) -> Option<(&str, &str)> {
    match value.as_array()?.as_slice() {
        [Value::String(block), Value::String(attr)] => Some((block.as_str(), attr.as_str())),
        _ => None,
    }
}

/// A raw value tagged with its attribute type
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub attr_type: AttrType,
    pub value: Value,
}

impl TypedValue {
    pub fn new(attr_type: AttrType, value: impl Into<Value>) -> Self {
        Self {
            attr_type,
            value: value.into(),
        }
    }

    /// Reference to attribute `attr` of block `block` in the same builder
    pub fn input(block: impl Into<String>, attr: impl Into<String>) -> Self {
        Self::new(
            AttrType::Input,
            Value::Array(vec![Value::String(block.into()), Value::String(attr.into())]),
        )
    }

    /// `(blockName, attrName)` if this is a well-formed Input reference
    pub fn input_ref(&self) -> Option<(&str, &str)> {
        if self.attr_type != AttrType::Input {
            return None;
        }
        parse_input_ref(&self.value)
    }

    /// Decode a persisted attribute entry.
    ///
    /// A two element array whose head is a string is a `[type, value]` pair.
    /// Anything else is a legacy bare value and gets its type guessed.
    pub fn decode(raw: Value) -> Result<Self, AttrError> {
        if let Value::Array(items) = &raw {
            if let [Value::String(tag), _] = items.as_slice() {
                let attr_type = type_from_name(tag)?;
                let value = items[1].clone();
                return Ok(Self { attr_type, value });
            }
        }

        let attr_type = guess_type_from_value(&raw)?;
        Ok(Self {
            attr_type,
            value: raw,
        })
    }

    /// Tagged `[type, value]` form
    pub fn encode(&self) -> Value {
        Value::Array(vec![
            Value::String(self.attr_type.name().to_string()),
            self.value.clone(),
        ])
    }
}

impl Serialize for TypedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(self.attr_type.name())?;
        tuple.serialize_element(&self.value)?;
        tuple.end()
    }
}
