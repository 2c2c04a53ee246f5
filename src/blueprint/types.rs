// SPDX-License-Identifier: MIT

//! JSON schema types for blueprint documents
//!
//! Attribute maps are kept as raw JSON here; tagged/legacy decoding happens
//! in the codec so that type errors can name the offending attribute.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::engine::GENERIC_BUILDER;

/// File extension of blueprint documents
pub const BLUEPRINT_EXTENSION: &str = "bpt";

/// Top-level blueprint document
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BlueprintDefinition {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub notes: String,
    /// Builder type, resolved through the registry
    #[serde(rename = "type", default = "default_builder_type")]
    pub builder_type: String,
    /// Global attributes, `name -> [type, value]` (or a bare legacy value)
    #[serde(default)]
    pub attrs: Map<String, Value>,
    #[serde(default)]
    pub blocks: Vec<BlockDefinition>,
}

/// One block entry of a blueprint
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BlockDefinition {
    /// Block type, resolved through the registry
    #[serde(rename = "type")]
    pub block_type: String,
    /// Missing or empty in older files; the block then keeps a generated name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub notes: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub breakpoint: bool,
    #[serde(default)]
    pub attrs: Map<String, Value>,
}

fn default_builder_type() -> String {
    GENERIC_BUILDER.to_string()
}

fn default_active() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl BlockDefinition {
    /// The name written in the document, if it is usable
    pub fn explicit_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}
