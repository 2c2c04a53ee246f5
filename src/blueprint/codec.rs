// SPDX-License-Identifier: MIT

//! Conversion between in-memory builders and blueprint documents
//!
//! Writing always emits tagged `[type, value]` attributes. Reading accepts
//! tagged and legacy bare values, and fails on unknown type names instead of
//! skipping the entry.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

use super::types::{BlockDefinition, BlueprintDefinition};
use crate::engine::{
    AttrMap, Block, BlockRegistry, BlueprintError, BrickError, Builder, TypedValue,
};

/// Decode an attribute map, recovering types of legacy untagged values
pub fn decode_attrs(raw: &Map<String, Value>) -> Result<AttrMap, BlueprintError> {
    let mut attrs = AttrMap::with_capacity(raw.len());
    for (name, value) in raw {
        let typed = TypedValue::decode(value.clone())
            .map_err(|e| BlueprintError::invalid_attr(name.as_str(), e))?;
        if !typed.attr_type.accepts(&typed.value) {
            log::warn!(
                "Attribute {} is tagged {} but holds {}",
                name,
                typed.attr_type,
                typed.value
            );
        }
        attrs.insert(name.clone(), typed);
    }
    Ok(attrs)
}

pub fn encode_attrs(attrs: &AttrMap) -> Map<String, Value> {
    attrs
        .iter()
        .map(|(name, typed)| (name.clone(), typed.encode()))
        .collect()
}

impl Block {
    pub fn dump(&self) -> BlockDefinition {
        BlockDefinition {
            block_type: self.type_name().to_string(),
            name: Some(self.name().to_string()),
            notes: self.notes.clone(),
            active: self.active,
            breakpoint: self.breakpoint,
            attrs: encode_attrs(self.attrs()),
        }
    }

    /// Rebuild a block, resolving its concrete type through the registry
    pub fn load(def: &BlockDefinition, registry: &BlockRegistry) -> Result<Block, BlueprintError> {
        let behavior = registry.resolve_block_type(&def.block_type)?;
        let mut block = Block::new(behavior);
        if let Some(name) = def.explicit_name() {
            block.set_name(name);
        }
        block.notes = def.notes.clone();
        block.active = def.active;
        block.breakpoint = def.breakpoint;
        block.set_attrs(decode_attrs(&def.attrs)?);
        Ok(block)
    }
}

impl Builder {
    pub fn dump(&self) -> BlueprintDefinition {
        BlueprintDefinition {
            notes: self.notes.clone(),
            builder_type: self.type_name().to_string(),
            attrs: encode_attrs(self.attrs()),
            blocks: self.blocks().iter().map(Block::dump).collect(),
        }
    }

    /// Rebuild a builder and all of its blocks from a document
    pub fn load(
        def: &BlueprintDefinition,
        registry: &Arc<BlockRegistry>,
    ) -> Result<Builder, BlueprintError> {
        let builder_type = registry.resolve_builder_type(&def.builder_type)?;
        let mut builder = Builder::of_type(builder_type).with_registry(Arc::clone(registry));
        builder.notes = def.notes.clone();
        builder.set_attrs(decode_attrs(&def.attrs)?);

        let mut seen = HashSet::new();
        for block_def in &def.blocks {
            if let Some(name) = block_def.explicit_name() {
                if !seen.insert(name) {
                    return Err(BlueprintError::DuplicateBlockName(name.to_string()));
                }
            }
            builder.add_block(Block::load(block_def, registry)?);
        }

        log::debug!(
            "Loaded builder {} with {} blocks",
            builder.type_name(),
            builder.len()
        );
        Ok(builder)
    }
}

/// Pretty JSON with four space indentation
pub fn to_json_string(def: &BlueprintDefinition) -> Result<String, BrickError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    def.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| BrickError::other(e.to_string()))
}

pub fn from_json_str(content: &str) -> Result<BlueprintDefinition, BrickError> {
    Ok(serde_json::from_str(content)?)
}
