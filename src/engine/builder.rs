// SPDX-License-Identifier: MIT

//! Builder - ordered blocks plus an execution cursor
//!
//! Blocks run strictly one at a time, in sequence order. `advance` is the
//! single unit of progress; `run_to_completion` just loops it.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::attr::{AttrMap, TypedValue};
use super::block::{Block, BlockLookup, ExecScope};
use super::error::{BlockError, BrickError};
use super::registry::{BlockRegistry, BuilderType, GENERIC_BUILDER};
use super::status::BuildStatus;

/// Every block of the builder as seen by the one being executed.
/// `current` is that block's state from before this run.
struct Peers<'a> {
    before: &'a [Block],
    current: &'a Block,
    after: &'a [Block],
}

impl BlockLookup for Peers<'_> {
    fn find_block(&self, name: &str) -> Option<&Block> {
        self.before
            .iter()
            .chain(self.after.iter())
            .find(|b| b.name() == name)
            .or_else(|| (self.current.name() == name).then_some(self.current))
    }
}

/// Where a builder-level result is read from once its block has run
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBinding {
    pub block: String,
    pub attr: String,
}

pub struct Builder {
    name: String,
    type_name: String,
    pub notes: String,
    attrs: AttrMap,
    blocks: Vec<Block>,
    next_step: usize,
    paused_at: Option<usize>,
    bindings: IndexMap<String, ResultBinding>,
    results: IndexMap<String, Value>,
    registry: Option<Arc<BlockRegistry>>,
}

impl Builder {
    /// Empty `GenericBuilder`
    pub fn new() -> Self {
        Self::with_type(GENERIC_BUILDER, AttrMap::new())
    }

    /// Empty builder of a registered type, starting with its fixed attributes
    pub fn of_type(builder_type: &BuilderType) -> Self {
        Self::with_type(&builder_type.name, builder_type.fixed_attrs.clone())
    }

    fn with_type(type_name: &str, attrs: AttrMap) -> Self {
        Self {
            name: format!("{}_{}", type_name, Uuid::new_v4()),
            type_name: type_name.to_string(),
            notes: String::new(),
            attrs,
            blocks: Vec::new(),
            next_step: 0,
            paused_at: None,
            bindings: IndexMap::new(),
            results: IndexMap::new(),
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<BlockRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn registry(&self) -> Option<&Arc<BlockRegistry>> {
        self.registry.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    // --- Global attributes ---

    pub fn attrs(&self) -> &AttrMap {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&TypedValue> {
        self.attrs.get(name)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: TypedValue) {
        self.attrs.insert(name.into(), value);
    }

    pub fn set_attrs(&mut self, attrs: AttrMap) {
        self.attrs = attrs;
    }

    // --- Blocks ---

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name() == name)
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|b| b.name() == name)
    }

    /// Insert at `index`, or append when `None` or past the end.
    /// Name uniqueness is the caller's job, see [`Builder::next_unique_name`].
    pub fn insert_block(&mut self, block: Block, index: Option<usize>) {
        let index = index
            .filter(|i| *i <= self.blocks.len())
            .unwrap_or(self.blocks.len());
        log::debug!("Inserting block {} at {}", block.name(), index);
        self.blocks.insert(index, block);
        self.paused_at = None;
    }

    pub fn add_block(&mut self, block: Block) {
        self.insert_block(block, None);
    }

    /// New block of a registered type named `{typeName}{N}`, not yet inserted
    pub fn create_block(&self, type_name: &str) -> Result<Block, BrickError> {
        let registry = self
            .registry
            .as_ref()
            .ok_or_else(|| BlockError::NoRegistry(self.name.clone()))?;
        let block = registry.create_block(type_name)?;
        Ok(block.with_name(self.next_unique_name(Some(type_name))))
    }

    /// First `{base}{N}` (N = 1, 2, ...) no block is named yet
    pub fn next_unique_name(&self, base: Option<&str>) -> String {
        let base = base.unwrap_or("block");
        (1..)
            .map(|i| format!("{}{}", base, i))
            .find(|candidate| self.block(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    pub fn remove_block(&mut self, name: &str) -> Option<Block> {
        let index = self.blocks.iter().position(|b| b.name() == name)?;
        let removed = self.blocks.remove(index);
        self.next_step = self.next_step.min(self.blocks.len());
        self.paused_at = None;
        Some(removed)
    }

    /// Rebuild the sequence from block names. Names without a block are
    /// skipped, and blocks missing from `order` are dropped.
    pub fn reorder<I, S>(&mut self, order: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_name: HashMap<String, Block> = self
            .blocks
            .drain(..)
            .map(|b| (b.name().to_string(), b))
            .collect();

        for name in order {
            match by_name.remove(name.as_ref()) {
                Some(block) => self.blocks.push(block),
                None => log::debug!("reorder: no block named {}", name.as_ref()),
            }
        }

        for name in by_name.keys() {
            log::warn!("reorder: dropping block {} missing from the new order", name);
        }

        self.next_step = self.next_step.min(self.blocks.len());
        self.paused_at = None;
    }

    // --- Results ---

    /// After block `block` runs, store its attribute `attr` as result `key`
    pub fn bind_result(
        &mut self,
        key: impl Into<String>,
        block: impl Into<String>,
        attr: impl Into<String>,
    ) {
        self.bindings.insert(
            key.into(),
            ResultBinding {
                block: block.into(),
                attr: attr.into(),
            },
        );
    }

    pub fn bindings(&self) -> &IndexMap<String, ResultBinding> {
        &self.bindings
    }

    pub fn results(&self) -> &IndexMap<String, Value> {
        &self.results
    }

    pub fn has_failures(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| b.status() == BuildStatus::Fail)
    }

    // --- Cursor ---

    pub fn next_step(&self) -> usize {
        self.next_step
    }

    /// Move the cursor, clamped to `0..=len`
    pub fn set_next_step(&mut self, index: usize) {
        self.next_step = index.min(self.blocks.len());
    }

    pub fn step_back(&mut self) {
        self.next_step = self.next_step.saturating_sub(1);
    }

    pub fn step_forward(&mut self) {
        if self.next_step < self.blocks.len() {
            self.next_step += 1;
        }
    }

    /// Status to display for the block at `index`: `Next` under the cursor,
    /// otherwise the block's own status
    pub fn indicator(&self, index: usize) -> BuildStatus {
        match self.blocks.get(index) {
            Some(_) if index == self.next_step => BuildStatus::Next,
            Some(block) => block.status(),
            None => BuildStatus::Nothing,
        }
    }

    /// Run the next eligible block.
    ///
    /// Inactive blocks are skipped. A breakpoint block pauses the builder
    /// once (reported as `Next`); the following call runs it. On failure the
    /// cursor stays on the failed block so it can be retried in place.
    pub fn advance(&mut self) -> BuildStatus {
        loop {
            let Some(block) = self.blocks.get(self.next_step) else {
                self.paused_at = None;
                return BuildStatus::End;
            };

            if !block.active {
                log::debug!("{}: inactive, skipped", block.name());
                self.next_step += 1;
                continue;
            }

            if block.breakpoint && self.paused_at != Some(self.next_step) {
                log::warn!("{}: breakpoint reached, pausing", block.name());
                self.paused_at = Some(self.next_step);
                return BuildStatus::Next;
            }

            break;
        }

        let index = self.next_step;
        self.next_step += 1;
        self.paused_at = None;

        let status = self.execute_at(index);
        if status == BuildStatus::Fail {
            self.next_step = index;
            // Retrying a failed breakpoint block must not pause again
            self.paused_at = Some(index);
        }
        status
    }

    /// Advance until a step fails, the end is reached, or a breakpoint pauses
    pub fn run_to_completion(&mut self) -> BuildStatus {
        loop {
            let status = self.advance();
            if status.halts() {
                return status;
            }
        }
    }

    /// Cursor back to the start, every block back to `nothing`
    pub fn rewind(&mut self) {
        self.next_step = 0;
        self.paused_at = None;
        self.results.clear();
        for block in &mut self.blocks {
            block.reset();
        }
    }

    fn execute_at(&mut self, index: usize) -> BuildStatus {
        let Some(current) = self.blocks.get(index).cloned() else {
            return BuildStatus::End;
        };
        let (before, rest) = self.blocks.split_at_mut(index);
        let Some((block, after)) = rest.split_first_mut() else {
            return BuildStatus::End;
        };

        let peers = Peers {
            before: &*before,
            current: &current,
            after: &*after,
        };
        let scope = ExecScope::new(&self.attrs, &peers).with_registry(self.registry.as_ref());
        let status = block.execute(&scope);

        let block = &self.blocks[index];
        for (key, binding) in &self.bindings {
            if binding.block != block.name() {
                continue;
            }
            match block.read_attr(&binding.attr) {
                Some(value) => {
                    self.results.insert(key.clone(), value);
                }
                None => log::warn!(
                    "result {}: block {} has no attribute {}",
                    key,
                    block.name(),
                    binding.attr
                ),
            }
        }

        status
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("next_step", &self.next_step)
            .field("attrs", &self.attrs)
            .field("blocks", &self.blocks)
            .finish()
    }
}
