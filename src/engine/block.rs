// SPDX-License-Identifier: MIT

//! Blocks: single executable steps of a builder
//!
//! A [`Block`] owns its declared attributes and run-time state. What it
//! actually does is delegated to a [`BlockBehavior`], shared by every
//! block of the same type and looked up through the registry.

use indexmap::IndexMap;
use serde_json::Value;
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::attr::{AttrMap, AttrType, TypedValue};
use super::error::BlockError;
use super::registry::BlockRegistry;
use super::status::BuildStatus;

/// Grouping used when listing block types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockCategory {
    Generic,
    Helper,
    Custom,
}

impl BlockCategory {
    /// Sort key of the category in block listings
    pub fn order(self) -> u32 {
        match self {
            BlockCategory::Generic => 100,
            BlockCategory::Helper => 400,
            BlockCategory::Custom => 500,
        }
    }
}

impl fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BlockCategory::Generic => "Generic",
            BlockCategory::Helper => "Helper",
            BlockCategory::Custom => "Custom",
        };
        f.write_str(s)
    }
}

/// Execution strategy of a block type.
///
/// Implementations read resolved attributes from the context and may set
/// `results` or named outputs. Any error (or panic) marks the block failed.
pub trait BlockBehavior: Send + Sync {
    /// Registry key, also written as the block `type` in blueprints
    fn type_name(&self) -> &str;

    fn category(&self) -> BlockCategory {
        BlockCategory::Generic
    }

    /// Position inside its category when listed
    fn order(&self) -> u32 {
        0
    }

    /// Attributes a freshly created block starts with
    fn default_attrs(&self) -> AttrMap {
        AttrMap::new()
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Name based lookup of sibling blocks, used to resolve Input references
pub trait BlockLookup {
    fn find_block(&self, name: &str) -> Option<&Block>;
}

impl BlockLookup for Vec<Block> {
    fn find_block(&self, name: &str) -> Option<&Block> {
        self.iter().find(|b| b.name() == name)
    }
}

/// Everything outside the block that its execution may read
pub struct ExecScope<'a> {
    pub globals: &'a AttrMap,
    pub peers: &'a dyn BlockLookup,
    pub registry: Option<&'a Arc<BlockRegistry>>,
}

impl<'a> ExecScope<'a> {
    pub fn new(globals: &'a AttrMap, peers: &'a dyn BlockLookup) -> Self {
        Self {
            globals,
            peers,
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: Option<&'a Arc<BlockRegistry>>) -> Self {
        self.registry = registry;
        self
    }
}

/// View handed to a [`BlockBehavior`] while it runs
pub struct ExecContext<'a> {
    block_name: &'a str,
    attrs: &'a IndexMap<String, Value>,
    registry: Option<&'a Arc<BlockRegistry>>,
    results: Option<Value>,
    outputs: IndexMap<String, Value>,
}

impl<'a> ExecContext<'a> {
    pub fn new(
        block_name: &'a str,
        attrs: &'a IndexMap<String, Value>,
        registry: Option<&'a Arc<BlockRegistry>>,
    ) -> Self {
        Self {
            block_name,
            attrs,
            registry,
            results: None,
            outputs: IndexMap::new(),
        }
    }

    pub fn block_name(&self) -> &str {
        self.block_name
    }

    /// All resolved run-time attributes
    pub fn attrs(&self) -> &IndexMap<String, Value> {
        self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Value, BlockError> {
        self.attr(name)
            .ok_or_else(|| BlockError::MissingAttr(name.to_string()))
    }

    pub fn require_str(&self, name: &str) -> Result<&str, BlockError> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| BlockError::Execution(format!("attribute '{}' is not a string", name)))
    }

    pub fn registry(&self) -> Result<&Arc<BlockRegistry>, BlockError> {
        self.registry
            .ok_or_else(|| BlockError::NoRegistry(self.block_name.to_string()))
    }

    pub fn set_results(&mut self, value: Value) {
        self.results = Some(value);
    }

    /// Publish a named value other blocks can reference
    pub fn set_output(&mut self, name: impl Into<String>, value: Value) {
        self.outputs.insert(name.into(), value);
    }

    fn into_parts(self) -> (Option<Value>, IndexMap<String, Value>) {
        (self.results, self.outputs)
    }
}

/// One executable step with typed attributes and a build status
#[derive(Clone)]
pub struct Block {
    name: String,
    pub notes: String,
    pub active: bool,
    pub breakpoint: bool,
    attrs: AttrMap,
    runtime_attrs: IndexMap<String, Value>,
    results: Option<Value>,
    outputs: IndexMap<String, Value>,
    status: BuildStatus,
    log: String,
    behavior: Arc<dyn BlockBehavior>,
}

impl Block {
    /// Fresh block with the behaviour's default attributes and a generated name
    pub fn new(behavior: Arc<dyn BlockBehavior>) -> Self {
        let name = format!("{}_{}", behavior.type_name(), Uuid::new_v4());
        let attrs = behavior.default_attrs();
        Self {
            name,
            notes: String::new(),
            active: true,
            breakpoint: false,
            attrs,
            runtime_attrs: IndexMap::new(),
            results: None,
            outputs: IndexMap::new(),
            status: BuildStatus::Nothing,
            log: String::new(),
            behavior,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn type_name(&self) -> &str {
        self.behavior.type_name()
    }

    pub fn category(&self) -> BlockCategory {
        self.behavior.category()
    }

    pub fn status(&self) -> BuildStatus {
        self.status
    }

    pub fn log(&self) -> &str {
        &self.log
    }

    pub fn results(&self) -> Option<&Value> {
        self.results.as_ref()
    }

    pub fn outputs(&self) -> &IndexMap<String, Value> {
        &self.outputs
    }

    pub fn attrs(&self) -> &AttrMap {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&TypedValue> {
        self.attrs.get(name)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: TypedValue) {
        self.attrs.insert(name.into(), value);
    }

    /// Replace the whole attribute map (used when restoring from a blueprint)
    pub fn set_attrs(&mut self, attrs: AttrMap) {
        self.attrs = attrs;
    }

    /// Update attributes the block already declares, ignoring unknown keys.
    /// Returns how many were updated.
    pub fn reload(&mut self, attrs: AttrMap) -> usize {
        let mut updated = 0;
        for (name, value) in attrs {
            if let Some(slot) = self.attrs.get_mut(&name) {
                *slot = value;
                updated += 1;
            }
        }
        updated
    }

    pub fn runtime_attrs(&self) -> &IndexMap<String, Value> {
        &self.runtime_attrs
    }

    /// Read an attribute another block references through an Input
    pub fn read_attr(&self, attr: &str) -> Option<Value> {
        match attr {
            "results" => Some(self.results.clone().unwrap_or(Value::Null)),
            "name" => Some(Value::String(self.name.clone())),
            "notes" => Some(Value::String(self.notes.clone())),
            "active" => Some(Value::Bool(self.active)),
            other => self.outputs.get(other).cloned(),
        }
    }

    /// Run the block. Never returns an error: failures end up in the
    /// status and the block log.
    pub fn execute(&mut self, scope: &ExecScope<'_>) -> BuildStatus {
        self.runtime_attrs.clear();
        self.results = None;
        self.outputs.clear();
        self.log.clear();

        log::debug!("{}: start running...", self.name);
        self.log.push_str(&format!("{}: start running...\n", self.name));
        let started = Instant::now();

        match self.run(scope) {
            Ok(()) => {
                let secs = started.elapsed().as_secs_f64();
                log::info!("{}: finished in {:.2} s", self.name, secs);
                self.log
                    .push_str(&format!("{}: finished in {:.2} s\n", self.name, secs));
                self.status = BuildStatus::Success;
            }
            Err(e) => {
                log::error!("{}: failed: {}", self.name, e);
                self.log.push_str(&format!("{}: failed: {}\n", self.name, e));
                self.status = BuildStatus::Fail;
            }
        }

        self.status
    }

    fn run(&mut self, scope: &ExecScope<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
        for (key, typed) in scope.globals {
            self.runtime_attrs.insert(key.clone(), typed.value.clone());
        }
        self.ingest_inputs(scope.peers)?;
        self.ingest_attrs();

        let behavior = Arc::clone(&self.behavior);
        let mut ctx = ExecContext::new(&self.name, &self.runtime_attrs, scope.registry);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| behavior.execute(&mut ctx)));
        let (results, outputs) = ctx.into_parts();
        self.results = results;
        self.outputs = outputs;

        match outcome {
            Ok(res) => res,
            Err(payload) => Err(BlockError::Execution(panic_message(payload.as_ref())).into()),
        }
    }

    fn ingest_inputs(&mut self, peers: &dyn BlockLookup) -> Result<(), BlockError> {
        for (attr_name, typed) in &self.attrs {
            if typed.attr_type != AttrType::Input {
                continue;
            }

            let (block_name, attr) = typed
                .input_ref()
                .ok_or_else(|| BlockError::MalformedInput(attr_name.clone()))?;

            let source = peers
                .find_block(block_name)
                .ok_or_else(|| BlockError::BlockNotFound(block_name.to_string()))?;

            let value = source
                .read_attr(attr)
                .ok_or_else(|| BlockError::AttrNotFound {
                    block: source.name().to_string(),
                    attr: attr.to_string(),
                })?;

            self.runtime_attrs.insert(attr_name.clone(), value);
        }
        Ok(())
    }

    fn ingest_attrs(&mut self) {
        for (key, typed) in &self.attrs {
            // Input attrs are resolved by ingest_inputs
            if typed.attr_type == AttrType::Input {
                continue;
            }
            self.runtime_attrs.insert(key.clone(), typed.value.clone());
        }
    }

    /// Back to `nothing`, dropping run-time attributes and the log.
    /// Declared attributes are kept.
    pub fn reset(&mut self) {
        self.status = BuildStatus::Nothing;
        self.runtime_attrs.clear();
        self.log.clear();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Block {}

impl Hash for Block {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("name", &self.name)
            .field("type", &self.type_name())
            .field("active", &self.active)
            .field("breakpoint", &self.breakpoint)
            .field("status", &self.status)
            .field("attrs", &self.attrs)
            .finish()
    }
}
