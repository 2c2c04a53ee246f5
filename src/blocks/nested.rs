// SPDX-License-Identifier: MIT

//! Nested blueprints
//!
//! A `BuilderBlock` loads another blueprint and runs it to completion as a
//! single step of the outer builder.

use serde_json::{Map, Value};
use std::cell::Cell;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use crate::blueprint::BlueprintLoader;
use crate::engine::{
    AttrMap, AttrType, BlockBehavior, BlockError, BuildStatus, ExecContext, TypedValue,
    GENERIC_BUILDER,
};

/// Deepest allowed chain of blueprints running blueprints
pub const MAX_NESTING: usize = 16;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Decrements the nesting depth when the nested run ends
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Result<Self, BlockError> {
        DEPTH.with(|depth| {
            if depth.get() >= MAX_NESTING {
                return Err(BlockError::Execution(format!(
                    "blueprints nested deeper than {}",
                    MAX_NESTING
                )));
            }
            depth.set(depth.get() + 1);
            Ok(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

pub struct BuilderBlock {
    blueprint_dir: Option<PathBuf>,
}

impl BuilderBlock {
    pub fn new(blueprint_dir: Option<PathBuf>) -> Self {
        Self { blueprint_dir }
    }
}

impl BlockBehavior for BuilderBlock {
    fn type_name(&self) -> &str {
        "BuilderBlock"
    }

    fn order(&self) -> u32 {
        20
    }

    fn default_attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert(
            "type".to_string(),
            TypedValue::new(AttrType::String, GENERIC_BUILDER),
        );
        attrs.insert("blueprint".to_string(), TypedValue::new(AttrType::Path, ""));
        attrs
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
        let registry = Arc::clone(ctx.registry()?);
        let blueprint = ctx.require_str("blueprint")?.to_string();
        if blueprint.trim().is_empty() {
            return Err(BlockError::Execution("no blueprint given".into()).into());
        }

        let mut loader = BlueprintLoader::new(registry);
        if let Some(dir) = &self.blueprint_dir {
            loader = loader.with_blueprint_dir(dir);
        }

        let _guard = DepthGuard::enter()?;
        let mut nested = loader.load_blueprint(&blueprint)?;

        if let Some(expected) = ctx.attr("type").and_then(Value::as_str) {
            if !expected.is_empty() && expected != nested.type_name() {
                log::warn!(
                    "{}: blueprint {} is a {}, expected {}",
                    ctx.block_name(),
                    blueprint,
                    nested.type_name(),
                    expected
                );
            }
        }

        // Breakpoints inside a nested blueprint do not pause the outer run
        let status = loop {
            match nested.run_to_completion() {
                BuildStatus::Next => continue,
                other => break other,
            }
        };

        if status == BuildStatus::Fail || nested.has_failures() {
            return Err(BlockError::Execution(
                "error in one or more building blocks.".into(),
            )
            .into());
        }

        let results: Map<String, Value> = nested
            .blocks()
            .iter()
            .map(|b| (b.name().to_string(), b.read_attr("results").unwrap_or(Value::Null)))
            .collect();
        ctx.set_output("blocks", Value::from(nested.len()));
        ctx.set_results(Value::Object(results));
        Ok(())
    }
}
