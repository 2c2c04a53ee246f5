//! Integration tests for blueprint loading and step execution
//!
//! These tests drive builders end to end through the public API using mock
//! block behaviors.

use brick_rs::blocks::{register_builtins, ValueBlock};
use brick_rs::blueprint::BlueprintLoader;
use brick_rs::config::Config;
use brick_rs::engine::{
    AttrMap, AttrType, Block, BlockBehavior, BlockRegistry, BlueprintError, BrickError,
    BuildStatus, Builder, ExecContext, TypedValue,
};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::error::Error;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Mock Components
// ============================================================================

/// Publishes its `value` attribute as results
struct Emit;

impl BlockBehavior for Emit {
    fn type_name(&self) -> &str {
        "Emit"
    }

    fn default_attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert("value".to_string(), TypedValue::new(AttrType::Int, 0));
        attrs
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
        let value = ctx.require("value")?.clone();
        ctx.set_results(value);
        Ok(())
    }
}

/// Fails while its `fail` attribute is true
struct Flaky;

impl BlockBehavior for Flaky {
    fn type_name(&self) -> &str {
        "Flaky"
    }

    fn default_attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert("fail".to_string(), TypedValue::new(AttrType::Bool, true));
        attrs
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
        if ctx.attr("fail") == Some(&Value::Bool(true)) {
            return Err("asked to fail".into());
        }
        Ok(())
    }
}

/// Counts how many times any instance ran
struct Counting {
    runs: Arc<AtomicUsize>,
}

impl BlockBehavior for Counting {
    fn type_name(&self) -> &str {
        "Counting"
    }

    fn execute(&self, _ctx: &mut ExecContext<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

static REGISTRY: Lazy<Arc<BlockRegistry>> = Lazy::new(|| {
    let mut registry = BlockRegistry::new();
    registry.register(Arc::new(Emit));
    registry.register(Arc::new(Flaky));
    registry.register(Arc::new(ValueBlock));
    Arc::new(registry)
});

fn builder() -> Builder {
    Builder::new().with_registry(Arc::clone(&REGISTRY))
}

fn named(builder: &Builder, type_name: &str, name: &str) -> Block {
    let mut block = builder.create_block(type_name).unwrap();
    block.set_name(name);
    block
}

fn statuses(builder: &Builder) -> Vec<BuildStatus> {
    builder.blocks().iter().map(|b| b.status()).collect()
}

// ============================================================================
// Execution
// ============================================================================

#[test]
fn test_run_skips_inactive_block() {
    let mut builder = builder();
    for name in ["A", "B", "C"] {
        let block = named(&builder, "Emit", name);
        builder.add_block(block);
    }
    builder.block_mut("B").unwrap().active = false;

    assert_eq!(builder.run_to_completion(), BuildStatus::End);
    assert_eq!(builder.next_step(), 3);
    assert_eq!(
        statuses(&builder),
        vec![BuildStatus::Success, BuildStatus::Nothing, BuildStatus::Success]
    );
}

#[test]
fn test_input_reads_results_of_earlier_block() {
    let mut builder = builder();
    let mut a = named(&builder, "Emit", "A");
    a.set_attr("value", TypedValue::new(AttrType::Int, 42));
    builder.add_block(a);

    let mut d = named(&builder, "Emit", "D");
    d.set_attr("x", TypedValue::input("A", "results"));
    d.set_attr("value", TypedValue::input("A", "results"));
    builder.add_block(d);

    assert_eq!(builder.run_to_completion(), BuildStatus::End);
    let d = builder.block("D").unwrap();
    assert_eq!(d.runtime_attrs().get("x"), Some(&json!(42)));
    assert_eq!(d.results(), Some(&json!(42)));
}

#[test]
fn test_input_to_unknown_block_fails() {
    let mut builder = builder();
    let mut d = named(&builder, "Emit", "D");
    d.set_attr("value", TypedValue::input("ghost", "results"));
    builder.add_block(d);

    assert_eq!(builder.advance(), BuildStatus::Fail);
    assert!(builder.blocks()[0]
        .log()
        .contains("cannot find input block name: ghost"));
}

#[test]
fn test_failed_block_can_be_fixed_and_retried() {
    let mut builder = builder();
    let first = named(&builder, "Emit", "first");
    builder.add_block(first);
    let flaky = named(&builder, "Flaky", "flaky");
    builder.add_block(flaky);

    assert_eq!(builder.run_to_completion(), BuildStatus::Fail);
    assert_eq!(builder.next_step(), 1);
    assert!(builder.has_failures());

    builder
        .block_mut("flaky")
        .unwrap()
        .set_attr("fail", TypedValue::new(AttrType::Bool, false));
    assert_eq!(builder.run_to_completion(), BuildStatus::End);
    assert_eq!(
        statuses(&builder),
        vec![BuildStatus::Success, BuildStatus::Success]
    );
}

#[test]
fn test_breakpoint_pauses_once_then_runs() {
    let runs = Arc::new(AtomicUsize::new(0));
    let behavior: Arc<dyn BlockBehavior> = Arc::new(Counting {
        runs: Arc::clone(&runs),
    });

    let mut builder = Builder::new();
    builder.add_block(Block::new(Arc::clone(&behavior)).with_name("one"));
    let mut stop = Block::new(Arc::clone(&behavior)).with_name("two");
    stop.breakpoint = true;
    builder.add_block(stop);

    assert_eq!(builder.run_to_completion(), BuildStatus::Next);
    assert_eq!(builder.next_step(), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    assert_eq!(builder.run_to_completion(), BuildStatus::End);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_rewind_and_rerun() {
    let mut builder = builder();
    let block = named(&builder, "Emit", "A");
    builder.add_block(block);

    builder.run_to_completion();
    builder.rewind();
    assert_eq!(builder.next_step(), 0);
    assert_eq!(statuses(&builder), vec![BuildStatus::Nothing]);
    assert_eq!(builder.indicator(0), BuildStatus::Next);

    assert_eq!(builder.advance(), BuildStatus::Success);
    assert_eq!(builder.advance(), BuildStatus::End);
}

#[test]
fn test_reorder_drops_blocks_left_out() {
    let mut builder = builder();
    for name in ["a", "b", "c"] {
        let block = named(&builder, "Emit", name);
        builder.add_block(block);
    }

    builder.reorder(["c", "missing", "a"]);
    let names: Vec<&str> = builder.blocks().iter().map(|b| b.name()).collect();
    assert_eq!(names, vec!["c", "a"]);
}

#[test]
fn test_created_names_are_unique() {
    let mut builder = builder();
    for _ in 0..3 {
        let block = builder.create_block("Emit").unwrap();
        builder.add_block(block);
    }
    let names: Vec<&str> = builder.blocks().iter().map(|b| b.name()).collect();
    assert_eq!(names, vec!["Emit1", "Emit2", "Emit3"]);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_save_and_load_blueprint() {
    let dir = TempDir::new().unwrap();
    let loader = BlueprintLoader::new(Arc::clone(&REGISTRY)).with_blueprint_dir(dir.path());

    let mut original = builder();
    original.set_attr("count", TypedValue::new(AttrType::Int, 3));
    let mut block = named(&original, "Emit", "seed");
    block.notes = "first step".to_string();
    original.add_block(block);

    loader
        .save_blueprint(&original, dir.path().join("rig.bpt"), "demo rig")
        .unwrap();

    let loaded = loader.load_blueprint("rig").unwrap();
    assert_eq!(loaded.notes, "demo rig");
    assert_eq!(
        loaded.attr("count"),
        Some(&TypedValue::new(AttrType::Int, 3))
    );
    assert_eq!(loaded.len(), 1);
    let block = &loaded.blocks()[0];
    assert_eq!(block.name(), "seed");
    assert_eq!(block.type_name(), "Emit");
    assert_eq!(block.notes, "first step");
    assert_eq!(block.status(), BuildStatus::Nothing);
}

#[test]
fn test_saved_file_uses_tagged_attributes() {
    let dir = TempDir::new().unwrap();
    let loader = BlueprintLoader::new(Arc::clone(&REGISTRY));
    let path = dir.path().join("tagged.bpt");

    let mut original = builder();
    original.set_attr("count", TypedValue::new(AttrType::Int, 3));
    loader.save_blueprint(&original, &path, "").unwrap();

    let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["attrs"]["count"], json!(["Int", 3]));
    assert_eq!(raw["type"], json!("GenericBuilder"));
}

#[test]
fn test_load_legacy_blueprint() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("legacy.bpt");
    fs::write(
        &path,
        r#"{
            "type": "GenericBuilder",
            "attrs": {"count": 3, "label": "arm", "mirror": true},
            "blocks": [
                {"type": "Emit", "name": "A", "attrs": {"value": 7, "extra": [1, 2]}}
            ]
        }"#,
    )
    .unwrap();

    let loader = BlueprintLoader::new(Arc::clone(&REGISTRY));
    let mut loaded = loader.load_blueprint(&path.to_string_lossy()).unwrap();

    assert_eq!(loaded.attr("count").unwrap().attr_type, AttrType::Int);
    assert_eq!(loaded.attr("label").unwrap().attr_type, AttrType::String);
    assert_eq!(loaded.attr("mirror").unwrap().attr_type, AttrType::Bool);
    let block = &loaded.blocks()[0];
    assert_eq!(block.attr("extra").unwrap().attr_type, AttrType::List);

    assert_eq!(loaded.run_to_completion(), BuildStatus::End);
    assert_eq!(loaded.blocks()[0].results(), Some(&json!(7)));
}

#[test]
fn test_unnamed_legacy_blocks_get_generated_names() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("unnamed.bpt");
    fs::write(
        &path,
        r#"{
            "notes": null,
            "blocks": [
                {"type": "ValueBlock", "notes": null, "attrs": {"value": 1}},
                {"type": "ValueBlock", "name": "", "attrs": {"value": 2}}
            ]
        }"#,
    )
    .unwrap();

    let loader = BlueprintLoader::new(Arc::clone(&REGISTRY));
    let mut loaded = loader.load_blueprint(&path.to_string_lossy()).unwrap();

    assert_eq!(loaded.notes, "");
    assert_eq!(loaded.len(), 2);
    assert!(loaded.blocks()[0].name().starts_with("ValueBlock_"));
    assert!(loaded.blocks()[1].name().starts_with("ValueBlock_"));
    assert_eq!(loaded.run_to_completion(), BuildStatus::End);
    assert_eq!(loaded.blocks()[1].results(), Some(&json!(2)));
}

#[test]
fn test_unknown_block_type_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.bpt");
    fs::write(
        &path,
        r#"{"blocks": [{"type": "Nope", "name": "x", "attrs": {}}]}"#,
    )
    .unwrap();

    let loader = BlueprintLoader::new(Arc::clone(&REGISTRY));
    let err = loader.load_blueprint(&path.to_string_lossy()).unwrap_err();
    assert!(matches!(
        err,
        BrickError::Blueprint(BlueprintError::UnknownBlockType(ref name)) if name == "Nope"
    ));
}

#[test]
fn test_unknown_attribute_type_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad_attr.bpt");
    fs::write(&path, r#"{"attrs": {"x": ["Quaternion", [0, 0, 0, 1]]}}"#).unwrap();

    let loader = BlueprintLoader::new(Arc::clone(&REGISTRY));
    let err = loader.load_blueprint(&path.to_string_lossy()).unwrap_err();
    assert!(matches!(
        err,
        BrickError::Blueprint(BlueprintError::InvalidAttr { ref attr, .. }) if attr == "x"
    ));
}

#[test]
fn test_missing_blueprint_is_reported() {
    let dir = TempDir::new().unwrap();
    let loader = BlueprintLoader::new(Arc::clone(&REGISTRY)).with_blueprint_dir(dir.path());

    let err = loader.load_blueprint("nowhere").unwrap_err();
    assert_eq!(err.to_string(), "Blueprint error: Blueprint nowhere does not exist");
}

// ============================================================================
// Built-ins
// ============================================================================

#[test]
fn test_nested_blueprint_with_builtin_registry() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        blueprint_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let mut registry = BlockRegistry::new();
    register_builtins(&mut registry, &config);
    let registry = Arc::new(registry);
    let loader = BlueprintLoader::new(Arc::clone(&registry)).with_blueprint_dir(dir.path());

    let mut inner = Builder::new().with_registry(Arc::clone(&registry));
    let mut value = inner.create_block("ValueBlock").unwrap();
    value.set_attr("value", TypedValue::new(AttrType::Dict, json!({"side": "L"})));
    inner.add_block(value);
    loader
        .save_blueprint(&inner, dir.path().join("inner.bpt"), "")
        .unwrap();

    let mut outer = Builder::new().with_registry(Arc::clone(&registry));
    let mut nested = outer.create_block("BuilderBlock").unwrap();
    nested.set_attr("blueprint", TypedValue::new(AttrType::Path, "inner"));
    outer.add_block(nested);
    let mut reader = outer.create_block("ValueBlock").unwrap();
    reader.set_attr("value", TypedValue::input("BuilderBlock1", "results"));
    outer.add_block(reader);

    assert_eq!(outer.run_to_completion(), BuildStatus::End);
    assert_eq!(
        outer.blocks()[1].results(),
        Some(&json!({"ValueBlock1": {"side": "L"}}))
    );
}
