// SPDX-License-Identifier: MIT

//! Built-in block types

pub mod nested;
pub mod script;
pub mod value;

use std::sync::Arc;

use crate::config::Config;
use crate::engine::BlockRegistry;

pub use nested::BuilderBlock;
pub use script::{ScriptBlock, ScriptEvaluator, ScriptOutput, ShellEvaluator};
pub use value::ValueBlock;

/// Register every built-in block type
pub fn register_builtins(registry: &mut BlockRegistry, config: &Config) {
    let evaluator: Arc<dyn ScriptEvaluator> = Arc::new(ShellEvaluator::new(config.shell.clone()));
    registry.register(Arc::new(ScriptBlock::new(evaluator)));
    registry.register(Arc::new(BuilderBlock::new(Some(config.blueprint_dir.clone()))));
    registry.register(Arc::new(ValueBlock));
}

/// Registry with the built-in block types, ready to share
pub fn default_registry(config: &Config) -> Arc<BlockRegistry> {
    let mut registry = BlockRegistry::new();
    register_builtins(&mut registry, config);
    Arc::new(registry)
}
