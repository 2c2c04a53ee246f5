// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::attr::AttrMap;
use super::block::{Block, BlockBehavior, BlockCategory};
use super::error::BlueprintError;

/// Type name of the builder every registry knows about
pub const GENERIC_BUILDER: &str = "GenericBuilder";

/// A registered builder type and the global attributes it starts with
#[derive(Debug, Clone)]
pub struct BuilderType {
    pub name: String,
    pub fixed_attrs: AttrMap,
}

/// Explicit name -> type table for blocks and builders.
///
/// Populated once at start-up, then shared read-only behind an `Arc`.
#[derive(Clone)]
pub struct BlockRegistry {
    blocks: HashMap<String, Arc<dyn BlockBehavior>>,
    builders: HashMap<String, BuilderType>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            blocks: HashMap::new(),
            builders: HashMap::new(),
        };
        registry.register_builder(GENERIC_BUILDER, AttrMap::new());
        registry
    }

    /// Register a block type under its `type_name`, replacing any previous one
    pub fn register(&mut self, behavior: Arc<dyn BlockBehavior>) {
        let name = behavior.type_name().to_string();
        if self.blocks.insert(name.clone(), behavior).is_some() {
            log::warn!("Block type {} registered twice, keeping the latest", name);
        }
    }

    pub fn register_builder(&mut self, name: impl Into<String>, fixed_attrs: AttrMap) {
        let name = name.into();
        self.builders.insert(
            name.clone(),
            BuilderType {
                name,
                fixed_attrs,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn BlockBehavior>> {
        self.blocks.get(name).cloned()
    }

    pub fn resolve_block_type(&self, name: &str) -> Result<Arc<dyn BlockBehavior>, BlueprintError> {
        self.get(name)
            .ok_or_else(|| BlueprintError::UnknownBlockType(name.to_string()))
    }

    pub fn resolve_builder_type(&self, name: &str) -> Result<&BuilderType, BlueprintError> {
        self.builders
            .get(name)
            .ok_or_else(|| BlueprintError::UnknownBuilderType(name.to_string()))
    }

    /// Fresh block of a registered type, with a generated name
    pub fn create_block(&self, name: &str) -> Result<Block, BlueprintError> {
        Ok(Block::new(self.resolve_block_type(name)?))
    }

    /// Sorted names of every registered block type
    pub fn block_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.blocks.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Block types grouped by category, each group sorted by order then name
    pub fn blocks_by_category(&self) -> BTreeMap<BlockCategory, Vec<Arc<dyn BlockBehavior>>> {
        let mut grouped: BTreeMap<BlockCategory, Vec<Arc<dyn BlockBehavior>>> = BTreeMap::new();
        for behavior in self.blocks.values() {
            grouped
                .entry(behavior.category())
                .or_default()
                .push(Arc::clone(behavior));
        }
        for group in grouped.values_mut() {
            group.sort_by(|a, b| {
                a.order()
                    .cmp(&b.order())
                    .then_with(|| a.type_name().cmp(b.type_name()))
            });
        }
        grouped
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::block::ExecContext;
    use std::error::Error;

    /// A mock block type for testing
    struct MockBlock {
        name: String,
        category: BlockCategory,
        order: u32,
    }

    impl MockBlock {
        fn new(name: &str, category: BlockCategory, order: u32) -> Self {
            Self {
                name: name.to_string(),
                category,
                order,
            }
        }
    }

    impl BlockBehavior for MockBlock {
        fn type_name(&self) -> &str {
            &self.name
        }

        fn category(&self) -> BlockCategory {
            self.category
        }

        fn order(&self) -> u32 {
            self.order
        }

        fn execute(&self, _ctx: &mut ExecContext<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = BlockRegistry::new();
        registry.register(Arc::new(MockBlock::new("Mock", BlockCategory::Generic, 0)));

        let resolved = registry.resolve_block_type("Mock").unwrap();
        assert_eq!(resolved.type_name(), "Mock");
    }

    #[test]
    fn test_unknown_block_type() {
        let registry = BlockRegistry::new();
        assert!(matches!(
            registry.resolve_block_type("Nope"),
            Err(BlueprintError::UnknownBlockType(name)) if name == "Nope"
        ));
    }

    #[test]
    fn test_generic_builder_is_registered() {
        let registry = BlockRegistry::new();
        assert_eq!(
            registry.resolve_builder_type(GENERIC_BUILDER).unwrap().name,
            GENERIC_BUILDER
        );
        assert!(matches!(
            registry.resolve_builder_type("FancyBuilder"),
            Err(BlueprintError::UnknownBuilderType(_))
        ));
    }

    #[test]
    fn test_create_block() {
        let mut registry = BlockRegistry::new();
        registry.register(Arc::new(MockBlock::new("Mock", BlockCategory::Generic, 0)));

        let block = registry.create_block("Mock").unwrap();
        assert_eq!(block.type_name(), "Mock");
        assert!(block.name().starts_with("Mock_"));
    }

    #[test]
    fn test_blocks_by_category() {
        let mut registry = BlockRegistry::new();
        registry.register(Arc::new(MockBlock::new("Late", BlockCategory::Generic, 20)));
        registry.register(Arc::new(MockBlock::new("Early", BlockCategory::Generic, 10)));
        registry.register(Arc::new(MockBlock::new("Mine", BlockCategory::Custom, 0)));

        let grouped = registry.blocks_by_category();
        let generic: Vec<&str> = grouped[&BlockCategory::Generic]
            .iter()
            .map(|b| b.type_name())
            .collect();
        assert_eq!(generic, vec!["Early", "Late"]);
        assert_eq!(grouped[&BlockCategory::Custom].len(), 1);
        assert!(!grouped.contains_key(&BlockCategory::Helper));

        assert_eq!(registry.block_types(), vec!["Early", "Late", "Mine"]);
    }

    #[test]
    fn test_register_overwrites_existing() {
        let mut registry = BlockRegistry::new();
        registry.register(Arc::new(MockBlock::new("Same", BlockCategory::Generic, 0)));
        registry.register(Arc::new(MockBlock::new("Same", BlockCategory::Helper, 0)));

        let resolved = registry.get("Same").unwrap();
        assert_eq!(resolved.category(), BlockCategory::Helper);
    }
}
