// SPDX-License-Identifier: MIT

use serde_json::Value;
use std::error::Error;

use crate::engine::{AttrMap, AttrType, BlockBehavior, BlockCategory, ExecContext, TypedValue};

/// Publishes its `value` attribute as results. Mapping values also expose
/// each entry as a named output.
pub struct ValueBlock;

impl BlockBehavior for ValueBlock {
    fn type_name(&self) -> &str {
        "ValueBlock"
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Helper
    }

    fn order(&self) -> u32 {
        10
    }

    fn default_attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert("value".to_string(), TypedValue::new(AttrType::String, ""));
        attrs
    }

    fn execute(&self, ctx: &mut ExecContext<'_>) -> Result<(), Box<dyn Error + Send + Sync>> {
        let value = ctx.require("value")?.clone();
        if let Value::Object(entries) = &value {
            for (key, entry) in entries {
                ctx.set_output(key.clone(), entry.clone());
            }
        }
        ctx.set_results(value);
        Ok(())
    }
}
