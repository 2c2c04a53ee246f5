// SPDX-License-Identifier: MIT

//! Sequential execution engine
//!
//! This module provides:
//! - `AttrType` / `TypedValue` - typed attributes that survive a save/load
//! - `Block` - one executable step, driven by a `BlockBehavior`
//! - `Builder` - ordered blocks with a step cursor
//! - `BlockRegistry` - explicit name -> type table

pub mod attr;
pub mod block;
pub mod builder;
pub mod error;
pub mod registry;
pub mod status;

pub use attr::{guess_type_from_value, type_from_name, AttrMap, AttrType, TypedValue};
pub use block::{Block, BlockBehavior, BlockCategory, BlockLookup, ExecContext, ExecScope};
pub use builder::{Builder, ResultBinding};
pub use error::{AttrError, BlockError, BlueprintError, BrickError};
pub use registry::{BlockRegistry, BuilderType, GENERIC_BUILDER};
pub use status::BuildStatus;
