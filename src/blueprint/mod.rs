// SPDX-License-Identifier: MIT

//! Blueprint documents: the on-disk form of a builder

pub mod codec;
pub mod loader;
pub mod types;

pub use codec::{decode_attrs, encode_attrs, from_json_str, to_json_string};
pub use loader::BlueprintLoader;
pub use types::{BlockDefinition, BlueprintDefinition, BLUEPRINT_EXTENSION};
