// SPDX-License-Identifier: MIT

//! brick-rs: step-through execution of block blueprints
//!
//! A blueprint is an ordered list of typed, attribute-driven blocks saved as
//! JSON. A [`engine::Builder`] loads it and runs the blocks one at a time,
//! tracking a status per block and a cursor that can be stepped, rewound and
//! reordered.

pub mod blocks;
pub mod blueprint;
pub mod config;
pub mod engine;
