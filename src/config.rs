// SPDX-License-Identifier: MIT

//! Environment driven configuration
//!
//! Values come from the process environment, optionally seeded from a
//! `.env` file by the binary.

use std::env;
use std::path::PathBuf;

use crate::engine::BrickError;

pub const BLUEPRINT_DIR_VAR: &str = "BRICK_BLUEPRINT_DIR";
pub const SHELL_VAR: &str = "BRICK_SHELL";
pub const BUILD_DIR_VAR: &str = "BRICK_BUILD_DIR";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Searched when a blueprint name is not an existing path
    pub blueprint_dir: PathBuf,
    /// Shell used to run script blocks
    pub shell: String,
    /// Scratch directory handed to blocks as the `build_dir` global
    pub build_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, BrickError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BrickError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let blueprint_dir = get(BLUEPRINT_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("blueprints"));
        let shell = get(SHELL_VAR).unwrap_or_else(|| "sh".to_string());
        let build_dir = get(BUILD_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        if shell.contains(char::is_whitespace) {
            return Err(BrickError::config(format!(
                "{} must be a single program, got '{}'",
                SHELL_VAR, shell
            )));
        }

        Ok(Self {
            blueprint_dir,
            shell,
            build_dir,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blueprint_dir: PathBuf::from("blueprints"),
            shell: "sh".to_string(),
            build_dir: env::temp_dir(),
        }
    }
}
