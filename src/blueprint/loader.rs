//! Blueprint loader - reading and writing `.bpt` files
//!
//! A blueprint is addressed either by path or by name. Names that are not an
//! existing path are looked up in the blueprint directory, with the `.bpt`
//! extension added when missing.

use super::codec::{from_json_str, to_json_string};
use super::types::{BlueprintDefinition, BLUEPRINT_EXTENSION};
use crate::engine::{BlockRegistry, BlueprintError, BrickError, Builder};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loads and saves blueprints against a block registry
#[derive(Clone)]
pub struct BlueprintLoader {
    registry: Arc<BlockRegistry>,
    blueprint_dir: Option<PathBuf>,
}

impl BlueprintLoader {
    pub fn new(registry: Arc<BlockRegistry>) -> Self {
        Self {
            registry,
            blueprint_dir: None,
        }
    }

    pub fn with_blueprint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.blueprint_dir = Some(dir.into());
        self
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    pub fn blueprint_dir(&self) -> Option<&Path> {
        self.blueprint_dir.as_deref()
    }

    /// Find the file behind a blueprint name or path
    pub fn resolve_path(&self, name_or_path: &str) -> Result<PathBuf, BlueprintError> {
        let direct = PathBuf::from(name_or_path);
        if direct.is_file() {
            return Ok(direct);
        }

        let not_found = || BlueprintError::NotFound(name_or_path.to_string());
        let dir = self.blueprint_dir.as_ref().ok_or_else(not_found)?;

        let mut candidate = dir.join(&direct);
        if candidate.extension().and_then(|e| e.to_str()) != Some(BLUEPRINT_EXTENSION) {
            let mut with_ext = OsString::from(candidate);
            with_ext.push(".");
            with_ext.push(BLUEPRINT_EXTENSION);
            candidate = PathBuf::from(with_ext);
        }

        if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(not_found())
        }
    }

    /// Load the raw document of a blueprint
    pub fn load_definition(&self, name_or_path: &str) -> Result<BlueprintDefinition, BrickError> {
        let path = self.resolve_path(name_or_path)?;
        log::debug!("Reading blueprint {}", path.display());
        let content = fs::read_to_string(&path)?;
        from_json_str(&content)
    }

    /// Load a blueprint into a ready-to-run builder
    pub fn load_blueprint(&self, name_or_path: &str) -> Result<Builder, BrickError> {
        let def = self.load_definition(name_or_path)?;
        let builder = Builder::load(&def, &self.registry)?;
        log::info!(
            "Loaded blueprint {} ({} blocks)",
            name_or_path,
            builder.len()
        );
        Ok(builder)
    }

    /// Write `builder` to `path` with the given notes
    pub fn save_blueprint<P: AsRef<Path>>(
        &self,
        builder: &Builder,
        path: P,
        notes: &str,
    ) -> Result<(), BrickError> {
        let mut def = builder.dump();
        def.notes = notes.to_string();
        let content = to_json_string(&def)?;

        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        log::info!("Saved blueprint {}", path.display());
        Ok(())
    }

    /// Blueprint files in the blueprint directory, sorted by path
    pub fn list_blueprints(&self) -> Result<Vec<PathBuf>, BrickError> {
        let Some(dir) = &self.blueprint_dir else {
            return Ok(Vec::new());
        };
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path
                .extension()
                .is_some_and(|ext| ext == BLUEPRINT_EXTENSION)
            {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }
}
