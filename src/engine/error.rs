// SPDX-License-Identifier: MIT

//! Typed error handling for brick-rs
//!
//! Load/save and type resolution failures are surfaced to the caller.
//! Block execution failures never leave `Block::execute`; they are turned
//! into a `fail` status plus a log message.

use thiserror::Error;

/// Top-level error type for brick-rs
#[derive(Debug, Error)]
pub enum BrickError {
    /// Blueprint document or type resolution errors
    #[error("Blueprint error: {0}")]
    Blueprint(#[from] BlueprintError),

    /// Attribute type errors
    #[error("Attribute error: {0}")]
    Attr(#[from] AttrError),

    /// Block errors raised outside of execution (e.g. creating an unknown block)
    #[error("Block error: {0}")]
    Block(#[from] BlockError),

    /// Configuration errors (invalid env vars, missing directories)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Attribute type registry errors
#[derive(Debug, Error, PartialEq)]
pub enum AttrError {
    /// Serialized type tag is not a registered attribute type
    #[error("Unknown attribute type: {0}")]
    UnknownType(String),

    /// Legacy untagged value whose type cannot be inferred
    #[error("Cannot guess attribute type of value {0}")]
    Unguessable(String),
}

/// Blueprint loading/saving errors
#[derive(Debug, Error)]
pub enum BlueprintError {
    /// Block type name not present in the registry
    #[error("Unknown block type: {0}")]
    UnknownBlockType(String),

    /// Builder type name not present in the registry
    #[error("Unknown builder type: {0}")]
    UnknownBuilderType(String),

    /// Blueprint file could not be found on disk or in the blueprint directory
    #[error("Blueprint {0} does not exist")]
    NotFound(String),

    /// An attribute entry could not be decoded
    #[error("Invalid attribute '{attr}': {source}")]
    InvalidAttr {
        attr: String,
        #[source]
        source: AttrError,
    },

    /// Two blocks in one document share a name
    #[error("Duplicate block name: {0}")]
    DuplicateBlockName(String),
}

/// Errors raised while executing a single block
#[derive(Debug, Error, PartialEq)]
pub enum BlockError {
    /// Input reference names a block that is not in the builder
    #[error("cannot find input block name: {0}")]
    BlockNotFound(String),

    /// Input reference names an attribute the block does not expose
    #[error("cannot find attribute {attr} from input block {block}")]
    AttrNotFound { block: String, attr: String },

    /// Input attribute value is not a `[blockName, attrName]` pair
    #[error("input attribute '{0}' is not a [block, attribute] pair")]
    MalformedInput(String),

    /// Behaviour required an attribute that was not resolved
    #[error("missing attribute '{0}'")]
    MissingAttr(String),

    /// A block registry was needed but none was attached
    #[error("'{0}' has no block registry")]
    NoRegistry(String),

    /// Free-form failure reported by a behaviour
    #[error("{0}")]
    Execution(String),
}

impl BrickError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl BlueprintError {
    pub fn invalid_attr(attr: impl Into<String>, source: AttrError) -> Self {
        Self::InvalidAttr {
            attr: attr.into(),
            source,
        }
    }
}

impl From<&str> for BrickError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for BrickError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}
