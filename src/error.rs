//! Error types for Crucero

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("component {0:?} is already defined")]
    DuplicateName(String),

    #[error("identifier {0:?} collides with an existing namespace")]
    InvalidIdentifier(String),

    #[error("cannot make {0} relocatable: not tracked by this registry")]
    Sanitize(String),

    #[error("unresolvable reference {0:?}")]
    UnresolvableReference(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unknown factory {0:?}")]
    UnknownFactory(String),

    #[error("variable {0:?} already exists in the graph")]
    VariableExists(String),

    #[error("variable {0:?} has not been initialized")]
    Uninitialized(String),

    #[error("size mismatch for {name:?}: expected {expected}, got {got}")]
    SizeMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("snapshot {path:?} is corrupt: {reason}")]
    CorruptSnapshot { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;
