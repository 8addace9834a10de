//! Error types for tokstream.
//!
//! Stream and shape failures share the core [`Error`]; registration has its
//! own error because it happens outside any traversal.

use thiserror::Error;

pub use tokstream_core::{Error, Path, Reason, Result};

/// Errors from the type-name registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The type is already registered under a different name.
    #[error("type {type_name} is already registered as {existing}")]
    AlreadyNamed {
        type_name: &'static str,
        existing: &'static str,
    },

    /// The name is already taken by a different type.
    #[error("name {name} is already registered for type {type_name}")]
    NameTaken {
        name: &'static str,
        type_name: &'static str,
    },
}
