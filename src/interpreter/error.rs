use thiserror::Error;

use crate::runtime::RuntimeError;

/// Typed errors produced by the tree-walking interpreter backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterpreterError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("Duplicate function definition '{name}'")]
    DuplicateFunction { name: String },
}
