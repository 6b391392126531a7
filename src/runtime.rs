//! Runtime model shared by the interpreter and the p-code VM.
//!
//! Values, pointers, variable frames and input handling live here so that
//! both backends produce identical output and identical failures.
pub mod environment;
pub mod error;
pub mod input;
pub mod pointer;
pub mod value;

pub use environment::Environment;
pub use error::RuntimeError;
pub use input::InputSource;
pub use pointer::Pointer;
pub use value::{Key, Value};
