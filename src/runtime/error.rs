use thiserror::Error;

/// Failures shared by the interpreter and the p-code VM.
///
/// Both backends route every value operation through `runtime`, so a faulty
/// program reports the same message whichever backend runs it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Undefined variable '{name}'")]
    UndefinedVariable { name: String },
    #[error("Undefined function '{name}'")]
    UndefinedFunction { name: String },
    #[error("Function '{name}' expected {expected} arguments, got {found}")]
    FunctionArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Operation '{operation}' expected {expected}, got {got}")]
    TypeMismatch {
        operation: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("Cannot dereference non-pointer value of type {type_name}")]
    NonPointerDereference { type_name: &'static str },
    #[error("Cannot store through non-pointer value of type {type_name}")]
    NonPointerStore { type_name: &'static str },
    #[error("Address-of operand must be a variable, element or field")]
    InvalidAddressOperand,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Integer overflow")]
    IntegerOverflow,
    #[error("Index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("Array size must be non-negative, got {size}")]
    NegativeArraySize { size: i64 },
    #[error("Missing key {key}")]
    MissingKey { key: String },
    #[error("Value of type {type_name} cannot be used as a key")]
    UnhashableKey { type_name: &'static str },
    #[error("Input exhausted while reading '{name}'")]
    InputExhausted { name: String },
    #[error("Invalid integer input '{text}'")]
    InvalidInput { text: String },
}

impl RuntimeError {
    pub fn expect_function_arity(
        name: &str,
        expected: usize,
        found: usize,
    ) -> Result<(), RuntimeError> {
        if expected == found {
            Ok(())
        } else {
            Err(RuntimeError::FunctionArityMismatch {
                name: name.to_string(),
                expected,
                found,
            })
        }
    }
}
