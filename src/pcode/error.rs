use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PcodeError {
    #[error("Address-of operand must be a variable, element or field")]
    InvalidAddressOperand,
    #[error("Unknown opcode '{opcode}' at instruction {line}")]
    UnknownOpcode { opcode: String, line: usize },
    #[error("Opcode '{opcode}' at instruction {line} expects {expected}")]
    MissingOperand {
        opcode: String,
        expected: &'static str,
        line: usize,
    },
    #[error("Invalid operand '{operand}' for '{opcode}' at instruction {line}")]
    InvalidOperand {
        opcode: String,
        operand: String,
        line: usize,
    },
}

pub type PcodeResult<T> = Result<T, PcodeError>;
