pub mod ast;
pub mod backend;
pub mod builtins;
pub mod dump;
pub mod interpreter;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod pcode;
pub mod runtime;
pub mod tac;
pub mod token;
pub mod toolchain;
pub mod vm;
