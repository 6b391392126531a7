use anyhow::{Result, bail};

use crate::ast::Program;
use crate::runtime::InputSource;

/// Executable artifact produced by a backend `prepare` step.
///
/// This keeps compilation and execution separated so benchmarks and tests can
/// measure/validate prepare-vs-run phases independently.
pub trait PreparedBackend {
    /// Runs the program once, reading `input` statements from `input`, and
    /// returns the printed lines joined with `\n`.
    fn run(&self, input: InputSource) -> Result<String>;
}

/// Common interface implemented by each execution backend.
///
/// `prepare` translates AST into backend-owned executable state, while `run`
/// offers the convenience path for one-shot execution.
pub trait Backend {
    fn name(&self) -> &'static str;
    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>>;

    fn run(&self, program: &Program, input: InputSource) -> Result<String> {
        self.prepare(program)?.run(input)
    }
}

pub fn backends() -> Vec<Box<dyn Backend>> {
    vec![
        Box::new(crate::interpreter::Interpreter::new()),
        Box::new(crate::vm::VM::new()),
    ]
}

pub fn find_backend(name: &str) -> Result<Box<dyn Backend>> {
    match backends().into_iter().find(|backend| backend.name() == name) {
        Some(backend) => Ok(backend),
        None => bail!("Unknown backend '{name}'"),
    }
}
