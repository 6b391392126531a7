use anyhow::Result;
use log::debug;
use rustc_hash::FxHashMap;

use crate::ast::Program;
use crate::backend::{Backend, PreparedBackend};
use crate::pcode::{self, Instruction, Item, Listing};
use crate::runtime::InputSource;

mod runtime;

pub use runtime::VmError;
use runtime::{VmResult, run_program};

#[derive(Debug, Clone, PartialEq)]
struct FunctionEntry {
    entry: usize,
    params: Vec<String>,
}

/// P-code ready to execute: one flat instruction array with labels resolved
/// to addresses and a table of function entry points.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProgram {
    name: String,
    code: Vec<Instruction>,
    functions: FxHashMap<String, FunctionEntry>,
    main: usize,
}

impl LoadedProgram {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Runs from `MAIN` and returns the printed lines joined with `\n`.
    pub fn run(&self, input: InputSource) -> VmResult<String> {
        run_program(self, input)
    }
}

/// Decodes listing text and prepares it for execution.
pub fn load(text: &str) -> VmResult<LoadedProgram> {
    let listing: Listing = text.parse()?;
    load_listing(listing)
}

pub fn load_listing(listing: Listing) -> VmResult<LoadedProgram> {
    let mut name = String::new();
    let mut code = Vec::new();
    let mut functions = FxHashMap::default();
    let mut labels = FxHashMap::default();
    let mut main = None;

    for item in listing.items {
        match item {
            Item::Program(program_name) => name = program_name,
            Item::Func {
                name: function,
                params,
            } => {
                let entry = FunctionEntry {
                    entry: code.len(),
                    params,
                };
                if functions.insert(function.clone(), entry).is_some() {
                    return Err(VmError::DuplicateFunction { name: function });
                }
            }
            Item::Main => main = Some(code.len()),
            Item::Label(label) => {
                if labels.insert(label.clone(), code.len()).is_some() {
                    return Err(VmError::DuplicateLabel { label });
                }
            }
            Item::Op(instruction) => code.push(instruction),
        }
    }

    let main = main.ok_or(VmError::MissingMain)?;
    for instruction in &mut code {
        if let Some(label) = instruction.label_mut() {
            let address = labels.get(&label.name).copied().ok_or_else(|| {
                VmError::UnresolvedLabel {
                    label: label.name.clone(),
                }
            })?;
            label.address = Some(address);
        }
    }

    debug!(
        "loaded p-code for '{name}': {} instructions, {} functions, {} labels",
        code.len(),
        functions.len(),
        labels.len()
    );
    Ok(LoadedProgram {
        name,
        code,
        functions,
        main,
    })
}

/// Stack-machine backend: lowers the AST to p-code and executes the listing.
pub struct VM;

impl VM {
    pub fn new() -> Self {
        Self
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PreparedVM {
    program: LoadedProgram,
}

impl Backend for VM {
    fn name(&self) -> &'static str {
        "vm"
    }

    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>> {
        let listing = pcode::generate(program)?;
        Ok(Box::new(PreparedVM {
            program: load_listing(listing)?,
        }))
    }
}

impl PreparedBackend for PreparedVM {
    fn run(&self, input: InputSource) -> Result<String> {
        Ok(self.program.run(input)?)
    }
}
