use indexmap::{IndexMap, IndexSet};
use log::trace;
use thiserror::Error;

use crate::builtins::BuiltinFunction;
use crate::pcode::{Instruction, Label, PcodeError};
use crate::runtime::value::binary;
use crate::runtime::{Environment, InputSource, Key, Pointer, RuntimeError, Value};

use super::LoadedProgram;

pub(super) type VmResult<T> = std::result::Result<T, VmError>;

/// VM failures: listing load errors plus everything that can go wrong while
/// running the instructions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Decode(#[from] PcodeError),
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Unresolved label '{label}'")]
    UnresolvedLabel { label: String },
    #[error("Duplicate label '{label}'")]
    DuplicateLabel { label: String },
    #[error("Duplicate function definition '{name}'")]
    DuplicateFunction { name: String },
    #[error("P-code listing has no MAIN block")]
    MissingMain,
    #[error("Expected {expected} on the stack, got {found}")]
    UnexpectedStackEntry {
        expected: &'static str,
        found: &'static str,
    },
    #[error("LEAVE without a matching ENTER")]
    FrameUnderflow,
    #[error("RET outside of a function")]
    ReturnOutsideFunction,
}

/// Operand stack slot. Aggregate literals push pending entries that only
/// the matching `STRUCT`/`MAP`/`SET` instruction consumes.
#[derive(Debug)]
enum StackEntry {
    Value(Value),
    Field(String, Value),
    Pair(Value, Value),
    Element(Value),
}

impl StackEntry {
    fn kind(&self) -> &'static str {
        match self {
            StackEntry::Value(_) => "value",
            StackEntry::Field(..) => "struct field",
            StackEntry::Pair(..) => "map entry",
            StackEntry::Element(_) => "set element",
        }
    }

    fn unexpected(&self, expected: &'static str) -> VmError {
        VmError::UnexpectedStackEntry {
            expected,
            found: self.kind(),
        }
    }
}

struct CallRecord {
    return_ip: usize,
    frame_depth: usize,
}

/// Executes a loaded program from `MAIN` and returns printed output.
pub(super) fn run_program(program: &LoadedProgram, input: InputSource) -> VmResult<String> {
    let mut runtime = VmRuntime {
        program,
        stack: Vec::new(),
        frames: vec![Environment::new()],
        calls: Vec::new(),
        input,
        output: Vec::new(),
        line: Vec::new(),
    };
    runtime.execute(program.main)?;
    Ok(runtime.output_string())
}

/// Fetch-dispatch state for one run.
///
/// `frames` is the scope stack: the last entry is the innermost frame, calls
/// and `ENTER` push a child of it, `RET` and `LEAVE` pop back.
struct VmRuntime<'a> {
    program: &'a LoadedProgram,
    stack: Vec<StackEntry>,
    frames: Vec<Environment>,
    calls: Vec<CallRecord>,
    input: InputSource,
    output: Vec<String>,
    line: Vec<String>,
}

impl VmRuntime<'_> {
    fn execute(&mut self, entry: usize) -> VmResult<()> {
        let program = self.program;
        let mut ip = entry;
        while let Some(instruction) = program.code.get(ip) {
            trace!("{ip:04} {instruction} (stack {})", self.stack.len());
            ip += 1;
            match instruction {
                Instruction::Push(value) => self.push(Value::Integer(*value)),
                Instruction::Load(name) => {
                    let value = self.frame()?.get(name)?;
                    self.push(value);
                }
                Instruction::Store(name) => {
                    let value = self.pop_value()?;
                    self.frame()?.assign(name, value);
                }
                Instruction::Decl(name) => self.frame()?.define(name.clone(), Value::Integer(0)),
                Instruction::DeclArray(name) => {
                    let size = self.pop_value()?;
                    let array = Value::zeroed_array(&size)?;
                    self.frame()?.define(name.clone(), array);
                }
                Instruction::Read(name) => {
                    let value = self.input.read_integer(name)?;
                    self.frame()?.assign(name, Value::Integer(value));
                }
                Instruction::ArrayLoad => {
                    let index = self.pop_value()?;
                    let container = self.pop_value()?;
                    self.push(container.index(&index)?);
                }
                Instruction::ArrayStore => {
                    let index = self.pop_value()?;
                    let container = self.pop_value()?;
                    let value = self.pop_value()?;
                    container.store_index(&index, value)?;
                }
                Instruction::FieldLoad(field) => {
                    let object = self.pop_value()?;
                    self.push(object.field(field)?);
                }
                Instruction::FieldStore(field) => {
                    let object = self.pop_value()?;
                    let value = self.pop_value()?;
                    object.store_field(field, value)?;
                }
                Instruction::Addr(name) => {
                    let frame = self.frame()?.resolve(name)?;
                    self.push(Value::Pointer(Pointer::Variable {
                        frame,
                        name: name.clone(),
                    }));
                }
                Instruction::ArrayAddr => {
                    let index = self.pop_value()?;
                    let container = self.pop_value()?;
                    self.push(Value::Pointer(container.element_pointer(&index)?));
                }
                Instruction::FieldAddr(field) => {
                    let object = self.pop_value()?;
                    self.push(Value::Pointer(object.field_pointer(field)?));
                }
                Instruction::Deref => {
                    let pointer = self.pop_value()?;
                    self.push(pointer.dereference()?);
                }
                Instruction::PointerStore => {
                    let pointer = self.pop_value()?;
                    let value = self.pop_value()?;
                    pointer.store_through(value)?;
                }
                Instruction::Array(count) => {
                    let values = self
                        .pending(Some(*count), |_| false)?
                        .into_iter()
                        .map(|entry| match entry {
                            StackEntry::Value(value) => Ok(value),
                            other => Err(other.unexpected("value")),
                        })
                        .collect::<VmResult<Vec<_>>>()?;
                    self.push(Value::array(values));
                }
                Instruction::SetField(field) => {
                    let value = self.pop_value()?;
                    self.stack.push(StackEntry::Field(field.clone(), value));
                }
                Instruction::Struct(count) => {
                    let mut fields = IndexMap::new();
                    for entry in self.pending(*count, |entry| matches!(entry, StackEntry::Field(..)))? {
                        match entry {
                            StackEntry::Field(name, value) => {
                                fields.insert(Key::Name(name), value);
                            }
                            other => return Err(other.unexpected("struct field")),
                        }
                    }
                    self.push(Value::mapping(fields));
                }
                Instruction::MapInsert => {
                    let value = self.pop_value()?;
                    let key = self.pop_value()?;
                    self.stack.push(StackEntry::Pair(key, value));
                }
                Instruction::Map(count) => {
                    let mut entries = IndexMap::new();
                    for entry in self.pending(*count, |entry| matches!(entry, StackEntry::Pair(..)))? {
                        match entry {
                            StackEntry::Pair(key, value) => {
                                entries.insert(key.to_key()?, value);
                            }
                            other => return Err(other.unexpected("map entry")),
                        }
                    }
                    self.push(Value::mapping(entries));
                }
                Instruction::SetAdd => {
                    let value = self.pop_value()?;
                    self.stack.push(StackEntry::Element(value));
                }
                Instruction::Set(count) => {
                    let mut items = IndexSet::new();
                    for entry in self.pending(*count, |entry| matches!(entry, StackEntry::Element(_)))? {
                        match entry {
                            StackEntry::Element(value) => {
                                items.insert(value.to_key()?);
                            }
                            other => return Err(other.unexpected("set element")),
                        }
                    }
                    self.push(Value::set(items));
                }
                Instruction::Neg => {
                    let value = self.pop_value()?;
                    self.push(value.negate()?);
                }
                Instruction::Binary(op) => {
                    let right = self.pop_value()?;
                    let left = self.pop_value()?;
                    self.push(binary(*op, &left, &right)?);
                }
                Instruction::JumpIfZero(label) => {
                    if !self.pop_value()?.is_true()? {
                        ip = jump_address(label)?;
                    }
                }
                Instruction::Jump(label) => ip = jump_address(label)?,
                Instruction::Call { name, argc } => {
                    if let Some(next) = self.call(name, *argc, ip)? {
                        ip = next;
                    }
                }
                Instruction::Ret => {
                    let value = self.pop_value()?;
                    let record = self.calls.pop().ok_or(VmError::ReturnOutsideFunction)?;
                    trace!("return to {:04}", record.return_ip);
                    self.frames.truncate(record.frame_depth);
                    ip = record.return_ip;
                    self.push(value);
                }
                Instruction::Pop => {
                    self.stack.pop().ok_or(VmError::StackUnderflow)?;
                }
                Instruction::Print => {
                    let value = self.pop_value()?;
                    self.line.push(value.to_string());
                }
                Instruction::Newline => {
                    self.output.push(self.line.join(" "));
                    self.line.clear();
                }
                Instruction::Enter => {
                    let child = self.frame()?.child();
                    self.frames.push(child);
                }
                Instruction::Leave => {
                    // The global frame and call frames are never popped by LEAVE.
                    let floor = self.calls.last().map_or(1, |record| record.frame_depth + 1);
                    if self.frames.len() <= floor {
                        return Err(VmError::FrameUnderflow);
                    }
                    self.frames.pop();
                }
                Instruction::End => break,
            }
        }
        Ok(())
    }

    /// Invokes a builtin in place, or enters a user function and returns the
    /// address to continue at.
    fn call(&mut self, name: &str, argc: usize, return_ip: usize) -> VmResult<Option<usize>> {
        let args = self.pop_args(argc)?;
        if let Some(builtin) = BuiltinFunction::from_name(name) {
            let result = builtin.call(args)?;
            self.push(result);
            return Ok(None);
        }

        let program = self.program;
        let function = program
            .functions
            .get(name)
            .ok_or_else(|| RuntimeError::UndefinedFunction {
                name: name.to_string(),
            })?;
        RuntimeError::expect_function_arity(name, function.params.len(), args.len())?;

        let frame = self.frame()?.child();
        for (param, value) in function.params.iter().zip(args) {
            frame.define(param.clone(), value);
        }
        trace!("call {name} depth={}", self.calls.len() + 1);
        self.calls.push(CallRecord {
            return_ip,
            frame_depth: self.frames.len(),
        });
        self.frames.push(frame);
        Ok(Some(function.entry))
    }

    fn frame(&self) -> VmResult<Environment> {
        self.frames.last().cloned().ok_or(VmError::FrameUnderflow)
    }

    fn push(&mut self, value: Value) {
        self.stack.push(StackEntry::Value(value));
    }

    fn pop_value(&mut self) -> VmResult<Value> {
        match self.stack.pop() {
            Some(StackEntry::Value(value)) => Ok(value),
            Some(other) => Err(other.unexpected("value")),
            None => Err(VmError::StackUnderflow),
        }
    }

    fn pop_args(&mut self, argc: usize) -> VmResult<Vec<Value>> {
        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            args.push(self.pop_value()?);
        }
        args.reverse();
        Ok(args)
    }

    /// Removes the topmost entries of an aggregate in push order. With a
    /// count, exactly that many are taken; without one, entries are taken
    /// while `is_entry` holds.
    fn pending(
        &mut self,
        count: Option<usize>,
        is_entry: impl Fn(&StackEntry) -> bool,
    ) -> VmResult<Vec<StackEntry>> {
        let start = match count {
            Some(count) => self
                .stack
                .len()
                .checked_sub(count)
                .ok_or(VmError::StackUnderflow)?,
            None => self
                .stack
                .iter()
                .rposition(|entry| !is_entry(entry))
                .map_or(0, |position| position + 1),
        };
        Ok(self.stack.split_off(start))
    }

    fn output_string(mut self) -> String {
        if !self.line.is_empty() {
            self.output.push(self.line.join(" "));
        }
        self.output.join("\n")
    }
}

fn jump_address(label: &Label) -> VmResult<usize> {
    label.address.ok_or_else(|| VmError::UnresolvedLabel {
        label: label.name.clone(),
    })
}
