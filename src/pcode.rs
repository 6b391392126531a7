//! P-code: the stack-machine listing executed by the VM.
//!
//! `generate` lowers a program into a [`Listing`]. A listing renders to the
//! textual form through `Display` and decodes back through `FromStr`, so the
//! VM can run either a fresh listing or listing text produced elsewhere.

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::ast::{
    AssignTarget, BinaryOperator, Call, Expression, FuncDef, Program, Statement, StmtList,
    UnaryOperator,
};

mod error;

pub use error::{PcodeError, PcodeResult};

/// Jump target. `address` is filled in when the VM loads the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub address: Option<usize>,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Push(i64),
    Load(String),
    Store(String),
    Decl(String),
    DeclArray(String),
    Read(String),
    ArrayLoad,
    ArrayStore,
    FieldLoad(String),
    FieldStore(String),
    Addr(String),
    ArrayAddr,
    FieldAddr(String),
    Deref,
    PointerStore,
    Array(usize),
    SetField(String),
    Struct(Option<usize>),
    MapInsert,
    Map(Option<usize>),
    SetAdd,
    Set(Option<usize>),
    Neg,
    Binary(BinaryOperator),
    JumpIfZero(Label),
    Jump(Label),
    Call { name: String, argc: usize },
    Ret,
    Pop,
    Print,
    Newline,
    Enter,
    Leave,
    End,
}

impl Instruction {
    pub fn label_mut(&mut self) -> Option<&mut Label> {
        match self {
            Instruction::JumpIfZero(label) | Instruction::Jump(label) => Some(label),
            _ => None,
        }
    }
}

fn binary_opcode(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "ADD",
        BinaryOperator::Sub => "SUB",
        BinaryOperator::Mul => "MUL",
        BinaryOperator::Div => "DIV",
        BinaryOperator::Equal => "EQ",
        BinaryOperator::NotEqual => "NE",
        BinaryOperator::Less => "LT",
        BinaryOperator::LessEqual => "LE",
        BinaryOperator::Greater => "GT",
        BinaryOperator::GreaterEqual => "GE",
    }
}

fn binary_from_opcode(opcode: &str) -> Option<BinaryOperator> {
    Some(match opcode {
        "ADD" => BinaryOperator::Add,
        "SUB" => BinaryOperator::Sub,
        "MUL" => BinaryOperator::Mul,
        "DIV" => BinaryOperator::Div,
        "EQ" => BinaryOperator::Equal,
        "NE" => BinaryOperator::NotEqual,
        "LT" => BinaryOperator::Less,
        "LE" => BinaryOperator::LessEqual,
        "GT" => BinaryOperator::Greater,
        "GE" => BinaryOperator::GreaterEqual,
        _ => return None,
    })
}

fn write_count(f: &mut fmt::Formatter<'_>, opcode: &str, count: Option<usize>) -> fmt::Result {
    match count {
        Some(count) => write!(f, "{opcode} {count}"),
        None => f.write_str(opcode),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Push(value) => write!(f, "PUSH {value}"),
            Instruction::Load(name) => write!(f, "LOAD {name}"),
            Instruction::Store(name) => write!(f, "STORE {name}"),
            Instruction::Decl(name) => write!(f, "DECL {name}"),
            Instruction::DeclArray(name) => write!(f, "DECL_ARR {name}"),
            Instruction::Read(name) => write!(f, "READ {name}"),
            Instruction::ArrayLoad => f.write_str("ALOAD"),
            Instruction::ArrayStore => f.write_str("ASTORE"),
            Instruction::FieldLoad(field) => write!(f, "FLOAD {field}"),
            Instruction::FieldStore(field) => write!(f, "FSTORE {field}"),
            Instruction::Addr(name) => write!(f, "ADDR {name}"),
            Instruction::ArrayAddr => f.write_str("AADDR"),
            Instruction::FieldAddr(field) => write!(f, "FADDR {field}"),
            Instruction::Deref => f.write_str("DEREF"),
            Instruction::PointerStore => f.write_str("PSTORE"),
            Instruction::Array(count) => write!(f, "ARRAY {count}"),
            Instruction::SetField(field) => write!(f, "SETFIELD {field}"),
            Instruction::Struct(count) => write_count(f, "STRUCT", *count),
            Instruction::MapInsert => f.write_str("MAP_INSERT"),
            Instruction::Map(count) => write_count(f, "MAP", *count),
            Instruction::SetAdd => f.write_str("SET_ADD"),
            Instruction::Set(count) => write_count(f, "SET", *count),
            Instruction::Neg => f.write_str("NEG"),
            Instruction::Binary(op) => f.write_str(binary_opcode(*op)),
            Instruction::JumpIfZero(label) => write!(f, "JZ {}", label.name),
            Instruction::Jump(label) => write!(f, "JMP {}", label.name),
            Instruction::Call { name, argc } => write!(f, "CALL {name} {argc}"),
            Instruction::Ret => f.write_str("RET"),
            Instruction::Pop => f.write_str("POP"),
            Instruction::Print => f.write_str("PRINT"),
            Instruction::Newline => f.write_str("NEWLINE"),
            Instruction::Enter => f.write_str("ENTER"),
            Instruction::Leave => f.write_str("LEAVE"),
            Instruction::End => f.write_str("END"),
        }
    }
}

/// One line of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Program(String),
    Func { name: String, params: Vec<String> },
    Main,
    Label(String),
    Op(Instruction),
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Program(name) => write!(f, "PROGRAM {name}"),
            Item::Func { name, params } => {
                write!(f, "FUNC {name}")?;
                for param in params {
                    write!(f, " {param}")?;
                }
                Ok(())
            }
            Item::Main => f.write_str("MAIN"),
            Item::Label(name) => write!(f, "{name}:"),
            Item::Op(instruction) => write!(f, "{instruction}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Listing {
    pub items: Vec<Item>,
}

impl Listing {
    pub fn lines(&self) -> Vec<String> {
        self.items.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, item) in self.items.iter().enumerate() {
            if position > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

impl FromStr for Listing {
    type Err = PcodeError;

    fn from_str(text: &str) -> PcodeResult<Self> {
        let mut items = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            items.push(decode_line(line, index + 1)?);
        }
        Ok(Listing { items })
    }
}

fn decode_line(line: &str, line_number: usize) -> PcodeResult<Item> {
    if let Some(label) = line.strip_suffix(':') {
        return Ok(Item::Label(label.trim().to_string()));
    }

    let mut parts = line.split_whitespace();
    let opcode = parts.next().unwrap_or_default();
    let operands: Vec<&str> = parts.collect();
    let decoder = OperandDecoder {
        opcode,
        operands: &operands,
        line: line_number,
    };

    let instruction = match opcode {
        "PROGRAM" => return Ok(Item::Program(decoder.name(0, "a program name")?)),
        "FUNC" => {
            let name = decoder.name(0, "a function name")?;
            let params = operands[1..].iter().map(|param| param.to_string()).collect();
            return Ok(Item::Func { name, params });
        }
        "MAIN" => return Ok(Item::Main),
        "PUSH" => Instruction::Push(decoder.number(0, "an integer")?),
        "LOAD" => Instruction::Load(decoder.name(0, "a variable name")?),
        "STORE" => Instruction::Store(decoder.name(0, "a variable name")?),
        "DECL" => Instruction::Decl(decoder.name(0, "a variable name")?),
        "DECL_ARR" => Instruction::DeclArray(decoder.name(0, "a variable name")?),
        "READ" => Instruction::Read(decoder.name(0, "a variable name")?),
        "ALOAD" => Instruction::ArrayLoad,
        "ASTORE" => Instruction::ArrayStore,
        "FLOAD" => Instruction::FieldLoad(decoder.name(0, "a field name")?),
        "FSTORE" => Instruction::FieldStore(decoder.name(0, "a field name")?),
        "ADDR" => Instruction::Addr(decoder.name(0, "a variable name")?),
        "AADDR" => Instruction::ArrayAddr,
        "FADDR" => Instruction::FieldAddr(decoder.name(0, "a field name")?),
        "DEREF" => Instruction::Deref,
        "PSTORE" => Instruction::PointerStore,
        "ARRAY" => Instruction::Array(decoder.count(0, "an element count")?),
        "SETFIELD" => Instruction::SetField(decoder.name(0, "a field name")?),
        "STRUCT" => Instruction::Struct(decoder.optional_count(0)?),
        "MAP_INSERT" => Instruction::MapInsert,
        "MAP" => Instruction::Map(decoder.optional_count(0)?),
        "SET_ADD" => Instruction::SetAdd,
        "SET" => Instruction::Set(decoder.optional_count(0)?),
        "NEG" => Instruction::Neg,
        "JZ" => Instruction::JumpIfZero(Label::new(decoder.name(0, "a label")?)),
        "JMP" => Instruction::Jump(Label::new(decoder.name(0, "a label")?)),
        "CALL" => Instruction::Call {
            name: decoder.name(0, "a function name")?,
            argc: decoder.count(1, "an argument count")?,
        },
        "RET" => Instruction::Ret,
        "POP" => Instruction::Pop,
        "PRINT" => Instruction::Print,
        "NEWLINE" => Instruction::Newline,
        "ENTER" => Instruction::Enter,
        "LEAVE" => Instruction::Leave,
        "END" => Instruction::End,
        other => match binary_from_opcode(other) {
            Some(op) => Instruction::Binary(op),
            None => {
                return Err(PcodeError::UnknownOpcode {
                    opcode: other.to_string(),
                    line: line_number,
                });
            }
        },
    };
    Ok(Item::Op(instruction))
}

struct OperandDecoder<'a> {
    opcode: &'a str,
    operands: &'a [&'a str],
    line: usize,
}

impl OperandDecoder<'_> {
    fn raw(&self, position: usize, expected: &'static str) -> PcodeResult<&str> {
        self.operands
            .get(position)
            .copied()
            .ok_or_else(|| PcodeError::MissingOperand {
                opcode: self.opcode.to_string(),
                expected,
                line: self.line,
            })
    }

    fn name(&self, position: usize, expected: &'static str) -> PcodeResult<String> {
        self.raw(position, expected).map(str::to_string)
    }

    fn number(&self, position: usize, expected: &'static str) -> PcodeResult<i64> {
        let operand = self.raw(position, expected)?;
        operand.parse().map_err(|_| self.invalid(operand))
    }

    fn count(&self, position: usize, expected: &'static str) -> PcodeResult<usize> {
        let operand = self.raw(position, expected)?;
        operand.parse().map_err(|_| self.invalid(operand))
    }

    fn optional_count(&self, position: usize) -> PcodeResult<Option<usize>> {
        match self.operands.get(position) {
            Some(operand) => operand.parse().map(Some).map_err(|_| self.invalid(operand)),
            None => Ok(None),
        }
    }

    fn invalid(&self, operand: &str) -> PcodeError {
        PcodeError::InvalidOperand {
            opcode: self.opcode.to_string(),
            operand: operand.to_string(),
            line: self.line,
        }
    }
}

/// Lowers `program` to p-code.
///
/// `if` branches and `while` iterations are bracketed by `ENTER`/`LEAVE`
/// so block-local declarations get a fresh frame, as in the interpreter.
pub fn generate(program: &Program) -> PcodeResult<Listing> {
    let mut generator = PcodeGenerator::default();
    generator.program(program)?;
    debug!("generated {} p-code items", generator.items.len());
    Ok(Listing {
        items: generator.items,
    })
}

#[derive(Default)]
struct PcodeGenerator {
    items: Vec<Item>,
    labels: usize,
}

impl PcodeGenerator {
    fn new_label(&mut self) -> String {
        self.labels += 1;
        format!("L{}", self.labels)
    }

    fn emit(&mut self, instruction: Instruction) {
        self.items.push(Item::Op(instruction));
    }

    fn place_label(&mut self, name: &str) {
        self.items.push(Item::Label(name.to_string()));
    }

    fn program(&mut self, program: &Program) -> PcodeResult<()> {
        self.items.push(Item::Program(program.name.clone()));
        for function in &program.functions {
            self.function(function)?;
        }
        self.items.push(Item::Main);
        self.block(&program.main)?;
        self.emit(Instruction::End);
        Ok(())
    }

    fn function(&mut self, function: &FuncDef) -> PcodeResult<()> {
        self.items.push(Item::Func {
            name: function.name.clone(),
            params: function.params.clone(),
        });
        self.block(&function.body)?;
        self.expression(&function.return_expr)?;
        self.emit(Instruction::Ret);
        Ok(())
    }

    fn block(&mut self, block: &StmtList) -> PcodeResult<()> {
        for statement in block {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn scoped_block(&mut self, block: &StmtList) -> PcodeResult<()> {
        self.emit(Instruction::Enter);
        self.block(block)?;
        self.emit(Instruction::Leave);
        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> PcodeResult<()> {
        match statement {
            Statement::Declare { name, size, init } => {
                // `<init> DECL x STORE x` keeps any outer `x` visible to the
                // initializer and still binds in the current frame.
                if let Some(init) = init {
                    self.expression(init)?;
                }
                match size {
                    Some(size) => {
                        self.expression(size)?;
                        self.emit(Instruction::DeclArray(name.clone()));
                    }
                    None => self.emit(Instruction::Decl(name.clone())),
                }
                if init.is_some() {
                    self.emit(Instruction::Store(name.clone()));
                }
            }
            Statement::Assign { target, value } => {
                self.expression(value)?;
                match target {
                    AssignTarget::Variable(name) => self.emit(Instruction::Store(name.clone())),
                    AssignTarget::Index { array, index } => {
                        self.expression(array)?;
                        self.expression(index)?;
                        self.emit(Instruction::ArrayStore);
                    }
                    AssignTarget::Field { object, field } => {
                        self.expression(object)?;
                        self.emit(Instruction::FieldStore(field.clone()));
                    }
                    AssignTarget::Deref(pointer) => {
                        self.expression(pointer)?;
                        self.emit(Instruction::PointerStore);
                    }
                }
            }
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                let else_label = self.new_label();
                let end_label = match else_body {
                    Some(_) => self.new_label(),
                    None => else_label.clone(),
                };
                self.expression(condition)?;
                self.emit(Instruction::JumpIfZero(Label::new(else_label.as_str())));
                self.scoped_block(then_body)?;
                if let Some(else_body) = else_body {
                    self.emit(Instruction::Jump(Label::new(end_label.as_str())));
                    self.place_label(&else_label);
                    self.scoped_block(else_body)?;
                }
                self.place_label(&end_label);
            }
            Statement::While { condition, body } => {
                let start = self.new_label();
                let end = self.new_label();
                self.place_label(&start);
                self.expression(condition)?;
                self.emit(Instruction::JumpIfZero(Label::new(end.as_str())));
                self.scoped_block(body)?;
                self.emit(Instruction::Jump(Label::new(start)));
                self.place_label(&end);
            }
            Statement::Input(names) => {
                for name in names {
                    self.emit(Instruction::Read(name.clone()));
                }
            }
            Statement::Output(values) => {
                for value in values {
                    self.expression(value)?;
                    self.emit(Instruction::Print);
                }
                self.emit(Instruction::Newline);
            }
            Statement::Call(call) => {
                self.call(call)?;
                self.emit(Instruction::Pop);
            }
        }
        Ok(())
    }

    fn expression(&mut self, expression: &Expression) -> PcodeResult<()> {
        match expression {
            Expression::Number(value) => self.emit(Instruction::Push(*value)),
            Expression::Identifier(name) => self.emit(Instruction::Load(name.clone())),
            Expression::ArrayAccess { array, index } => {
                self.expression(array)?;
                self.expression(index)?;
                self.emit(Instruction::ArrayLoad);
            }
            Expression::FieldAccess { object, field } => {
                self.expression(object)?;
                self.emit(Instruction::FieldLoad(field.clone()));
            }
            Expression::Unary { op, operand } => match op {
                UnaryOperator::Plus => self.expression(operand)?,
                UnaryOperator::Minus => {
                    self.expression(operand)?;
                    self.emit(Instruction::Neg);
                }
                UnaryOperator::Deref => {
                    self.expression(operand)?;
                    self.emit(Instruction::Deref);
                }
                UnaryOperator::AddressOf => self.address_of(operand)?,
            },
            Expression::Binary { left, op, right } => {
                self.expression(left)?;
                self.expression(right)?;
                self.emit(Instruction::Binary(*op));
            }
            Expression::Call(call) => self.call(call)?,
            Expression::ArrayLiteral(elements) => {
                for element in elements {
                    self.expression(element)?;
                }
                self.emit(Instruction::Array(elements.len()));
            }
            Expression::StructLiteral(fields) => {
                for (field, value) in fields {
                    self.expression(value)?;
                    self.emit(Instruction::SetField(field.clone()));
                }
                self.emit(Instruction::Struct(Some(fields.len())));
            }
            Expression::MapLiteral(pairs) => {
                for (key, value) in pairs {
                    self.expression(key)?;
                    self.expression(value)?;
                    self.emit(Instruction::MapInsert);
                }
                self.emit(Instruction::Map(Some(pairs.len())));
            }
            Expression::SetLiteral(elements) => {
                for element in elements {
                    self.expression(element)?;
                    self.emit(Instruction::SetAdd);
                }
                self.emit(Instruction::Set(Some(elements.len())));
            }
        }
        Ok(())
    }

    fn address_of(&mut self, operand: &Expression) -> PcodeResult<()> {
        match operand {
            Expression::Identifier(name) => self.emit(Instruction::Addr(name.clone())),
            Expression::ArrayAccess { array, index } => {
                self.expression(array)?;
                self.expression(index)?;
                self.emit(Instruction::ArrayAddr);
            }
            Expression::FieldAccess { object, field } => {
                self.expression(object)?;
                self.emit(Instruction::FieldAddr(field.clone()));
            }
            _ => return Err(PcodeError::InvalidAddressOperand),
        }
        Ok(())
    }

    fn call(&mut self, call: &Call) -> PcodeResult<()> {
        for arg in &call.args {
            self.expression(arg)?;
        }
        self.emit(Instruction::Call {
            name: call.name.clone(),
            argc: call.args.len(),
        });
        Ok(())
    }
}
