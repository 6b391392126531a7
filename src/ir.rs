//! Structured IR printer.
//!
//! Re-emits the program as fully parenthesised block-structured text. The
//! output depends only on the AST, so printing the same tree twice yields the
//! same listing.

use crate::ast::{AssignTarget, Call, Expression, FuncDef, Program, Statement, StmtList};

const INDENT: usize = 2;

pub fn generate(program: &Program) -> Vec<String> {
    let mut printer = IrPrinter { lines: Vec::new() };
    printer.program(program);
    printer.lines
}

struct IrPrinter {
    lines: Vec<String>,
}

impl IrPrinter {
    fn emit(&mut self, indent: usize, line: String) {
        self.lines.push(format!("{}{line}", " ".repeat(indent)));
    }

    fn program(&mut self, program: &Program) {
        self.emit(0, format!("program {} {{", program.name));
        for function in &program.functions {
            self.function(function);
        }
        self.emit(0, "main {".to_string());
        self.block(&program.main, INDENT);
        self.emit(0, "}".to_string());
        self.emit(0, "}".to_string());
    }

    fn function(&mut self, function: &FuncDef) {
        self.emit(
            0,
            format!("func {}({}) {{", function.name, function.params.join(", ")),
        );
        self.block(&function.body, INDENT);
        self.emit(INDENT, format!("return {};", expression(&function.return_expr)));
        self.emit(0, "}".to_string());
    }

    fn block(&mut self, block: &StmtList, indent: usize) {
        for statement in block {
            self.statement(statement, indent);
        }
    }

    fn statement(&mut self, statement: &Statement, indent: usize) {
        match statement {
            Statement::Declare { name, size, init } => {
                let mut line = format!("let {name}");
                if let Some(size) = size {
                    line.push_str(&format!("[{}]", expression(size)));
                }
                if let Some(init) = init {
                    line.push_str(&format!(" = {}", expression(init)));
                }
                self.emit(indent, line);
            }
            Statement::Assign { target, value } => {
                let target = match target {
                    AssignTarget::Variable(name) => name.clone(),
                    AssignTarget::Index { array, index } => {
                        format!("{}[{}]", expression(array), expression(index))
                    }
                    AssignTarget::Field { object, field } => {
                        format!("{}.{field}", expression(object))
                    }
                    AssignTarget::Deref(pointer) => format!("(*{})", expression(pointer)),
                };
                self.emit(indent, format!("{target} = {}", expression(value)));
            }
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                self.emit(indent, format!("if {} {{", expression(condition)));
                self.block(then_body, indent + INDENT);
                if let Some(else_body) = else_body {
                    self.emit(indent, "} else {".to_string());
                    self.block(else_body, indent + INDENT);
                }
                self.emit(indent, "}".to_string());
            }
            Statement::While { condition, body } => {
                self.emit(indent, format!("while {} {{", expression(condition)));
                self.block(body, indent + INDENT);
                self.emit(indent, "}".to_string());
            }
            Statement::Input(names) => self.emit(indent, format!("input {}", names.join(", "))),
            Statement::Output(values) => {
                self.emit(indent, format!("output {}", expression_list(values)))
            }
            Statement::Call(call) => self.emit(indent, call_expression(call)),
        }
    }
}

fn expression(expression_node: &Expression) -> String {
    match expression_node {
        Expression::Number(value) => value.to_string(),
        Expression::Identifier(name) => name.clone(),
        Expression::ArrayAccess { array, index } => {
            format!("{}[{}]", expression(array), expression(index))
        }
        Expression::FieldAccess { object, field } => format!("{}.{field}", expression(object)),
        Expression::Unary { op, operand } => format!("({}{})", op.symbol(), expression(operand)),
        Expression::Binary { left, op, right } => {
            format!("({} {} {})", expression(left), op.symbol(), expression(right))
        }
        Expression::Call(call) => call_expression(call),
        Expression::ArrayLiteral(elements) => format!("[{}]", expression_list(elements)),
        Expression::StructLiteral(fields) => {
            let fields = fields
                .iter()
                .map(|(name, value)| format!("{name}={}", expression(value)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("struct{{{fields}}}")
        }
        Expression::MapLiteral(pairs) => {
            let pairs = pairs
                .iter()
                .map(|(key, value)| format!("{}:{}", expression(key), expression(value)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("map{{{pairs}}}")
        }
        Expression::SetLiteral(elements) => format!("set{{{}}}", expression_list(elements)),
    }
}

fn call_expression(call: &Call) -> String {
    format!("{}({})", call.name, expression_list(&call.args))
}

fn expression_list(values: &[Expression]) -> String {
    values.iter().map(expression).collect::<Vec<_>>().join(", ")
}
