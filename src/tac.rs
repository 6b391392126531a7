//! Three-address code generator.
//!
//! Every operator application and every call gets a fresh temporary `tN`;
//! control flow lowers to `if_false`/`goto` over labels `LN`. Both counters
//! run for the whole program, so no name is reused.

use crate::ast::{AssignTarget, Call, Expression, FuncDef, Program, Statement, StmtList};

pub fn generate(program: &Program) -> Vec<String> {
    let mut generator = TacGenerator::default();
    generator.program(program);
    generator.lines
}

#[derive(Default)]
struct TacGenerator {
    lines: Vec<String>,
    temporaries: usize,
    labels: usize,
}

impl TacGenerator {
    fn new_temp(&mut self) -> String {
        self.temporaries += 1;
        format!("t{}", self.temporaries)
    }

    fn new_label(&mut self) -> String {
        self.labels += 1;
        format!("L{}", self.labels)
    }

    fn emit(&mut self, line: String) {
        self.lines.push(line);
    }

    fn program(&mut self, program: &Program) {
        self.emit(format!("program {}", program.name));
        for function in &program.functions {
            self.function(function);
        }
        self.emit("main:".to_string());
        self.block(&program.main);
        self.emit("end".to_string());
    }

    fn function(&mut self, function: &FuncDef) {
        self.emit(format!("func {}:", function.name));
        self.block(&function.body);
        let result = self.expression(&function.return_expr);
        self.emit(format!("return {result}"));
    }

    fn block(&mut self, block: &StmtList) {
        for statement in block {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Declare { name, size, init } => {
                let initial = init.as_ref().map(|init| self.expression(init));
                match size {
                    Some(size) => {
                        let size = self.expression(size);
                        self.emit(format!("{name} = [0] x {size}"));
                    }
                    None if initial.is_none() => self.emit(format!("{name} = 0")),
                    None => {}
                }
                if let Some(initial) = initial {
                    self.emit(format!("{name} = {initial}"));
                }
            }
            Statement::Assign { target, value } => {
                let value = self.expression(value);
                let target = match target {
                    AssignTarget::Variable(name) => name.clone(),
                    AssignTarget::Index { array, index } => {
                        let array = self.expression(array);
                        let index = self.expression(index);
                        format!("{array}[{index}]")
                    }
                    AssignTarget::Field { object, field } => {
                        format!("{}.{field}", self.expression(object))
                    }
                    AssignTarget::Deref(pointer) => format!("*{}", self.expression(pointer)),
                };
                self.emit(format!("{target} = {value}"));
            }
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                let condition = self.expression(condition);
                let else_label = self.new_label();
                let end_label = match else_body {
                    Some(_) => self.new_label(),
                    None => else_label.clone(),
                };
                self.emit(format!("if_false {condition} goto {else_label}"));
                self.block(then_body);
                if let Some(else_body) = else_body {
                    self.emit(format!("goto {end_label}"));
                    self.emit(format!("{else_label}:"));
                    self.block(else_body);
                }
                self.emit(format!("{end_label}:"));
            }
            Statement::While { condition, body } => {
                let start = self.new_label();
                let end = self.new_label();
                self.emit(format!("{start}:"));
                let condition = self.expression(condition);
                self.emit(format!("if_false {condition} goto {end}"));
                self.block(body);
                self.emit(format!("goto {start}"));
                self.emit(format!("{end}:"));
            }
            Statement::Input(names) => {
                for name in names {
                    self.emit(format!("input {name}"));
                }
            }
            Statement::Output(values) => {
                let values = self.expression_list(values);
                self.emit(format!("print {values}"));
            }
            Statement::Call(call) => {
                self.call(call);
            }
        }
    }

    /// Lowers `expression` and returns the operand naming its value.
    fn expression(&mut self, expression: &Expression) -> String {
        match expression {
            Expression::Number(value) => value.to_string(),
            Expression::Identifier(name) => name.clone(),
            Expression::ArrayAccess { array, index } => {
                let array = self.expression(array);
                let index = self.expression(index);
                format!("{array}[{index}]")
            }
            Expression::FieldAccess { object, field } => {
                format!("{}.{field}", self.expression(object))
            }
            Expression::Unary { op, operand } => {
                let operand = self.expression(operand);
                let temp = self.new_temp();
                self.emit(format!("{temp} = {}{operand}", op.symbol()));
                temp
            }
            Expression::Binary { left, op, right } => {
                let left = self.expression(left);
                let right = self.expression(right);
                let temp = self.new_temp();
                self.emit(format!("{temp} = {left} {} {right}", op.symbol()));
                temp
            }
            Expression::Call(call) => self.call(call),
            Expression::ArrayLiteral(elements) => format!("[{}]", self.expression_list(elements)),
            Expression::StructLiteral(fields) => {
                let mut parts = Vec::with_capacity(fields.len());
                for (name, value) in fields {
                    parts.push(format!("{name}={}", self.expression(value)));
                }
                format!("struct{{{}}}", parts.join(", "))
            }
            Expression::MapLiteral(pairs) => {
                let mut parts = Vec::with_capacity(pairs.len());
                for (key, value) in pairs {
                    let key = self.expression(key);
                    let value = self.expression(value);
                    parts.push(format!("{key}:{value}"));
                }
                format!("map{{{}}}", parts.join(", "))
            }
            Expression::SetLiteral(elements) => format!("set{{{}}}", self.expression_list(elements)),
        }
    }

    fn call(&mut self, call: &Call) -> String {
        let args = self.expression_list(&call.args);
        let temp = self.new_temp();
        self.emit(format!("{temp} = call {}({args})", call.name));
        temp
    }

    fn expression_list(&mut self, values: &[Expression]) -> String {
        let mut operands = Vec::with_capacity(values.len());
        for value in values {
            operands.push(self.expression(value));
        }
        operands.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use indoc::indoc;

    #[test]
    fn lowers_functions_and_loops() {
        let program = parse(indoc! {"
            program sum {
                func twice(a) {
                    let b = a * 2;
                    return b;
                }
                main {
                    let n;
                    let total = 0;
                    input(n);
                    while (n > 0) {
                        total = total + twice(n);
                        n = n - 1;
                    };
                    output(total);
                }
            }
        "})
        .expect("parse failed");

        assert_eq!(
            generate(&program),
            vec![
                "program sum",
                "func twice:",
                "t1 = a * 2",
                "b = t1",
                "return b",
                "main:",
                "n = 0",
                "total = 0",
                "input n",
                "L1:",
                "t2 = n > 0",
                "if_false t2 goto L2",
                "t3 = call twice(n)",
                "t4 = total + t3",
                "total = t4",
                "t5 = n - 1",
                "n = t5",
                "goto L1",
                "L2:",
                "print total",
                "end",
            ]
        );
    }

    #[test]
    fn if_else_uses_distinct_labels() {
        let program = parse(indoc! {"
            program p {
                main {
                    let arr[2];
                    if (arr[0] == 0) {
                        arr[1] = -1;
                    } else {
                        *q = 2;
                    };
                    if (1 < 2) {
                        output(1);
                    };
                }
            }
        "})
        .expect("parse failed");

        assert_eq!(
            generate(&program),
            vec![
                "program p",
                "main:",
                "arr = [0] x 2",
                "t1 = arr[0] == 0",
                "if_false t1 goto L1",
                "t2 = -1",
                "arr[1] = t2",
                "goto L2",
                "L1:",
                "*q = 2",
                "L2:",
                "t3 = 1 < 2",
                "if_false t3 goto L3",
                "print 1",
                "L3:",
                "end",
            ]
        );
    }
}
