//! Indented structural dump of a parsed program.

use crate::ast::{AssignTarget, Call, Expression, FuncDef, Program, Statement, StmtList};

const INDENT: usize = 2;

pub fn dump_program(program: &Program) -> Vec<String> {
    let mut lines = vec![format!("Program({})", program.name)];
    for function in &program.functions {
        dump_function(function, INDENT, &mut lines);
    }
    lines.push("main:".to_string());
    dump_block(&program.main, INDENT, &mut lines);
    lines
}

fn dump_function(function: &FuncDef, indent: usize, lines: &mut Vec<String>) {
    let pad = " ".repeat(indent);
    lines.push(format!(
        "{pad}FuncDef({} params=[{}])",
        function.name,
        function.params.join(", ")
    ));
    dump_block(&function.body, indent + INDENT, lines);
    lines.push(format!("{pad}return:"));
    lines.push(format!(
        "{}{}",
        " ".repeat(indent + INDENT),
        render(&function.return_expr)
    ));
}

fn dump_block(block: &StmtList, indent: usize, lines: &mut Vec<String>) {
    for statement in block {
        dump_statement(statement, indent, lines);
    }
}

fn dump_statement(statement: &Statement, indent: usize, lines: &mut Vec<String>) {
    let pad = " ".repeat(indent);
    match statement {
        Statement::Declare { name, size, init } => {
            let mut line = format!("{pad}Declare {name}");
            if let Some(size) = size {
                line.push_str(&format!("[{}]", render(size)));
            }
            if let Some(init) = init {
                line.push_str(&format!(" = {}", render(init)));
            }
            lines.push(line);
        }
        Statement::Assign { target, value } => {
            lines.push(format!("{pad}{} = {}", render_target(target), render(value)));
        }
        Statement::If {
            condition,
            then_body,
            else_body,
        } => {
            lines.push(format!("{pad}if {}:", render(condition)));
            dump_block(then_body, indent + INDENT, lines);
            if let Some(else_body) = else_body {
                lines.push(format!("{pad}else:"));
                dump_block(else_body, indent + INDENT, lines);
            }
        }
        Statement::While { condition, body } => {
            lines.push(format!("{pad}while {}:", render(condition)));
            dump_block(body, indent + INDENT, lines);
        }
        Statement::Input(names) => lines.push(format!("{pad}input {}", names.join(", "))),
        Statement::Output(values) => lines.push(format!("{pad}output {}", render_list(values))),
        Statement::Call(call) => lines.push(format!("{pad}{}", render_call(call))),
    }
}

fn render_target(target: &AssignTarget) -> String {
    match target {
        AssignTarget::Variable(name) => name.clone(),
        AssignTarget::Index { array, index } => format!("{}[{}]", render(array), render(index)),
        AssignTarget::Field { object, field } => format!("{}.{field}", render(object)),
        AssignTarget::Deref(pointer) => format!("*{}", render(pointer)),
    }
}

fn render(expression: &Expression) -> String {
    match expression {
        Expression::Number(value) => value.to_string(),
        Expression::Identifier(name) => name.clone(),
        Expression::ArrayAccess { array, index } => format!("{}[{}]", render(array), render(index)),
        Expression::FieldAccess { object, field } => format!("{}.{field}", render(object)),
        Expression::Unary { op, operand } => format!("{}{}", op.symbol(), render(operand)),
        Expression::Binary { left, op, right } => {
            format!("({} {} {})", render(left), op.symbol(), render(right))
        }
        Expression::Call(call) => render_call(call),
        Expression::ArrayLiteral(elements) => format!("[{}]", render_list(elements)),
        Expression::StructLiteral(fields) => {
            let fields = fields
                .iter()
                .map(|(name, value)| format!("{name}={}", render(value)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("struct{{{fields}}}")
        }
        Expression::MapLiteral(pairs) => {
            let pairs = pairs
                .iter()
                .map(|(key, value)| format!("{}:{}", render(key), render(value)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("map{{{pairs}}}")
        }
        Expression::SetLiteral(elements) => format!("set{{{}}}", render_list(elements)),
    }
}

fn render_call(call: &Call) -> String {
    format!("{}({})", call.name, render_list(&call.args))
}

fn render_list(values: &[Expression]) -> String {
    values.iter().map(render).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use indoc::indoc;

    #[test]
    fn dumps_functions_and_nested_blocks() {
        let program = parse(indoc! {"
            program demo {
                func add(a, b) {
                    let c = a + b;
                    return c;
                }
                main {
                    let arr[3];
                    let x = add(1, -2);
                    if (x < 3) {
                        output(x, arr[0]);
                    } else {
                        *p = &arr[1];
                    };
                    while (x > 0) {
                        input(x);
                    };
                }
            }
        "})
        .expect("parse failed");

        assert_eq!(
            dump_program(&program),
            vec![
                "Program(demo)",
                "  FuncDef(add params=[a, b])",
                "    Declare c = (a + b)",
                "  return:",
                "    c",
                "main:",
                "  Declare arr[3]",
                "  Declare x = add(1, -2)",
                "  if (x < 3):",
                "    output x, arr[0]",
                "  else:",
                "    *p = &arr[1]",
                "  while (x > 0):",
                "    input x",
            ]
        );
    }
}
