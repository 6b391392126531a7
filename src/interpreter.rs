use anyhow::Result;
use log::debug;
use rustc_hash::FxHashMap;

use crate::ast::{FuncDef, Program, StmtList};
use crate::backend::{Backend, PreparedBackend};
use crate::runtime::{Environment, InputSource};

mod error;
mod runtime;

pub use error::InterpreterError;
use runtime::InterpreterRuntime;

/// AST-walking backend that executes programs directly without compilation.
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Prepared executable program for the tree-walking interpreter.
pub struct PreparedInterpreter {
    functions: FxHashMap<String, FuncDef>,
    main: StmtList,
}

impl PreparedInterpreter {
    fn run_once(&self, input: InputSource) -> std::result::Result<String, InterpreterError> {
        // Execution pipeline:
        // run_once -> exec_block (main body) -> exec_statement
        // -> eval_expression -> eval_call -> exec_block (function body).
        let globals = Environment::new();
        let mut runtime = InterpreterRuntime {
            functions: &self.functions,
            input,
            output: Vec::new(),
            line: Vec::new(),
        };
        runtime.exec_block(&self.main, &globals)?;
        Ok(runtime.output.join("\n"))
    }
}

impl PreparedBackend for PreparedInterpreter {
    fn run(&self, input: InputSource) -> Result<String> {
        Ok(self.run_once(input)?)
    }
}

impl Backend for Interpreter {
    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>> {
        let mut functions = FxHashMap::default();
        for function in &program.functions {
            if functions.contains_key(&function.name) {
                return Err(InterpreterError::DuplicateFunction {
                    name: function.name.clone(),
                }
                .into());
            }
            functions.insert(function.name.clone(), function.clone());
        }
        debug!(
            "interpreter prepared program '{}' with {} functions",
            program.name,
            functions.len()
        );

        Ok(Box::new(PreparedInterpreter {
            functions,
            main: program.main.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::runtime::RuntimeError;
    use indoc::indoc;

    fn run_source(source: &str, input: &str) -> anyhow::Result<String> {
        let program = parse(source)?;
        Interpreter::new().run(&program, InputSource::from_text(input))
    }

    fn expect_runtime_error(error: anyhow::Error) -> RuntimeError {
        match error
            .downcast::<InterpreterError>()
            .expect("expected InterpreterError")
        {
            InterpreterError::Runtime(error) => error,
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn evaluates_function_call() {
        let source = indoc! {"
            program p {
                func add(a, b) {
                    let c = a + b;
                    return c;
                }
                main {
                    let x = add(1, 2);
                    output(x);
                }
            }
        "};
        assert_eq!(run_source(source, "").expect("run failed"), "3");
    }

    #[test]
    fn sums_input_with_while_loop() {
        let source = indoc! {"
            program sum {
                main {
                    let n;
                    let i = 1;
                    let total = 0;
                    input(n);
                    while (i <= n) {
                        total = total + i;
                        i = i + 1;
                    };
                    output(total);
                }
            }
        "};
        assert_eq!(run_source(source, "5").expect("run failed"), "15");
    }

    #[test]
    fn floor_divides_negative_operands() {
        let source = indoc! {"
            program p {
                main {
                    output((-7) / 2, 7 / 2, 7 / (-2), -7 / 2);
                }
            }
        "};
        assert_eq!(run_source(source, "").expect("run failed"), "-4 3 -4 -3");
    }

    #[test]
    fn loop_body_declarations_reset_each_iteration() {
        let source = indoc! {"
            program p {
                main {
                    let i = 0;
                    let v = 5;
                    while (i < 3) {
                        let seen;
                        let v = v + 1;
                        output(seen, v);
                        seen = 5;
                        i = i + 1;
                    };
                    output(v);
                }
            }
        "};
        assert_eq!(
            run_source(source, "").expect("run failed"),
            "0 6\n0 6\n0 6\n5"
        );
    }

    #[test]
    fn callee_output_completes_pending_line() {
        let source = indoc! {"
            program p {
                func f(a) {
                    output(5);
                    return a;
                }
                main {
                    output(1, f(2));
                    output(3);
                }
            }
        "};
        assert_eq!(run_source(source, "").expect("run failed"), "1 5\n2\n3");
    }

    #[test]
    fn pointers_alias_variables_elements_and_fields() {
        let source = indoc! {"
            program p {
                main {
                    let x = 1;
                    let p = &x;
                    *p = 7;
                    let arr[2];
                    let q = &arr[1];
                    *q = 4;
                    let s = struct { f = 1 };
                    let r = &s.f;
                    *r = 9;
                    output(x, arr, s.f, *q);
                }
            }
        "};
        assert_eq!(run_source(source, "").expect("run failed"), "7 [0, 4] 9 4");
    }

    #[test]
    fn builtins_take_precedence_over_user_functions() {
        let source = indoc! {"
            program p {
                func map_get(m, k) {
                    let unused = 0;
                    return 99;
                }
                main {
                    let m = map { 1: 10 };
                    output(map_get(m, 1), map_get(m, 2));
                }
            }
        "};
        assert_eq!(run_source(source, "").expect("run failed"), "10 0");
    }

    #[test]
    fn callee_sees_caller_locals() {
        let source = indoc! {"
            program p {
                func peek() {
                    let seen = hidden;
                    return seen;
                }
                main {
                    let hidden = 42;
                    output(peek());
                }
            }
        "};
        assert_eq!(run_source(source, "").expect("run failed"), "42");
    }

    #[test]
    fn assignment_updates_outer_frame_from_branch() {
        let source = indoc! {"
            program p {
                main {
                    let x = 1;
                    if (x == 1) {
                        x = 2;
                        let y = 3;
                    } else {
                        x = 0;
                    };
                    output(x);
                }
            }
        "};
        assert_eq!(run_source(source, "").expect("run failed"), "2");
    }

    #[test]
    fn errors_on_undefined_function_and_arity_mismatch() {
        let missing = indoc! {"
            program p { main { missing(); } }
        "};
        let error = expect_runtime_error(run_source(missing, "").expect_err("expected failure"));
        assert_eq!(
            error,
            RuntimeError::UndefinedFunction {
                name: "missing".to_string()
            }
        );

        let arity = indoc! {"
            program p {
                func one(a) { let b = a; return b; }
                main { one(1, 2); }
            }
        "};
        let error = expect_runtime_error(run_source(arity, "").expect_err("expected failure"));
        assert_eq!(
            error,
            RuntimeError::FunctionArityMismatch {
                name: "one".to_string(),
                expected: 1,
                found: 2,
            }
        );
    }

    #[test]
    fn errors_on_division_by_zero_and_bad_dereference() {
        let division = indoc! {"
            program p { main { output(1 / 0); } }
        "};
        let error = expect_runtime_error(run_source(division, "").expect_err("expected failure"));
        assert_eq!(error, RuntimeError::DivisionByZero);

        let deref = indoc! {"
            program p { main { let x = 1; output(*x); } }
        "};
        let error = expect_runtime_error(run_source(deref, "").expect_err("expected failure"));
        assert_eq!(
            error,
            RuntimeError::NonPointerDereference {
                type_name: "integer"
            }
        );
    }

    #[test]
    fn rejects_duplicate_functions() {
        let source = indoc! {"
            program p {
                func f() { let a = 1; return a; }
                func f() { let b = 2; return b; }
                main { f(); }
            }
        "};
        let program = parse(source).expect("parse failed");
        let error = Interpreter::new()
            .prepare(&program)
            .err()
            .expect("expected duplicate failure");
        assert_eq!(error.to_string(), "Duplicate function definition 'f'");
    }

    #[test]
    fn clears_state_between_runs() {
        let source = indoc! {"
            program p {
                main {
                    let n;
                    input(n);
                    output(n * 2);
                }
            }
        "};
        let program = parse(source).expect("parse failed");
        let prepared = Interpreter::new().prepare(&program).expect("prepare failed");
        assert_eq!(
            prepared.run(InputSource::from_text("2")).expect("run failed"),
            "4"
        );
        assert_eq!(
            prepared.run(InputSource::from_text("5")).expect("run failed"),
            "10"
        );
    }
}
