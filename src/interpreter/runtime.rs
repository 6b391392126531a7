use indexmap::{IndexMap, IndexSet};
use log::trace;
use rustc_hash::FxHashMap;

use crate::ast::{AssignTarget, Call, Expression, FuncDef, Statement, StmtList, UnaryOperator};
use crate::builtins::BuiltinFunction;
use crate::runtime::value::binary;
use crate::runtime::{Environment, InputSource, Key, Pointer, RuntimeError, Value};

type RuntimeResult<T> = Result<T, RuntimeError>;

/// Runtime executor for interpreted statements and expressions.
///
/// Every `if` branch and every `while` iteration runs in a fresh child frame,
/// and a call frame is parented on the caller's innermost frame.
pub(super) struct InterpreterRuntime<'a> {
    pub(super) functions: &'a FxHashMap<String, FuncDef>,
    pub(super) input: InputSource,
    pub(super) output: Vec<String>,
    /// Values printed since the last completed `output` statement. A callee
    /// that prints mid-statement finishes this line early.
    pub(super) line: Vec<String>,
}

impl InterpreterRuntime<'_> {
    pub(super) fn exec_block(
        &mut self,
        body: &StmtList,
        environment: &Environment,
    ) -> RuntimeResult<()> {
        for statement in body {
            self.exec_statement(statement, environment)?;
        }
        Ok(())
    }

    fn exec_statement(
        &mut self,
        statement: &Statement,
        environment: &Environment,
    ) -> RuntimeResult<()> {
        match statement {
            Statement::Declare { name, size, init } => {
                // The initializer sees any outer binding of `name`.
                let initial = match init {
                    Some(init) => Some(self.eval_expression(init, environment)?),
                    None => None,
                };
                let value = match size {
                    Some(size) => Value::zeroed_array(&self.eval_expression(size, environment)?)?,
                    None => Value::Integer(0),
                };
                environment.define(name.clone(), initial.unwrap_or(value));
            }
            Statement::Assign { target, value } => {
                let value = self.eval_expression(value, environment)?;
                match target {
                    AssignTarget::Variable(name) => environment.assign(name, value),
                    AssignTarget::Index { array, index } => {
                        let container = self.eval_expression(array, environment)?;
                        let index = self.eval_expression(index, environment)?;
                        container.store_index(&index, value)?;
                    }
                    AssignTarget::Field { object, field } => {
                        let object = self.eval_expression(object, environment)?;
                        object.store_field(field, value)?;
                    }
                    AssignTarget::Deref(pointer) => {
                        self.eval_expression(pointer, environment)?
                            .store_through(value)?;
                    }
                }
            }
            Statement::If {
                condition,
                then_body,
                else_body,
            } => {
                if self.eval_expression(condition, environment)?.is_true()? {
                    self.exec_block(then_body, &environment.child())?;
                } else if let Some(else_body) = else_body {
                    self.exec_block(else_body, &environment.child())?;
                }
            }
            Statement::While { condition, body } => {
                while self.eval_expression(condition, environment)?.is_true()? {
                    self.exec_block(body, &environment.child())?;
                }
            }
            Statement::Input(names) => {
                for name in names {
                    let value = self.input.read_integer(name)?;
                    environment.assign(name, Value::Integer(value));
                }
            }
            Statement::Output(expressions) => {
                for expression in expressions {
                    let value = self.eval_expression(expression, environment)?;
                    self.line.push(value.to_string());
                }
                self.output.push(self.line.join(" "));
                self.line.clear();
            }
            Statement::Call(call) => {
                self.eval_call(call, environment)?;
            }
        }
        Ok(())
    }

    fn eval_expression(
        &mut self,
        expression: &Expression,
        environment: &Environment,
    ) -> RuntimeResult<Value> {
        match expression {
            Expression::Number(value) => Ok(Value::Integer(*value)),
            Expression::Identifier(name) => environment.get(name),
            Expression::ArrayAccess { array, index } => {
                let container = self.eval_expression(array, environment)?;
                let index = self.eval_expression(index, environment)?;
                container.index(&index)
            }
            Expression::FieldAccess { object, field } => {
                self.eval_expression(object, environment)?.field(field)
            }
            Expression::Unary { op, operand } => match op {
                UnaryOperator::Plus => self.eval_expression(operand, environment),
                UnaryOperator::Minus => self.eval_expression(operand, environment)?.negate(),
                UnaryOperator::Deref => self.eval_expression(operand, environment)?.dereference(),
                UnaryOperator::AddressOf => self
                    .address_of(operand, environment)
                    .map(Value::Pointer),
            },
            Expression::Binary { left, op, right } => {
                let left = self.eval_expression(left, environment)?;
                let right = self.eval_expression(right, environment)?;
                binary(*op, &left, &right)
            }
            Expression::Call(call) => self.eval_call(call, environment),
            Expression::ArrayLiteral(elements) => {
                let values = self.eval_arguments(elements, environment)?;
                Ok(Value::array(values))
            }
            Expression::StructLiteral(fields) => {
                let mut entries = IndexMap::with_capacity(fields.len());
                for (field, value) in fields {
                    let value = self.eval_expression(value, environment)?;
                    entries.insert(Key::Name(field.clone()), value);
                }
                Ok(Value::mapping(entries))
            }
            Expression::MapLiteral(pairs) => {
                let mut entries = IndexMap::with_capacity(pairs.len());
                for (key, value) in pairs {
                    let key = self.eval_expression(key, environment)?;
                    let value = self.eval_expression(value, environment)?;
                    entries.insert(key.to_key()?, value);
                }
                Ok(Value::mapping(entries))
            }
            Expression::SetLiteral(elements) => {
                let mut items = IndexSet::with_capacity(elements.len());
                for element in elements {
                    items.insert(self.eval_expression(element, environment)?.to_key()?);
                }
                Ok(Value::set(items))
            }
        }
    }

    fn address_of(
        &mut self,
        operand: &Expression,
        environment: &Environment,
    ) -> RuntimeResult<Pointer> {
        match operand {
            Expression::Identifier(name) => Ok(Pointer::Variable {
                frame: environment.resolve(name)?,
                name: name.clone(),
            }),
            Expression::ArrayAccess { array, index } => {
                let container = self.eval_expression(array, environment)?;
                let index = self.eval_expression(index, environment)?;
                container.element_pointer(&index)
            }
            Expression::FieldAccess { object, field } => {
                self.eval_expression(object, environment)?
                    .field_pointer(field)
            }
            _ => Err(RuntimeError::InvalidAddressOperand),
        }
    }

    fn eval_arguments(
        &mut self,
        args: &[Expression],
        environment: &Environment,
    ) -> RuntimeResult<Vec<Value>> {
        args.iter()
            .map(|arg| self.eval_expression(arg, environment))
            .collect()
    }

    fn eval_call(&mut self, call: &Call, environment: &Environment) -> RuntimeResult<Value> {
        // Arguments are evaluated before the callee is resolved, matching the
        // order the p-code VM observes.
        let args = self.eval_arguments(&call.args, environment)?;
        if let Some(builtin) = BuiltinFunction::from_name(&call.name) {
            return builtin.call(args);
        }

        let functions = self.functions;
        let function = functions.get(&call.name).ok_or_else(|| {
            RuntimeError::UndefinedFunction {
                name: call.name.clone(),
            }
        })?;
        RuntimeError::expect_function_arity(&function.name, function.params.len(), args.len())?;

        let frame = environment.child();
        for (param, value) in function.params.iter().zip(args) {
            frame.define(param.clone(), value);
        }
        trace!("call {} depth={}", function.name, frame.depth());
        self.exec_block(&function.body, &frame)?;
        self.eval_expression(&function.return_expr, &frame)
    }
}
