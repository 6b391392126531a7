use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::runtime::error::RuntimeError;
use crate::runtime::value::Value;

/// Chain of variable frames.
///
/// Frames are reference counted so that pointers to variables keep their
/// frame alive after the owning call or block has finished.
#[derive(Clone, Default)]
pub struct Environment {
    frame: Rc<RefCell<Frame>>,
}

#[derive(Default)]
struct Frame {
    values: IndexMap<String, Value>,
    parent: Option<Environment>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self {
            frame: Rc::new(RefCell::new(Frame {
                values: IndexMap::new(),
                parent: Some(self.clone()),
            })),
        }
    }

    pub fn parent(&self) -> Option<Environment> {
        self.frame.borrow().parent.clone()
    }

    /// Binds `name` in this frame, shadowing any outer binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.frame.borrow_mut().values.insert(name.into(), value);
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.frame.borrow().values.get(name).cloned()
    }

    pub fn get(&self, name: &str) -> Result<Value, RuntimeError> {
        self.resolve(name)?
            .get_local(name)
            .ok_or_else(|| undefined(name))
    }

    /// Nearest frame, starting at this one, that defines `name`.
    pub fn resolve(&self, name: &str) -> Result<Environment, RuntimeError> {
        let mut current = Some(self.clone());
        while let Some(environment) = current {
            if environment.frame.borrow().values.contains_key(name) {
                return Ok(environment);
            }
            current = environment.parent();
        }
        Err(undefined(name))
    }

    /// Overwrites the nearest existing binding of `name`, or defines it in
    /// this frame when no frame on the chain has it.
    pub fn assign(&self, name: &str, value: Value) {
        match self.resolve(name) {
            Ok(owner) => owner.define(name, value),
            Err(_) => self.define(name, value),
        }
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(environment) = current {
            depth += 1;
            current = environment.parent();
        }
        depth
    }
}

fn undefined(name: &str) -> RuntimeError {
    RuntimeError::UndefinedVariable {
        name: name.to_string(),
    }
}

// Frames can reach themselves through pointer values, so only the local names
// are printed.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frame = self.frame.borrow();
        f.debug_struct("Environment")
            .field("names", &frame.values.keys().collect::<Vec<_>>())
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward() {
        let global = Environment::new();
        global.define("a", Value::Integer(1));
        let inner = global.child().child();
        assert_eq!(inner.get("a"), Ok(Value::Integer(1)));
        assert!(inner.resolve("a").expect("resolved").ptr_eq(&global));
        assert_eq!(
            inner.get("missing"),
            Err(RuntimeError::UndefinedVariable {
                name: "missing".to_string()
            })
        );
    }

    #[test]
    fn define_shadows_and_assign_updates_owner() {
        let global = Environment::new();
        global.define("a", Value::Integer(1));
        let inner = global.child();

        inner.assign("a", Value::Integer(2));
        assert_eq!(global.get("a"), Ok(Value::Integer(2)));

        inner.define("a", Value::Integer(3));
        assert_eq!(inner.get("a"), Ok(Value::Integer(3)));
        assert_eq!(global.get("a"), Ok(Value::Integer(2)));

        inner.assign("fresh", Value::Integer(4));
        assert_eq!(inner.get_local("fresh"), Some(Value::Integer(4)));
        assert_eq!(global.get_local("fresh"), None);
    }

    #[test]
    fn depth_counts_parents() {
        let global = Environment::new();
        assert_eq!(global.depth(), 0);
        assert_eq!(global.child().child().depth(), 2);
    }
}
