use crate::runtime::environment::Environment;
use crate::runtime::error::RuntimeError;
use crate::runtime::value::{ArrayRef, Key, MappingRef, Value, checked_index, read_entry};

/// Address of a storage location.
///
/// A pointer holds its container plus the key inside it and re-resolves on
/// every access, so it observes later writes to the location and writes made
/// through it are visible to every other alias of the container.
#[derive(Debug, Clone)]
pub enum Pointer {
    /// Variable slot in the frame that defined the name.
    Variable { frame: Environment, name: String },
    /// Array element. The index is bounds-checked on each access.
    Element { array: ArrayRef, index: i64 },
    /// Struct field or map entry.
    Entry { mapping: MappingRef, key: Key },
}

impl Pointer {
    pub fn get(&self) -> Result<Value, RuntimeError> {
        match self {
            Pointer::Variable { frame, name } => {
                frame
                    .get_local(name)
                    .ok_or_else(|| RuntimeError::UndefinedVariable {
                        name: name.clone(),
                    })
            }
            Pointer::Element { array, index } => {
                let array = array.borrow();
                let slot = checked_index(*index, array.len())?;
                Ok(array[slot].clone())
            }
            Pointer::Entry { mapping, key } => read_entry(mapping, key),
        }
    }

    pub fn set(&self, value: Value) -> Result<(), RuntimeError> {
        match self {
            Pointer::Variable { frame, name } => {
                frame.define(name.clone(), value);
                Ok(())
            }
            Pointer::Element { array, index } => {
                let mut array = array.borrow_mut();
                let slot = checked_index(*index, array.len())?;
                array[slot] = value;
                Ok(())
            }
            Pointer::Entry { mapping, key } => {
                mapping.borrow_mut().insert(key.clone(), value);
                Ok(())
            }
        }
    }
}

/// Two pointers are equal when they address the same slot.
impl PartialEq for Pointer {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Pointer::Variable { frame, name },
                Pointer::Variable {
                    frame: other_frame,
                    name: other_name,
                },
            ) => frame.ptr_eq(other_frame) && name == other_name,
            (
                Pointer::Element { array, index },
                Pointer::Element {
                    array: other_array,
                    index: other_index,
                },
            ) => std::rc::Rc::ptr_eq(array, other_array) && index == other_index,
            (
                Pointer::Entry { mapping, key },
                Pointer::Entry {
                    mapping: other_mapping,
                    key: other_key,
                },
            ) => std::rc::Rc::ptr_eq(mapping, other_mapping) && key == other_key,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_pointer_tracks_later_writes() {
        let frame = Environment::new();
        frame.define("x", Value::Integer(1));
        let pointer = Pointer::Variable {
            frame: frame.clone(),
            name: "x".to_string(),
        };
        frame.assign("x", Value::Integer(2));
        assert_eq!(pointer.get(), Ok(Value::Integer(2)));
        pointer.set(Value::Integer(9)).expect("store through pointer");
        assert_eq!(frame.get("x"), Ok(Value::Integer(9)));
    }

    #[test]
    fn element_pointer_aliases_the_array() {
        let array = Value::array(vec![Value::Integer(0); 3]);
        let pointer = array
            .element_pointer(&Value::Integer(2))
            .expect("address of element");
        pointer.set(Value::Integer(7)).expect("store through pointer");
        assert_eq!(array.to_string(), "[0, 0, 7]");
    }

    #[test]
    fn element_pointer_is_bounds_checked_on_use() {
        let array = Value::array(vec![Value::Integer(0)]);
        let pointer = array
            .element_pointer(&Value::Integer(4))
            .expect("capture is unchecked");
        assert_eq!(
            pointer.get(),
            Err(RuntimeError::IndexOutOfBounds { index: 4, len: 1 })
        );
    }

    #[test]
    fn pointers_compare_by_target() {
        let array = Value::array(vec![Value::Integer(0); 2]);
        let first = array.element_pointer(&Value::Integer(1)).expect("pointer");
        let second = array.element_pointer(&Value::Integer(1)).expect("pointer");
        let other = array.element_pointer(&Value::Integer(0)).expect("pointer");
        assert_eq!(first, second);
        assert_ne!(first, other);
    }
}
