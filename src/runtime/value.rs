use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::ast::BinaryOperator;
use crate::runtime::error::RuntimeError;
use crate::runtime::pointer::Pointer;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type MappingRef = Rc<RefCell<IndexMap<Key, Value>>>;
pub type SetRef = Rc<RefCell<IndexSet<Key>>>;

/// Key of a mapping entry or a set element.
///
/// Struct fields are `Name` keys; keys computed at runtime are always `Int`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Name(String),
}

impl Key {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Key::Int(value) => Some(*value),
            Key::Name(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(value) => write!(f, "{value}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

/// Runtime value. Arrays, mappings and sets are shared by reference: every
/// binding, cell or pointer that holds one observes mutations made through
/// any other.
///
/// Struct instances and maps are both `Mapping`.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Array(ArrayRef),
    Mapping(MappingRef),
    Set(SetRef),
    Pointer(Pointer),
}

impl Value {
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(values)))
    }

    pub fn mapping(entries: IndexMap<Key, Value>) -> Self {
        Value::Mapping(Rc::new(RefCell::new(entries)))
    }

    pub fn set(items: IndexSet<Key>) -> Self {
        Value::Set(Rc::new(RefCell::new(items)))
    }

    /// All-zero array whose length is the evaluated `size`.
    pub fn zeroed_array(size: &Value) -> Result<Self, RuntimeError> {
        let size = size.as_integer("array size")?;
        let len = usize::try_from(size).map_err(|_| RuntimeError::NegativeArraySize { size })?;
        Ok(Value::array(vec![Value::Integer(0); len]))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Array(_) => "array",
            Value::Mapping(_) => "mapping",
            Value::Set(_) => "set",
            Value::Pointer(_) => "pointer",
        }
    }

    pub fn as_integer(&self, operation: &str) -> Result<i64, RuntimeError> {
        match self {
            Value::Integer(value) => Ok(*value),
            other => Err(RuntimeError::TypeMismatch {
                operation: operation.to_string(),
                expected: "integer",
                got: other.type_name(),
            }),
        }
    }

    /// Branch conditions are integers; zero is false.
    pub fn is_true(&self) -> Result<bool, RuntimeError> {
        Ok(self.as_integer("condition")? != 0)
    }

    pub fn to_key(&self) -> Result<Key, RuntimeError> {
        match self {
            Value::Integer(value) => Ok(Key::Int(*value)),
            other => Err(RuntimeError::UnhashableKey {
                type_name: other.type_name(),
            }),
        }
    }

    pub fn index(&self, index: &Value) -> Result<Value, RuntimeError> {
        match self {
            Value::Array(array) => {
                let array = array.borrow();
                let slot = checked_index(index.as_integer("index")?, array.len())?;
                Ok(array[slot].clone())
            }
            Value::Mapping(mapping) => read_entry(mapping, &index.to_key()?),
            other => Err(container_mismatch("index", other)),
        }
    }

    pub fn store_index(&self, index: &Value, value: Value) -> Result<(), RuntimeError> {
        match self {
            Value::Array(array) => {
                let mut array = array.borrow_mut();
                let slot = checked_index(index.as_integer("index")?, array.len())?;
                array[slot] = value;
                Ok(())
            }
            Value::Mapping(mapping) => {
                mapping.borrow_mut().insert(index.to_key()?, value);
                Ok(())
            }
            other => Err(container_mismatch("index assignment", other)),
        }
    }

    pub fn field(&self, field: &str) -> Result<Value, RuntimeError> {
        match self {
            Value::Mapping(mapping) => read_entry(mapping, &Key::Name(field.to_string())),
            other => Err(field_mismatch(field, other)),
        }
    }

    pub fn store_field(&self, field: &str, value: Value) -> Result<(), RuntimeError> {
        match self {
            Value::Mapping(mapping) => {
                mapping
                    .borrow_mut()
                    .insert(Key::Name(field.to_string()), value);
                Ok(())
            }
            other => Err(field_mismatch(field, other)),
        }
    }

    /// `&container[index]`: captures the container itself, not the current cell value.
    pub fn element_pointer(&self, index: &Value) -> Result<Pointer, RuntimeError> {
        match self {
            Value::Array(array) => Ok(Pointer::Element {
                array: array.clone(),
                index: index.as_integer("address-of index")?,
            }),
            Value::Mapping(mapping) => Ok(Pointer::Entry {
                mapping: mapping.clone(),
                key: index.to_key()?,
            }),
            other => Err(container_mismatch("address-of index", other)),
        }
    }

    pub fn field_pointer(&self, field: &str) -> Result<Pointer, RuntimeError> {
        match self {
            Value::Mapping(mapping) => Ok(Pointer::Entry {
                mapping: mapping.clone(),
                key: Key::Name(field.to_string()),
            }),
            other => Err(field_mismatch(field, other)),
        }
    }

    pub fn dereference(&self) -> Result<Value, RuntimeError> {
        match self {
            Value::Pointer(pointer) => pointer.get(),
            other => Err(RuntimeError::NonPointerDereference {
                type_name: other.type_name(),
            }),
        }
    }

    pub fn store_through(&self, value: Value) -> Result<(), RuntimeError> {
        match self {
            Value::Pointer(pointer) => pointer.set(value),
            other => Err(RuntimeError::NonPointerStore {
                type_name: other.type_name(),
            }),
        }
    }

    pub fn negate(&self) -> Result<Value, RuntimeError> {
        let value = self.as_integer("-")?;
        value
            .checked_neg()
            .map(Value::Integer)
            .ok_or(RuntimeError::IntegerOverflow)
    }
}

/// Applies a binary operator with L25 semantics: checked integer arithmetic,
/// floor division, and 0/1 comparison results.
pub fn binary(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let result = match op {
        BinaryOperator::Equal => i64::from(left == right),
        BinaryOperator::NotEqual => i64::from(left != right),
        _ => {
            let operation = op.symbol();
            let lhs = left.as_integer(operation)?;
            let rhs = right.as_integer(operation)?;
            match op {
                BinaryOperator::Add => lhs.checked_add(rhs).ok_or(RuntimeError::IntegerOverflow)?,
                BinaryOperator::Sub => lhs.checked_sub(rhs).ok_or(RuntimeError::IntegerOverflow)?,
                BinaryOperator::Mul => lhs.checked_mul(rhs).ok_or(RuntimeError::IntegerOverflow)?,
                BinaryOperator::Div => floor_div(lhs, rhs)?,
                BinaryOperator::Less => i64::from(lhs < rhs),
                BinaryOperator::LessEqual => i64::from(lhs <= rhs),
                BinaryOperator::Greater => i64::from(lhs > rhs),
                BinaryOperator::GreaterEqual => i64::from(lhs >= rhs),
                BinaryOperator::Equal => i64::from(lhs == rhs),
                BinaryOperator::NotEqual => i64::from(lhs != rhs),
            }
        }
    };
    Ok(Value::Integer(result))
}

/// Integer division rounding toward negative infinity.
pub fn floor_div(left: i64, right: i64) -> Result<i64, RuntimeError> {
    if right == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    let quotient = left
        .checked_div(right)
        .ok_or(RuntimeError::IntegerOverflow)?;
    if left % right != 0 && ((left < 0) != (right < 0)) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

pub(crate) fn checked_index(index: i64, len: usize) -> Result<usize, RuntimeError> {
    usize::try_from(index)
        .ok()
        .filter(|slot| *slot < len)
        .ok_or(RuntimeError::IndexOutOfBounds { index, len })
}

pub(crate) fn read_entry(mapping: &MappingRef, key: &Key) -> Result<Value, RuntimeError> {
    mapping
        .borrow()
        .get(key)
        .cloned()
        .ok_or_else(|| RuntimeError::MissingKey {
            key: key.to_string(),
        })
}

fn container_mismatch(operation: &str, value: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        operation: operation.to_string(),
        expected: "array or mapping",
        got: value.type_name(),
    }
}

fn field_mismatch(field: &str, value: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        operation: format!(".{field}"),
        expected: "mapping",
        got: value.type_name(),
    }
}

/// Identity of a shared aggregate, used to detect cycles.
type Address = *const ();

fn address<T>(cell: &Rc<RefCell<T>>) -> Address {
    Rc::as_ptr(cell).cast()
}

impl Value {
    /// Structural equality. A pair of aggregates already under comparison
    /// further up is taken as equal, so self-containing values terminate.
    fn equals(&self, other: &Value, active: &mut Vec<(Address, Address)>) -> bool {
        match (self, other) {
            (Value::Integer(left), Value::Integer(right)) => left == right,
            (Value::Array(left), Value::Array(right)) => {
                let pair = (address(left), address(right));
                if Rc::ptr_eq(left, right) || active.contains(&pair) {
                    return true;
                }
                let (left, right) = (left.borrow(), right.borrow());
                if left.len() != right.len() {
                    return false;
                }
                active.push(pair);
                let equal = left
                    .iter()
                    .zip(right.iter())
                    .all(|(left, right)| left.equals(right, active));
                active.pop();
                equal
            }
            (Value::Mapping(left), Value::Mapping(right)) => {
                let pair = (address(left), address(right));
                if Rc::ptr_eq(left, right) || active.contains(&pair) {
                    return true;
                }
                let (left, right) = (left.borrow(), right.borrow());
                if left.len() != right.len() {
                    return false;
                }
                active.push(pair);
                let equal = left.iter().all(|(key, value)| {
                    right
                        .get(key)
                        .is_some_and(|other| value.equals(other, active))
                });
                active.pop();
                equal
            }
            (Value::Set(left), Value::Set(right)) => {
                Rc::ptr_eq(left, right) || *left.borrow() == *right.borrow()
            }
            (Value::Pointer(left), Value::Pointer(right)) => left == right,
            _ => false,
        }
    }

    /// Writes the printed form. An aggregate met again inside itself is
    /// shown as `[...]` or `{...}`.
    fn render(&self, f: &mut fmt::Formatter<'_>, active: &mut Vec<Address>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{value}"),
            Value::Array(array) => {
                let id = address(array);
                if active.contains(&id) {
                    return f.write_str("[...]");
                }
                active.push(id);
                f.write_str("[")?;
                for (position, item) in array.borrow().iter().enumerate() {
                    if position > 0 {
                        f.write_str(", ")?;
                    }
                    item.render(f, active)?;
                }
                active.pop();
                f.write_str("]")
            }
            Value::Mapping(mapping) => {
                let id = address(mapping);
                if active.contains(&id) {
                    return f.write_str("{...}");
                }
                active.push(id);
                f.write_str("{")?;
                for (position, (key, value)) in mapping.borrow().iter().enumerate() {
                    if position > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: ")?;
                    value.render(f, active)?;
                }
                active.pop();
                f.write_str("}")
            }
            Value::Set(set) => {
                let rendered = set
                    .borrow()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{{rendered}}}")
            }
            Value::Pointer(_) => f.write_str("<pointer>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, &mut Vec::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &mut Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i64) -> Value {
        Value::Integer(value)
    }

    #[test]
    fn division_rounds_toward_negative_infinity() {
        assert_eq!(floor_div(-7, 2), Ok(-4));
        assert_eq!(floor_div(7, -2), Ok(-4));
        assert_eq!(floor_div(-7, -2), Ok(3));
        assert_eq!(floor_div(7, 2), Ok(3));
        assert_eq!(floor_div(-6, 2), Ok(-3));
        assert_eq!(floor_div(1, 0), Err(RuntimeError::DivisionByZero));
        assert_eq!(floor_div(i64::MIN, -1), Err(RuntimeError::IntegerOverflow));
    }

    #[test]
    fn comparisons_yield_zero_or_one() {
        assert_eq!(binary(BinaryOperator::Less, &int(1), &int(2)), Ok(int(1)));
        assert_eq!(binary(BinaryOperator::GreaterEqual, &int(1), &int(2)), Ok(int(0)));
        let left = Value::array(vec![int(1)]);
        let right = Value::array(vec![int(1)]);
        assert_eq!(binary(BinaryOperator::Equal, &left, &right), Ok(int(1)));
        assert_eq!(binary(BinaryOperator::NotEqual, &left, &int(1)), Ok(int(1)));
    }

    #[test]
    fn arithmetic_rejects_non_integers_and_overflow() {
        let error = binary(BinaryOperator::Add, &int(1), &Value::array(vec![]))
            .expect_err("expected type mismatch");
        assert_eq!(
            error.to_string(),
            "Operation '+' expected integer, got array"
        );
        assert_eq!(
            binary(BinaryOperator::Mul, &int(i64::MAX), &int(2)),
            Err(RuntimeError::IntegerOverflow)
        );
    }

    #[test]
    fn arrays_are_shared_between_aliases() {
        let array = Value::array(vec![int(0), int(0)]);
        let alias = array.clone();
        alias.store_index(&int(1), int(5)).expect("store");
        assert_eq!(array.index(&int(1)), Ok(int(5)));
        assert_eq!(
            array.index(&int(2)),
            Err(RuntimeError::IndexOutOfBounds { index: 2, len: 2 })
        );
        assert_eq!(
            array.index(&int(-1)),
            Err(RuntimeError::IndexOutOfBounds { index: -1, len: 2 })
        );
    }

    #[test]
    fn mappings_serve_as_structs_and_maps() {
        let mut entries = IndexMap::new();
        entries.insert(Key::Name("x".to_string()), int(1));
        let record = Value::mapping(entries);
        record.store_index(&int(7), int(70)).expect("store");
        record.store_field("y", int(2)).expect("store");
        assert_eq!(record.field("x"), Ok(int(1)));
        assert_eq!(record.index(&int(7)), Ok(int(70)));
        assert_eq!(record.to_string(), "{x: 1, 7: 70, y: 2}");
        assert_eq!(
            record.field("z"),
            Err(RuntimeError::MissingKey {
                key: "z".to_string()
            })
        );
    }

    #[test]
    fn renders_values_for_output() {
        let set = Value::set(IndexSet::from([Key::Int(3), Key::Int(1)]));
        let nested = Value::array(vec![int(1), Value::array(vec![int(2)]), set]);
        assert_eq!(nested.to_string(), "[1, [2], {3, 1}]");
    }

    #[test]
    fn renders_self_containing_aggregates() {
        let array = Value::array(vec![int(0)]);
        array.store_index(&int(0), array.clone()).expect("store");
        assert_eq!(array.to_string(), "[[...]]");

        let mut entries = IndexMap::new();
        entries.insert(Key::Int(1), int(10));
        let mapping = Value::mapping(entries);
        mapping.store_index(&int(2), mapping.clone()).expect("store");
        mapping
            .store_index(&int(3), Value::array(vec![mapping.clone()]))
            .expect("store");
        assert_eq!(mapping.to_string(), "{1: 10, 2: {...}, 3: [{...}]}");
    }

    #[test]
    fn compares_self_containing_aggregates() {
        let left = Value::array(vec![int(0), int(1)]);
        left.store_index(&int(0), left.clone()).expect("store");
        let right = Value::array(vec![int(0), int(1)]);
        right.store_index(&int(0), right.clone()).expect("store");
        assert_eq!(left, right);
        assert_eq!(binary(BinaryOperator::Equal, &left, &right), Ok(int(1)));

        right.store_index(&int(1), int(2)).expect("store");
        assert_ne!(left, right);

        let mapping = Value::mapping(IndexMap::new());
        mapping.store_index(&int(1), mapping.clone()).expect("store");
        let other = Value::mapping(IndexMap::new());
        other.store_index(&int(1), other.clone()).expect("store");
        assert_eq!(mapping, other);
        assert_ne!(mapping, left);
    }

    #[test]
    fn zeroed_array_rejects_negative_sizes() {
        assert_eq!(
            Value::zeroed_array(&int(3)).map(|value| value.to_string()),
            Ok("[0, 0, 0]".to_string())
        );
        assert_eq!(
            Value::zeroed_array(&int(-1)),
            Err(RuntimeError::NegativeArraySize { size: -1 })
        );
    }
}
