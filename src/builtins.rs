use crate::runtime::error::RuntimeError;
use crate::runtime::value::{Key, MappingRef, SetRef, Value};

/// Container builtins. Calls to these names are resolved before user
/// functions, so a user function with the same name is never reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinFunction {
    MapInsert,
    MapDelete,
    MapGet,
    MapHas,
    MapKeys,
    SetAdd,
    SetRemove,
    SetContains,
    SetItems,
}

impl BuiltinFunction {
    pub const ALL: [BuiltinFunction; 9] = [
        Self::MapInsert,
        Self::MapDelete,
        Self::MapGet,
        Self::MapHas,
        Self::MapKeys,
        Self::SetAdd,
        Self::SetRemove,
        Self::SetContains,
        Self::SetItems,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::MapInsert => "map_insert",
            Self::MapDelete => "map_delete",
            Self::MapGet => "map_get",
            Self::MapHas => "map_has",
            Self::MapKeys => "map_keys",
            Self::SetAdd => "set_add",
            Self::SetRemove => "set_remove",
            Self::SetContains => "set_contains",
            Self::SetItems => "set_items",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Self::MapInsert => 3,
            Self::MapDelete | Self::MapGet | Self::MapHas => 2,
            Self::SetAdd | Self::SetRemove | Self::SetContains => 2,
            Self::MapKeys | Self::SetItems => 1,
        }
    }

    /// Runs the builtin. Mutating builtins return 0, membership tests return
    /// 0 or 1, and `map_get` yields 0 for a missing key. `map_keys` lists
    /// only integer keys since field names have no value form.
    pub fn call(self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match (self, args.as_slice()) {
            (Self::MapInsert, [map, key, value]) => {
                let key = key.to_key()?;
                self.mapping(map)?.borrow_mut().insert(key, value.clone());
                Ok(Value::Integer(0))
            }
            (Self::MapDelete, [map, key]) => {
                let key = key.to_key()?;
                self.mapping(map)?.borrow_mut().shift_remove(&key);
                Ok(Value::Integer(0))
            }
            (Self::MapGet, [map, key]) => {
                let key = key.to_key()?;
                let found = self.mapping(map)?.borrow().get(&key).cloned();
                Ok(found.unwrap_or(Value::Integer(0)))
            }
            (Self::MapHas, [map, key]) => {
                let key = key.to_key()?;
                let found = self.mapping(map)?.borrow().contains_key(&key);
                Ok(Value::Integer(i64::from(found)))
            }
            (Self::MapKeys, [map]) => {
                let keys = self
                    .mapping(map)?
                    .borrow()
                    .keys()
                    .filter_map(Key::as_integer)
                    .map(Value::Integer)
                    .collect();
                Ok(Value::array(keys))
            }
            (Self::SetAdd, [set, item]) => {
                let item = item.to_key()?;
                self.set(set)?.borrow_mut().insert(item);
                Ok(Value::Integer(0))
            }
            (Self::SetRemove, [set, item]) => {
                let item = item.to_key()?;
                self.set(set)?.borrow_mut().shift_remove(&item);
                Ok(Value::Integer(0))
            }
            (Self::SetContains, [set, item]) => {
                let item = item.to_key()?;
                let found = self.set(set)?.borrow().contains(&item);
                Ok(Value::Integer(i64::from(found)))
            }
            (Self::SetItems, [set]) => {
                let items = self
                    .set(set)?
                    .borrow()
                    .iter()
                    .filter_map(Key::as_integer)
                    .map(Value::Integer)
                    .collect();
                Ok(Value::array(items))
            }
            _ => Err(RuntimeError::FunctionArityMismatch {
                name: self.name().to_string(),
                expected: self.arity(),
                found: args.len(),
            }),
        }
    }

    fn mapping<'v>(self, value: &'v Value) -> Result<&'v MappingRef, RuntimeError> {
        match value {
            Value::Mapping(mapping) => Ok(mapping),
            other => Err(self.mismatch("mapping", other)),
        }
    }

    fn set<'v>(self, value: &'v Value) -> Result<&'v SetRef, RuntimeError> {
        match value {
            Value::Set(set) => Ok(set),
            other => Err(self.mismatch("set", other)),
        }
    }

    fn mismatch(self, expected: &'static str, got: &Value) -> RuntimeError {
        RuntimeError::TypeMismatch {
            operation: self.name().to_string(),
            expected,
            got: got.type_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use indexmap::{IndexMap, IndexSet};

    use super::*;

    fn int(value: i64) -> Value {
        Value::Integer(value)
    }

    #[test]
    fn resolves_every_builtin_by_name() {
        for builtin in BuiltinFunction::ALL {
            assert_eq!(BuiltinFunction::from_name(builtin.name()), Some(builtin));
        }
        assert_eq!(BuiltinFunction::from_name("print"), None);
    }

    #[test]
    fn map_builtins_share_the_mapping() {
        let map = Value::mapping(IndexMap::new());
        BuiltinFunction::MapInsert
            .call(vec![map.clone(), int(1), int(10)])
            .expect("insert");
        BuiltinFunction::MapInsert
            .call(vec![map.clone(), int(2), int(20)])
            .expect("insert");
        assert_eq!(
            BuiltinFunction::MapGet.call(vec![map.clone(), int(2)]),
            Ok(int(20))
        );
        assert_eq!(
            BuiltinFunction::MapGet.call(vec![map.clone(), int(3)]),
            Ok(int(0))
        );
        BuiltinFunction::MapDelete
            .call(vec![map.clone(), int(1)])
            .expect("delete");
        assert_eq!(
            BuiltinFunction::MapHas.call(vec![map.clone(), int(1)]),
            Ok(int(0))
        );
        let keys = BuiltinFunction::MapKeys
            .call(vec![map.clone()])
            .expect("keys");
        assert_eq!(keys.to_string(), "[2]");
    }

    #[test]
    fn set_builtins_ignore_duplicates() {
        let set = Value::set(IndexSet::new());
        for item in [3, 1, 3] {
            BuiltinFunction::SetAdd
                .call(vec![set.clone(), int(item)])
                .expect("add");
        }
        assert_eq!(
            BuiltinFunction::SetContains.call(vec![set.clone(), int(1)]),
            Ok(int(1))
        );
        BuiltinFunction::SetRemove
            .call(vec![set.clone(), int(3)])
            .expect("remove");
        let items = BuiltinFunction::SetItems.call(vec![set]).expect("items");
        assert_eq!(items.to_string(), "[1]");
    }

    #[test]
    fn rejects_wrong_arity_and_argument_kind() {
        assert_eq!(
            BuiltinFunction::MapKeys.call(vec![]),
            Err(RuntimeError::FunctionArityMismatch {
                name: "map_keys".to_string(),
                expected: 1,
                found: 0,
            })
        );
        assert_eq!(
            BuiltinFunction::SetAdd.call(vec![int(1), int(2)]),
            Err(RuntimeError::TypeMismatch {
                operation: "set_add".to_string(),
                expected: "set",
                got: "integer",
            })
        );
        let map = Value::mapping(IndexMap::new());
        assert_eq!(
            BuiltinFunction::MapInsert.call(vec![map.clone(), map, int(1)]),
            Err(RuntimeError::UnhashableKey {
                type_name: "mapping"
            })
        );
    }
}
