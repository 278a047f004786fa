use std::{
    any::Any,
    cmp::Ordering,
    fmt,
    sync::{Arc, RwLock},
};

use indexmap::IndexMap;

/// Opaque caller-supplied payload.
///
/// Carries the captured type name so diagnostics can identify the value
/// without downcasting it.
#[derive(Clone)]
pub struct Object {
    type_name: &'static str,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Object {
    pub fn new<T: Send + Sync + 'static>(payload: T) -> Self {
        Object {
            type_name: std::any::type_name::<T>(),
            payload: Arc::new(payload),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::downcast::<T>(self.payload.clone()).ok()
    }

    pub(crate) fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Object").field(&self.type_name).finish()
    }
}

/// Shared, interiorly-mutable sequence backing arrays and sets.
///
/// Containers are registered into the execution context while still empty
/// and may be filled in afterwards by deferred reference resolution.
pub type ArrayHandle = Arc<RwLock<Vec<Value>>>;

/// Shared handle to a built map.
pub type MapHandle = Arc<RwLock<MapValue>>;

/// Shared handle to a built bean.
pub type BeanHandle = Arc<Bean>;

/// A bean is a dynamic record: a type name plus an insertion-ordered field
/// table. Reflection is out of scope; the construction contract is only
/// "create a value, assign it".
pub struct Bean {
    type_name: String,
    fields: RwLock<IndexMap<String, Value>>,
}

impl Bean {
    pub fn new(type_name: impl Into<String>) -> Self {
        Bean {
            type_name: type_name.into(),
            fields: RwLock::new(IndexMap::new()),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn set(&self, field: impl Into<String>, value: Value) {
        self.fields.write().unwrap().insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.fields.read().unwrap().get(field).cloned()
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.read().unwrap().keys().cloned().collect()
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields.read().unwrap();
        let mut out = f.debug_struct("Bean");
        out.field("type_name", &self.type_name);
        for (name, value) in fields.iter() {
            out.field(name, value);
        }
        out.finish()
    }
}

/// Backing-container choice for a map recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapFlavor {
    /// Insertion-ordered entries (the default).
    #[default]
    Ordered,
    /// Entries kept sorted by scalar key order; non-scalar keys append in
    /// arrival order.
    Sorted,
}

/// An association list with map semantics: inserting an existing key
/// replaces its value in place.
#[derive(Debug, Default)]
pub struct MapValue {
    flavor: MapFlavor,
    entries: Vec<(Value, Value)>,
}

impl MapValue {
    pub fn new(flavor: MapFlavor) -> Self {
        MapValue {
            flavor,
            entries: Vec::new(),
        }
    }

    pub fn flavor(&self) -> MapFlavor {
        self.flavor
    }

    pub fn insert(&mut self, key: Value, value: Value) {
        if let Some(slot) = self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.same_instance(&key))
        {
            slot.1 = value;
            return;
        }
        match self.flavor {
            MapFlavor::Ordered => self.entries.push((key, value)),
            MapFlavor::Sorted => {
                let at = self
                    .entries
                    .iter()
                    .position(|(existing, _)| {
                        matches!(existing.scalar_cmp(&key), Some(Ordering::Greater))
                    });
                match at {
                    Some(at) => self.entries.insert(at, (key, value)),
                    None => self.entries.push((key, value)),
                }
            }
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.same_instance(key))
            .map(|(_, value)| value)
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything a recipe can build.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(ArrayHandle),
    Set(ArrayHandle),
    Map(MapHandle),
    Bean(BeanHandle),
    Opaque(Object),
}

impl Value {
    /// Scalars compare by value, shared containers and beans by handle
    /// identity. This is the equality used by map keys and set membership.
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) | (Value::Set(a), Value::Set(b)) => {
                Arc::ptr_eq(a, b)
            }
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Bean(a), Value::Bean(b)) => Arc::ptr_eq(a, b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Ordering between same-variant scalar values; `None` otherwise.
    pub fn scalar_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Bean(_) => "bean",
            Value::Opaque(object) => object.type_name(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Str(v) => write!(f, "Str({v:?})"),
            Value::Array(handle) => write!(f, "Array(len={})", handle.read().unwrap().len()),
            Value::Set(handle) => write!(f, "Set(len={})", handle.read().unwrap().len()),
            Value::Map(handle) => write!(f, "Map(len={})", handle.read().unwrap().len()),
            Value::Bean(bean) => write!(f, "Bean({})", bean.type_name()),
            Value::Opaque(object) => write!(f, "Opaque({})", object.type_name()),
        }
    }
}

/// The expected-type side of the conversion contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeHint {
    #[default]
    Any,
    Bool,
    Int,
    Float,
    Str,
    Array,
    Set,
    Map,
    Bean,
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TypeHint::Any => "any",
            TypeHint::Bool => "bool",
            TypeHint::Int => "int",
            TypeHint::Float => "float",
            TypeHint::Str => "string",
            TypeHint::Array => "array",
            TypeHint::Set => "set",
            TypeHint::Map => "map",
            TypeHint::Bean => "bean",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_map_preserves_insertion_order() {
        let mut map = MapValue::new(MapFlavor::Ordered);
        map.insert(Value::Str("b".into()), Value::Int(2));
        map.insert(Value::Str("a".into()), Value::Int(1));
        let keys: Vec<_> = map.entries().iter().map(|(k, _)| k.clone()).collect();
        assert!(keys[0].same_instance(&Value::Str("b".into())));
        assert!(keys[1].same_instance(&Value::Str("a".into())));
    }

    #[test]
    fn sorted_map_orders_scalar_keys() {
        let mut map = MapValue::new(MapFlavor::Sorted);
        map.insert(Value::Str("b".into()), Value::Int(2));
        map.insert(Value::Str("a".into()), Value::Int(1));
        map.insert(Value::Str("c".into()), Value::Int(3));
        let keys: Vec<_> = map.entries().iter().map(|(k, _)| k.clone()).collect();
        assert!(keys[0].same_instance(&Value::Str("a".into())));
        assert!(keys[2].same_instance(&Value::Str("c".into())));
    }

    #[test]
    fn map_insert_replaces_existing_key_in_place() {
        let mut map = MapValue::new(MapFlavor::Ordered);
        map.insert(Value::Str("k".into()), Value::Null);
        map.insert(Value::Str("k".into()), Value::Int(7));
        assert_eq!(map.len(), 1);
        assert!(map
            .get(&Value::Str("k".into()))
            .unwrap()
            .same_instance(&Value::Int(7)));
    }

    #[test]
    fn beans_compare_by_handle_identity() {
        let a = Value::Bean(Arc::new(Bean::new("Widget")));
        let b = Value::Bean(Arc::new(Bean::new("Widget")));
        assert!(a.same_instance(&a.clone()));
        assert!(!a.same_instance(&b));
    }
}
