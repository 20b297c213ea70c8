use std::fmt;
use std::sync::Arc;

/// A key of an array-like container.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArrayKey {
    Int(i64),
    Str(Arc<str>),
}

impl ArrayKey {
    pub fn to_value(&self) -> Value {
        match self {
            ArrayKey::Int(i) => Value::Int(*i),
            ArrayKey::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl From<i64> for ArrayKey {
    fn from(i: i64) -> Self {
        ArrayKey::Int(i)
    }
}

impl From<&str> for ArrayKey {
    fn from(s: &str) -> Self {
        ArrayKey::Str(s.into())
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{i}"),
            ArrayKey::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// A concrete runtime value. Containers keep insertion order.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Uninit,
    Null,
    Bool(bool),
    Int(i64),
    Dbl(f64),
    Str(Arc<str>),
    /// Legacy array with arbitrary keys.
    Arr(Vec<(ArrayKey, Value)>),
    Vec(Vec<Value>),
    Dict(Vec<(ArrayKey, Value)>),
    Keyset(Vec<ArrayKey>),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(s.into())
    }

    pub fn is_array_like(&self) -> bool {
        matches!(
            self,
            Value::Arr(_) | Value::Vec(_) | Value::Dict(_) | Value::Keyset(_)
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Uninit => "uninit",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Dbl(_) => "float",
            Value::Str(_) => "string",
            Value::Arr(_) => "array",
            Value::Vec(_) => "vec",
            Value::Dict(_) => "dict",
            Value::Keyset(_) => "keyset",
        }
    }

    /// Number of elements of an array-like value.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Arr(entries) | Value::Dict(entries) => Some(entries.len()),
            Value::Vec(elems) => Some(elems.len()),
            Value::Keyset(keys) => Some(keys.len()),
            _ => None,
        }
    }

    /// Look up `key` in an array-like value.
    pub fn get(&self, key: &ArrayKey) -> Option<Value> {
        match self {
            Value::Arr(entries) | Value::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            Value::Vec(elems) => match key {
                ArrayKey::Int(i) if *i >= 0 => elems.get(*i as usize).cloned(),
                _ => None,
            },
            Value::Keyset(keys) => keys.iter().find(|k| *k == key).map(ArrayKey::to_value),
            _ => None,
        }
    }

    /// Key/value pairs in iteration order.
    pub fn entries(&self) -> Vec<(ArrayKey, Value)> {
        match self {
            Value::Arr(entries) | Value::Dict(entries) => entries.clone(),
            Value::Vec(elems) => elems
                .iter()
                .enumerate()
                .map(|(i, v)| (ArrayKey::Int(i as i64), v.clone()))
                .collect(),
            Value::Keyset(keys) => keys.iter().map(|k| (k.clone(), k.to_value())).collect(),
            _ => Vec::new(),
        }
    }
}

fn write_entries(
    f: &mut fmt::Formatter<'_>,
    entries: &[(ArrayKey, Value)],
) -> fmt::Result {
    for (i, (k, v)) in entries.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{k} => {v}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uninit => f.write_str("uninit"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Dbl(d) => write!(f, "{d:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Arr(entries) => {
                f.write_str("array(")?;
                write_entries(f, entries)?;
                f.write_str(")")
            }
            Value::Vec(elems) => {
                f.write_str("vec[")?;
                for (i, v) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Dict(entries) => {
                f.write_str("dict[")?;
                write_entries(f, entries)?;
                f.write_str("]")
            }
            Value::Keyset(keys) => {
                f.write_str("keyset[")?;
                for (i, k) in keys.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}")?;
                }
                f.write_str("]")
            }
        }
    }
}
