//! Tagged request values
//!
//! Incoming JSON is converted once into [`Value`]/[`Record`] so every merge rule
//! matches on an explicit variant instead of probing a dynamic document. A field
//! missing from a [`Record`] reads as [`Value::Absent`], and JSON `null` is folded
//! into `Absent` at conversion time.

use indexmap::IndexMap;

/// One untyped field of a request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Field not present (or JSON `null`)
    #[default]
    Absent,
    Boolean(bool),
    Integer(i64),
    /// Non-integral number; never accepted where an integer is expected
    Float(f64),
    Text(String),
    List(Vec<Value>),
    Record(Record),
}

static ABSENT: Value = Value::Absent;

impl Value {
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Strict boolean view; integers and strings are not booleans.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer view that only succeeds when the value fits the target type.
    ///
    /// This is the "typed default" rule used for plain numeric fields: a value
    /// of the wrong type or out of range behaves as if the field were absent.
    #[must_use]
    pub fn integer<T: TryFrom<i64>>(&self) -> Option<T> {
        self.as_i64().and_then(|n| T::try_from(n).ok())
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// A string whose first character is `t` flips the current value.
    #[must_use]
    pub fn is_toggle(&self) -> bool {
        self.as_str().is_some_and(|s| s.starts_with('t'))
    }

    /// Loose truthiness: `true` or a non-zero integer.
    #[must_use]
    pub const fn is_truthy(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::Integer(n) => *n != 0,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Self::Absent,
            Json::Bool(b) => Self::Boolean(b),
            Json::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or_default(),
            Json::String(s) => Self::Text(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Json::Object(map) => Self::Record(Record::from(map)),
        }
    }
}

/// An insertion-ordered set of named fields (one JSON object).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a field; missing fields read as [`Value::Absent`].
    #[must_use]
    pub fn get(&self, key: &str) -> &Value {
        self.fields.get(key).unwrap_or(&ABSENT)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Record {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            fields: map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, Value::from(v)))
                .collect(),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Build a [`Record`] from a JSON object literal; anything else yields an empty record.
#[must_use]
pub fn record_from_json(json: serde_json::Value) -> Record {
    match json {
        serde_json::Value::Object(map) => Record::from(map),
        _ => Record::new(),
    }
}
