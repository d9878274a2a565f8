//! Argument bag.
//!
//! Ordered mapping from a parameter name or position to the value a handler
//! will be invoked with. Resolver stages fill it in one dispatch, the
//! invoker consumes it.

use crate::HttpRequest;
use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Key of an argument: a parameter name or a positional slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgKey {
    Name(String),
    Position(usize),
}

impl From<&str> for ArgKey {
    fn from(name: &str) -> Self {
        ArgKey::Name(name.to_string())
    }
}

impl From<String> for ArgKey {
    fn from(name: String) -> Self {
        ArgKey::Name(name)
    }
}

impl From<usize> for ArgKey {
    fn from(position: usize) -> Self {
        ArgKey::Position(position)
    }
}

impl fmt::Display for ArgKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKey::Name(name) => f.write_str(name),
            ArgKey::Position(position) => write!(f, "#{}", position),
        }
    }
}

/// A resolved argument value.
#[derive(Clone)]
pub enum ArgValue {
    Value(serde_json::Value),
    Request(Box<HttpRequest>),
    Service(Arc<dyn Any + Send + Sync>),
}

impl ArgValue {
    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            ArgValue::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(|v| v.as_str())
    }

    pub fn as_request(&self) -> Option<&HttpRequest> {
        match self {
            ArgValue::Request(request) => Some(request),
            _ => None,
        }
    }

    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self {
            ArgValue::Service(service) => service.clone().downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Value(value) => write!(f, "Value({})", value),
            ArgValue::Request(request) => {
                write!(f, "Request({} {})", request.method, request.uri())
            }
            ArgValue::Service(_) => f.write_str("Service(..)"),
        }
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ArgValue::Value(a), ArgValue::Value(b)) => a == b,
            (ArgValue::Request(a), ArgValue::Request(b)) => {
                a.method == b.method && a.uri() == b.uri()
            }
            (ArgValue::Service(a), ArgValue::Service(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for ArgValue {
    fn from(value: serde_json::Value) -> Self {
        ArgValue::Value(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::Value(value.into())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::Value(value.into())
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        ArgValue::Value(value.into())
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Value(value.into())
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Value(value.into())
    }
}

impl From<HttpRequest> for ArgValue {
    fn from(request: HttpRequest) -> Self {
        ArgValue::Request(Box::new(request))
    }
}

/// The argument bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    entries: IndexMap<ArgKey, ArgValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `value` under `key`, or append it at the next free position when
    /// `key` is `None`. An existing entry keeps its place in the order.
    pub fn add(&mut self, key: Option<ArgKey>, value: impl Into<ArgValue>) -> &mut Self {
        let key = key.unwrap_or_else(|| ArgKey::Position(self.next_position()));
        self.entries.insert(key, value.into());
        self
    }

    pub fn push(&mut self, value: impl Into<ArgValue>) -> &mut Self {
        self.add(None, value)
    }

    pub fn set(&mut self, key: impl Into<ArgKey>, value: impl Into<ArgValue>) -> &mut Self {
        self.add(Some(key.into()), value)
    }

    /// Builder form of [`Arguments::set`].
    pub fn with(mut self, key: impl Into<ArgKey>, value: impl Into<ArgValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Remove an entry. Missing keys are ignored.
    pub fn remove(&mut self, key: impl Into<ArgKey>) -> &mut Self {
        self.entries.shift_remove(&key.into());
        self
    }

    pub fn get(&self, key: &ArgKey) -> Option<&ArgValue> {
        self.entries.get(key)
    }

    pub fn get_named(&self, name: &str) -> Option<&ArgValue> {
        self.entries.get(&ArgKey::Name(name.to_string()))
    }

    pub fn get_position(&self, position: usize) -> Option<&ArgValue> {
        self.entries.get(&ArgKey::Position(position))
    }

    pub fn contains(&self, key: &ArgKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn values(&self) -> &IndexMap<ArgKey, ArgValue> {
        &self.entries
    }

    pub fn into_values(self) -> IndexMap<ArgKey, ArgValue> {
        self.entries
    }

    /// Copy every entry of `other` into this bag, overwriting equal keys.
    pub fn merge(&mut self, other: &Arguments) -> &mut Self {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_position(&self) -> usize {
        self.entries
            .keys()
            .filter_map(|key| match key {
                ArgKey::Position(position) => Some(position + 1),
                ArgKey::Name(_) => None,
            })
            .max()
            .unwrap_or(0)
    }
}
