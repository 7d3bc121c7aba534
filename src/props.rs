//! Render input values and their fingerprints
//!
//! Props are dynamically shaped: besides plain data they may hold callbacks
//! and shared, reference-typed values that can point back at themselves.
//! Fingerprinting serializes the props canonically (map keys sorted) and
//! hashes the result. When serialization is impossible the fingerprint
//! falls back to [`PropsFingerprint::NonCacheable`] instead of failing.

use crate::cache::types::{ContentHash, PropsFingerprint};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock, TryLockError};
use tracing::debug;

/// Nesting deeper than this is treated as a cycle
pub const MAX_PROP_DEPTH: usize = 128;

/// Render input: prop name to value, iterated in key order
pub type Props = BTreeMap<String, PropValue>;

/// Opaque callable passed through to the render function
pub type PropFunction = Arc<dyn Fn(&[PropValue]) -> PropValue + Send + Sync>;

/// A single prop value
#[derive(Clone)]
pub enum PropValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<PropValue>),
    Map(BTreeMap<String, PropValue>),

    /// Reference-typed value; clones point at the same cell and may form cycles
    Shared(Arc<RwLock<PropValue>>),

    /// Callback value; never serializable
    Function(PropFunction),
}

impl PropValue {
    /// Wrap a value in a shared cell
    pub fn shared(value: PropValue) -> Self {
        PropValue::Shared(Arc::new(RwLock::new(value)))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[PropValue]) -> PropValue + Send + Sync + 'static,
    {
        PropValue::Function(Arc::new(f))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => write!(f, "Null"),
            PropValue::Bool(b) => write!(f, "Bool({})", b),
            PropValue::Number(n) => write!(f, "Number({})", n),
            PropValue::String(s) => write!(f, "String({:?})", s),
            PropValue::List(items) => f.debug_list().entries(items).finish(),
            PropValue::Map(map) => f.debug_map().entries(map).finish(),
            // Contents are not printed; a cycle would recurse forever
            PropValue::Shared(cell) => write!(f, "Shared({:p})", Arc::as_ptr(cell)),
            PropValue::Function(func) => write!(f, "Function({:p})", Arc::as_ptr(func)),
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Null, PropValue::Null) => true,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Number(a), PropValue::Number(b)) => a == b,
            (PropValue::String(a), PropValue::String(b)) => a == b,
            (PropValue::List(a), PropValue::List(b)) => a == b,
            (PropValue::Map(a), PropValue::Map(b)) => a == b,
            (PropValue::Shared(a), PropValue::Shared(b)) => Arc::ptr_eq(a, b),
            (PropValue::Function(a), PropValue::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for PropValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => PropValue::Null,
            serde_json::Value::Bool(b) => PropValue::Bool(b),
            serde_json::Value::Number(n) => PropValue::Number(n),
            serde_json::Value::String(s) => PropValue::String(s),
            serde_json::Value::Array(items) => {
                PropValue::List(items.into_iter().map(PropValue::from).collect())
            }
            serde_json::Value::Object(map) => PropValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, PropValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::String(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::String(s)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<i64> for PropValue {
    fn from(n: i64) -> Self {
        PropValue::Number(n.into())
    }
}

/// Convert a JSON object into props; non-object values give empty props
pub fn props_from_json(value: serde_json::Value) -> Props {
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, PropValue::from(v)))
            .collect(),
        _ => Props::new(),
    }
}

/// Serialization view that tracks nesting depth
struct Depth<'a> {
    value: &'a PropValue,
    depth: usize,
}

impl Depth<'_> {
    fn child<'b>(&self, value: &'b PropValue) -> Depth<'b> {
        Depth {
            value,
            depth: self.depth + 1,
        }
    }
}

impl Serialize for Depth<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.depth > MAX_PROP_DEPTH {
            return Err(S::Error::custom(format!(
                "props nested deeper than {} levels (cyclic structure?)",
                MAX_PROP_DEPTH
            )));
        }

        match self.value {
            PropValue::Null => serializer.serialize_unit(),
            PropValue::Bool(b) => serializer.serialize_bool(*b),
            PropValue::Number(n) => n.serialize(serializer),
            PropValue::String(s) => serializer.serialize_str(s),
            PropValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&self.child(item))?;
                }
                seq.end()
            }
            PropValue::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, &self.child(value))?;
                }
                out.end()
            }
            PropValue::Shared(cell) => {
                // A cell already locked further up means the value refers to itself
                let inner = match cell.try_read() {
                    Ok(guard) => guard,
                    Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                    Err(TryLockError::WouldBlock) => {
                        return Err(S::Error::custom("shared prop value is locked"));
                    }
                };
                self.child(&inner).serialize(serializer)
            }
            PropValue::Function(_) => Err(S::Error::custom("function values cannot be serialized")),
        }
    }
}

impl Serialize for PropValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Depth {
            value: self,
            depth: 0,
        }
        .serialize(serializer)
    }
}

/// Fingerprint props for use in a render cache key.
///
/// Never fails: props that cannot be serialized yield `NonCacheable`.
pub fn fingerprint_props(props: &Props) -> PropsFingerprint {
    match serde_json::to_vec(props) {
        Ok(json) => PropsFingerprint::Hash(ContentHash::from_bytes(&json)),
        Err(e) => {
            debug!("[render] Failed to serialize props for cache key: {}", e);
            PropsFingerprint::NonCacheable
        }
    }
}
