//! Parameter container shared by invocation and update events.
//!
//! `Params` maps string keys to a closed set of value kinds. Reads fail hard:
//! `get*` on a missing key returns `MissingParameter`, a wrong variant returns
//! `TypeMismatch`. Probe with `has()` or use the `opt_*` getters when a key
//! is optional.
//!
//! Heavy payloads (pictures) travel as [`Handle`], a shared type-erased
//! pointer. The producer keeps its own clone, so the payload stays alive for
//! as long as anyone still holds the event.

use indexmap::IndexMap;
use std::any::Any;
use std::sync::Arc;

use super::error::{BusError, BusResult};

/// Shared opaque payload (image buffers, decoded sequences, ...).
#[derive(Clone)]
pub struct Handle(Arc<dyn Any + Send + Sync>);

impl Handle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Wrap an existing Arc without copying the payload.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Recover a typed Arc sharing ownership with this handle.
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({:p})", Arc::as_ptr(&self.0))
    }
}

/// Dynamically typed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    StrList(Vec<String>),
    Handle(Handle),
}

impl ParamValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Bool(_) => "bool",
            ParamValue::Str(_) => "string",
            ParamValue::StrList(_) => "string list",
            ParamValue::Handle(_) => "handle",
        }
    }

    /// Infer a value from command-line text: int, float, bool, else string.
    pub fn parse_loose(text: &str) -> Self {
        if let Ok(v) = text.parse::<i64>() {
            return ParamValue::Int(v);
        }
        // Only plain decimals; `inf`, `nan` and friends stay strings
        if text.bytes().any(|b| b.is_ascii_digit())
            && let Ok(v) = text.parse::<f64>()
            && v.is_finite()
        {
            return ParamValue::Float(v);
        }
        match text {
            "true" => ParamValue::Bool(true),
            "false" => ParamValue::Bool(false),
            _ => ParamValue::Str(text.to_string()),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::StrList(v)
    }
}

impl From<Handle> for ParamValue {
    fn from(v: Handle) -> Self {
        ParamValue::Handle(v)
    }
}

/// Parameter container: string key → typed value, insertion ordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    map: IndexMap<String, ParamValue>,
}

impl Params {
    pub fn new() -> Self {
        Self {
            map: IndexMap::new(),
        }
    }

    /// Insert or overwrite.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.map.insert(key.into(), value.into());
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, key: &str) -> BusResult<&ParamValue> {
        self.map
            .get(key)
            .ok_or_else(|| BusError::MissingParameter(key.to_string()))
    }

    pub fn get_int(&self, key: &str) -> BusResult<i64> {
        match self.get(key)? {
            ParamValue::Int(v) => Ok(*v),
            other => Err(mismatch(key, "int", other)),
        }
    }

    /// Ints are accepted where a float is expected.
    pub fn get_float(&self, key: &str) -> BusResult<f64> {
        match self.get(key)? {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(mismatch(key, "float", other)),
        }
    }

    pub fn get_bool(&self, key: &str) -> BusResult<bool> {
        match self.get(key)? {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(mismatch(key, "bool", other)),
        }
    }

    pub fn get_str(&self, key: &str) -> BusResult<&str> {
        match self.get(key)? {
            ParamValue::Str(v) => Ok(v),
            other => Err(mismatch(key, "string", other)),
        }
    }

    pub fn get_str_list(&self, key: &str) -> BusResult<&[String]> {
        match self.get(key)? {
            ParamValue::StrList(v) => Ok(v),
            other => Err(mismatch(key, "string list", other)),
        }
    }

    pub fn get_handle(&self, key: &str) -> BusResult<&Handle> {
        match self.get(key)? {
            ParamValue::Handle(v) => Ok(v),
            other => Err(mismatch(key, "handle", other)),
        }
    }

    /// Typed view into a handle payload.
    pub fn get_handle_as<T: Any + Send + Sync>(&self, key: &str) -> BusResult<Arc<T>> {
        self.get_handle(key)?
            .downcast_arc::<T>()
            .ok_or_else(|| BusError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<T>(),
                found: "handle",
            })
    }

    // Optional getters: absent is Ok(None), wrong type is still an error

    pub fn opt_int(&self, key: &str) -> BusResult<Option<i64>> {
        self.optional(key, Self::get_int)
    }

    pub fn opt_bool(&self, key: &str) -> BusResult<Option<bool>> {
        self.optional(key, Self::get_bool)
    }

    pub fn opt_str(&self, key: &str) -> BusResult<Option<&str>> {
        if self.has(key) { self.get_str(key).map(Some) } else { Ok(None) }
    }

    fn optional<T>(&self, key: &str, f: impl Fn(&Self, &str) -> BusResult<T>) -> BusResult<Option<T>> {
        if self.has(key) { f(self, key).map(Some) } else { Ok(None) }
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.map.shift_remove(key)
    }

    /// Copy every entry of `other` into self (overwriting).
    pub fn merge(&mut self, other: &Params) {
        for (k, v) in other.iter() {
            self.map.insert(k.clone(), v.clone());
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn mismatch(key: &str, expected: &'static str, found: &ParamValue) -> BusError {
    BusError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_before_and_after_set() {
        let mut p = Params::new();
        assert!(!p.has("percent"));
        p.set("percent", 50);
        assert!(p.has("percent"));
        p.remove("percent");
        assert!(!p.has("percent"));
    }

    #[test]
    fn test_values_read_back() {
        let pic = Handle::new(vec![1u8, 2, 3]);
        let p = Params::new()
            .with("total_frame_num", 101)
            .with("skip_decode", false)
            .with("theme_name", "dark")
            .with("scale", 0.5)
            .with("picture", pic.clone());

        assert_eq!(p.get_int("total_frame_num"), Ok(101));
        assert_eq!(p.get_bool("skip_decode"), Ok(false));
        assert_eq!(p.get_str("theme_name"), Ok("dark"));
        assert_eq!(p.get_float("scale"), Ok(0.5));
        assert!(p.get_handle("picture").unwrap().ptr_eq(&pic));
        assert_eq!(p.get_handle_as::<Vec<u8>>("picture").unwrap().as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_missing_key_fails_hard() {
        let p = Params::new();
        assert_eq!(
            p.get_int("percent"),
            Err(BusError::MissingParameter("percent".into()))
        );
        assert_eq!(p.opt_int("percent"), Ok(None));
    }

    #[test]
    fn test_type_mismatch() {
        let p = Params::new().with("percent", "fifty");
        match p.get_int("percent") {
            Err(BusError::TypeMismatch { expected, found, .. }) => {
                assert_eq!(expected, "int");
                assert_eq!(found, "string");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(p.opt_int("percent").is_err());
    }

    #[test]
    fn test_overwrite_keeps_single_key() {
        let mut p = Params::new();
        p.set("theme_name", "default");
        p.set("theme_name", "dark");
        assert_eq!(p.len(), 1);
        assert_eq!(p.get_str("theme_name"), Ok("dark"));
    }

    #[test]
    fn test_keys_keep_insertion_order() {
        let p = Params::new().with("b", 1).with("a", 2).with("c", 3);
        assert_eq!(p.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_parse_loose() {
        assert_eq!(ParamValue::parse_loose("42"), ParamValue::Int(42));
        assert_eq!(ParamValue::parse_loose("0.25"), ParamValue::Float(0.25));
        assert_eq!(ParamValue::parse_loose("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::parse_loose("dark"), ParamValue::Str("dark".into()));
        assert_eq!(ParamValue::parse_loose("inf"), ParamValue::Str("inf".into()));
        assert_eq!(ParamValue::parse_loose("NaN"), ParamValue::Str("NaN".into()));
        assert_eq!(ParamValue::parse_loose("1e400"), ParamValue::Str("1e400".into()));
    }

    #[test]
    fn test_handle_wrong_type() {
        let p = Params::new().with("picture", Handle::new(7u32));
        assert!(p.get_handle_as::<String>("picture").is_err());
        assert_eq!(*p.get_handle_as::<u32>("picture").unwrap(), 7);
    }
}
