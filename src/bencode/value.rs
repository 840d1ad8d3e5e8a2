use bytes::Bytes;
use std::collections::BTreeMap;

/// A dynamically typed value.
///
/// Bencode has four data types: integers, byte strings, lists, and
/// dictionaries. This enum represents any bencode value, plus the extra
/// variants (`Null`, `Bool`, `Uint`, `Float`) needed to hold decoded
/// Python pickle data in the same tree.
///
/// Dictionary keys are raw byte strings ordered by byte comparison, which
/// is exactly the order bencode requires on output.
///
/// # Examples
///
/// ```
/// use torport::bencode::Value;
///
/// let int = Value::Integer(42);
/// let string = Value::string("hello");
///
/// assert_eq!(int.as_integer(), Some(42));
/// assert_eq!(string.as_str(), Some("hello"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Python `None`; never produced by bencode.
    Null,
    /// A boolean; never produced by bencode.
    Bool(bool),
    /// A signed 64-bit integer.
    Integer(i64),
    /// An unsigned 64-bit integer, used when a decoded integer exceeds `i64`.
    Uint(u64),
    /// A double-precision float; never produced by bencode.
    Float(f64),
    /// A byte string (may or may not be valid UTF-8).
    Bytes(Bytes),
    /// An ordered list of values.
    List(Vec<Value>),
    /// A dictionary with byte string keys, ordered by raw bytes.
    Dict(BTreeMap<Bytes, Value>),
}

impl Value {
    /// Creates a byte string value from a UTF-8 string.
    pub fn string(s: &str) -> Self {
        Value::Bytes(Bytes::copy_from_slice(s.as_bytes()))
    }

    /// Returns the value as a signed integer, if it is one.
    ///
    /// `Uint` values that fit in an `i64` are coerced.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Uint(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    /// Returns the value as an unsigned integer, if it is one.
    ///
    /// Non-negative `Integer` values are coerced.
    pub fn as_uinteger(&self) -> Option<u64> {
        match self {
            Value::Uint(u) => Some(*u),
            Value::Integer(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Returns the value as a float, coercing from integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            Value::Uint(u) => Some(*u as f64),
            _ => None,
        }
    }

    /// Returns the value as a boolean.
    ///
    /// Several on-disk schemas store booleans as 0/1 integers; those are
    /// accepted here as well.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(0) | Value::Uint(0) => Some(false),
            Value::Integer(1) | Value::Uint(1) => Some(true),
            _ => None,
        }
    }

    /// Returns the value as a byte string, if it is one.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the value as a UTF-8 string, if it is a valid UTF-8 byte string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Returns the value as a list, if it is one.
    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the value as a dictionary reference, if it is one.
    pub fn as_dict(&self) -> Option<&BTreeMap<Bytes, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Returns the value as a mutable dictionary reference, if it is one.
    pub fn as_dict_mut(&mut self) -> Option<&mut BTreeMap<Bytes, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Consumes the value and returns the dictionary, if it is one.
    pub fn into_dict(self) -> Option<BTreeMap<Bytes, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Looks up a key in this value if it is a dictionary.
    ///
    /// Returns `None` if the value is not a dictionary or if the key is
    /// not present.
    ///
    /// # Examples
    ///
    /// ```
    /// use torport::bencode::decode;
    ///
    /// let value = decode(b"d3:foo3:bare").unwrap();
    /// assert_eq!(value.get(b"foo").and_then(|v| v.as_str()), Some("bar"));
    /// assert_eq!(value.get(b"missing"), None);
    /// ```
    pub fn get(&self, key: &[u8]) -> Option<&Value> {
        self.as_dict()?.get(key)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::Uint(u)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(l: Vec<Value>) -> Self {
        Value::List(l)
    }
}

impl From<BTreeMap<Bytes, Value>> for Value {
    fn from(d: BTreeMap<Bytes, Value>) -> Self {
        Value::Dict(d)
    }
}
