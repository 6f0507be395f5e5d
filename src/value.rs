//! Host-side values
//!
//! [`HostValue`] is what host code hands to the bridge: call arguments,
//! read-only globals and the return value of a native closure. [`Kind`] is the
//! runtime tag of a script value as the bridge sees it.

use std::fmt;

use crate::runtime::ScriptFunction;

/// Runtime tag of a script value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Function,
    Array,
    Object,
    /// Symbols, big integers and engine internals
    Other,
}

impl Kind {
    /// Lowercase name used in diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            Kind::Undefined => "undefined",
            Kind::Null => "null",
            Kind::Boolean => "boolean",
            Kind::Number => "number",
            Kind::String => "string",
            Kind::Function => "function",
            Kind::Array => "array",
            Kind::Object => "object",
            Kind::Other => "other",
        }
    }

    /// Functions and arrays are objects too
    pub const fn is_object_like(self) -> bool {
        matches!(self, Kind::Function | Kind::Array | Kind::Object)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value crossing from host code into script
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// UTF-8 text
    Text(String),
    /// Becomes a fixed-length script array of strings
    TextList(Vec<String>),
    /// A pinned function from the same context
    Function(ScriptFunction),
}

impl HostValue {
    /// Runtime tag this value will have once converted
    pub fn kind(&self) -> Kind {
        match self {
            HostValue::Undefined => Kind::Undefined,
            HostValue::Null => Kind::Null,
            HostValue::Bool(_) => Kind::Boolean,
            HostValue::Int(_) | HostValue::Float(_) => Kind::Number,
            HostValue::Text(_) => Kind::String,
            HostValue::TextList(_) => Kind::Array,
            HostValue::Function(_) => Kind::Function,
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Int(value.into())
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int(value)
    }
}

impl From<u32> for HostValue {
    fn from(value: u32) -> Self {
        HostValue::Int(value.into())
    }
}

impl From<f32> for HostValue {
    fn from(value: f32) -> Self {
        HostValue::Float(value.into())
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Text(value.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::Text(value)
    }
}

impl From<&String> for HostValue {
    fn from(value: &String) -> Self {
        HostValue::Text(value.clone())
    }
}

impl From<Vec<String>> for HostValue {
    fn from(value: Vec<String>) -> Self {
        HostValue::TextList(value)
    }
}

impl From<Vec<&str>> for HostValue {
    fn from(value: Vec<&str>) -> Self {
        HostValue::TextList(value.into_iter().map(str::to_owned).collect())
    }
}

impl From<ScriptFunction> for HostValue {
    fn from(value: ScriptFunction) -> Self {
        HostValue::Function(value)
    }
}

impl From<&ScriptFunction> for HostValue {
    fn from(value: &ScriptFunction) -> Self {
        HostValue::Function(value.clone())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HostValue::Undefined, Into::into)
    }
}
