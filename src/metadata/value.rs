//! Argument values carried by theory data rows.
//!
//! The closed part of this type (everything except [`ArgValue::Object`]) can
//! cross a process boundary through the payload codec. Objects stand in for
//! arbitrary runtime values and force the owning data source to be deferred
//! to execution time.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ArgValue>),
    Enum {
        #[serde(rename = "enum")]
        type_name: String,
        variant: String,
    },
    Object {
        #[serde(rename = "object")]
        type_name: String,
        #[serde(default)]
        fields: BTreeMap<String, ArgValue>,
    },
}

impl ArgValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn enum_variant(type_name: impl Into<String>, variant: impl Into<String>) -> Self {
        Self::Enum {
            type_name: type_name.into(),
            variant: variant.into(),
        }
    }

    pub fn object(type_name: impl Into<String>) -> Self {
        Self::Object {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(self, name: impl Into<String>, value: ArgValue) -> Self {
        match self {
            Self::Object {
                type_name,
                mut fields,
            } => {
                fields.insert(name.into(), value);
                Self::Object { type_name, fields }
            }
            other => other,
        }
    }

    /// Name of the value's type, used in diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Enum { type_name, .. } | Self::Object { type_name, .. } => type_name,
        }
    }

    /// True when the value and everything nested in it belongs to the closed
    /// serializable set.
    pub fn is_serializable(&self) -> bool {
        match self {
            Self::Object { .. } => false,
            Self::Array(items) => items.iter().all(ArgValue::is_serializable),
            _ => true,
        }
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<ArgValue>> From<Vec<T>> for ArgValue {
    fn from(values: Vec<T>) -> Self {
        Self::Array(values.into_iter().map(Into::into).collect())
    }
}
