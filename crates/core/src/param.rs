//! Typed parameter lookup.
//!
//! Actions read their arguments through [`ParamSource`], so the same action
//! can be fed from a JSON body, a form, a query string or a nested JSON
//! object without caring which.

use serde_json::Value;

/// A resolved parameter value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Param {
    /// Nothing under that name.
    #[default]
    Missing,
    /// A plain string.
    Str(String),
    /// A JSON scalar (number, bool, null) or structured value.
    Json(Value),
}

impl Param {
    /// Wrap an optional JSON value. JSON strings become [`Param::Str`].
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None => Param::Missing,
            Some(Value::String(s)) => Param::Str(s.clone()),
            Some(v) => Param::Json(v.clone()),
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self, Param::Missing)
    }

    /// The string value, if this is a plain string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view: JSON numbers directly, strings if they parse.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Param::Str(s) => s.trim().parse().ok(),
            Param::Json(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    /// Boolean view: JSON bools and the strings `true`/`false`/`1`/`0`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Param::Json(Value::Bool(b)) => Some(*b),
            Param::Str(s) => match s.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert back to a JSON value; `None` when missing.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Param::Missing => None,
            Param::Str(s) => Some(Value::String(s.clone())),
            Param::Json(v) => Some(v.clone()),
        }
    }
}

/// Read-only, side-effect free parameter lookup.
pub trait ParamSource: Send + Sync {
    fn get(&self, name: &str) -> Param;
}

impl ParamSource for Value {
    fn get(&self, name: &str) -> Param {
        Param::from_json(self.as_object().and_then(|map| map.get(name)))
    }
}

/// A structured param (e.g. `params` on the root endpoint) is itself a source.
impl ParamSource for Param {
    fn get(&self, name: &str) -> Param {
        match self {
            Param::Json(value) => ParamSource::get(value, name),
            _ => Param::Missing,
        }
    }
}
