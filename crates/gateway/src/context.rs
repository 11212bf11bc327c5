//! Per-request parameter resolution.
//!
//! A request may carry its parameters as a JSON body, a urlencoded form, a
//! query string, or a mix. [`RequestContext`] answers lookups in that
//! precedence order. Form and query values that look like a JSON array or
//! object and parse as one are returned structured.

use crate::error::GatewayError;
use botbridge_core::{Param, ParamSource};
use serde_json::Value;

type Pairs = Vec<(String, String)>;

/// Parsed inputs of one inbound request. Never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    json: Option<Value>,
    form: Option<Pairs>,
    query: Option<Pairs>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    pub fn with_form(mut self, form: Pairs) -> Self {
        self.form = Some(form);
        self
    }

    pub fn with_query(mut self, query: Pairs) -> Self {
        self.query = Some(query);
        self
    }

    /// First raw query value for `name`, without JSON sniffing.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query.as_deref().and_then(|q| first(q, name))
    }

    /// Parse a JSON request body.
    pub fn parse_json(body: &[u8]) -> Result<Value, GatewayError> {
        serde_json::from_slice(body).map_err(|e| GatewayError::MalformedInput(e.to_string()))
    }

    /// Parse an `application/x-www-form-urlencoded` body.
    pub fn parse_form(body: &[u8]) -> Result<Pairs, GatewayError> {
        let raw = std::str::from_utf8(body)
            .map_err(|_| GatewayError::MalformedInput("form body is not UTF-8".into()))?;
        check_percent_escapes(raw)?;
        serde_urlencoded::from_str(raw).map_err(|e| GatewayError::MalformedInput(e.to_string()))
    }

    /// Parse a query string. Undecodable input yields no parameters.
    pub fn parse_query(query: Option<&str>) -> Pairs {
        query
            .and_then(|q| serde_urlencoded::from_str(q).ok())
            .unwrap_or_default()
    }
}

impl ParamSource for RequestContext {
    fn get(&self, name: &str) -> Param {
        if let Some(value) = self.json.as_ref().and_then(|j| j.get(name)) {
            return Param::from_json(Some(value));
        }
        for pairs in [&self.form, &self.query].into_iter().flatten() {
            if let Some(raw) = first(pairs, name).filter(|v| !v.is_empty()) {
                return sniff(raw);
            }
        }
        Param::Missing
    }
}

fn first<'a>(pairs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Structured when it starts like JSON and parses as JSON; plain otherwise.
fn sniff(raw: &str) -> Param {
    if raw.starts_with('{') || raw.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            return Param::Json(value);
        }
    }
    Param::Str(raw.to_string())
}

fn check_percent_escapes(raw: &str) -> Result<(), GatewayError> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !valid {
                return Err(GatewayError::MalformedInput(format!(
                    "invalid percent escape at byte {i}"
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
