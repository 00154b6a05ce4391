//! Inbound parameter shaping for proxied endpoints: required-field checks,
//! query and body whitelists, and path template substitution.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

use super::catalog::{Param, Required};

/// Parse a request body. An empty body is treated as `{}`.
pub fn parse_body(bytes: &[u8]) -> AppResult<Value> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|_| AppError::bad_request("malformed_body", "Malformed JSON body"))
}

/// Query pairs as a JSON object of strings; the last occurrence of a key wins.
pub fn query_input(pairs: &[(String, String)]) -> Value {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert(k.clone(), Value::String(v.clone()));
    }
    Value::Object(map)
}

/// Walk a dotted path (`filters.aid`) through nested objects.
pub fn lookup<'a>(input: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(input, |cur, key| cur.as_object()?.get(key))
}

pub fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// First unmet requirement, reported as a 400 before anything leaves the process.
pub fn check_required(required: &[Required], input: &Value) -> AppResult<()> {
    for req in required {
        let ok = match (req, lookup(input, req.field())) {
            (_, None) => false,
            (Required::Present(_), Some(_)) => true,
            (Required::NonBlank(_), Some(v)) => !is_blank(v),
        };
        if !ok {
            return Err(AppError::bad_request(
                "missing_field".to_string(),
                format!("Missing required field: '{}'", req.field()),
            ));
        }
    }
    Ok(())
}

/// Forwarded query pairs for a whitelist. Empty inbound values are dropped
/// (without falling back to the default); list params repeat the key.
pub fn shape_query(params: &[Param], pairs: &[(String, String)]) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for param in params {
        let supplied: Vec<&String> = pairs.iter().filter(|(k, _)| k == param.name).map(|(_, v)| v).collect();
        if param.list {
            out.extend(supplied.into_iter().filter(|v| !v.is_empty()).map(|v| (param.name.to_string(), v.clone())));
            continue;
        }
        let value = match supplied.last() {
            Some(v) => Some((*v).clone()),
            None => param.default.and_then(|d| d.to_query()),
        };
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            out.push((param.name.to_string(), v));
        }
    }
    out
}

/// Forwarded body for a whitelist. Absent or null fields take the default,
/// or are omitted when there is none.
pub fn shape_body(params: &[Param], input: &Value) -> Value {
    let mut out = Map::new();
    for param in params {
        let value = input.get(param.name)
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| param.default.map(|d| d.to_json()));
        if let Some(v) = value {
            out.insert(param.name.to_string(), v);
        }
    }
    Value::Object(out)
}

/// Substitute `{name}` segments with percent-encoded path values.
pub fn fill_path(template: &str, values: &HashMap<String, String>) -> AppResult<String> {
    let mut segments = Vec::new();
    for seg in template.split('/') {
        match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => {
                let value = values.get(name).map(String::as_str).unwrap_or_default();
                // dot segments survive encoding and would be resolved by Url::join
                if value == "." || value == ".." {
                    return Err(AppError::bad_request(
                        "invalid_path".to_string(),
                        format!("Invalid value for path parameter '{}'", name),
                    ));
                }
                segments.push(urlencoding::encode(value).into_owned());
            }
            None => segments.push(seg.to_string()),
        }
    }
    Ok(segments.join("/"))
}
