//! Typed argument values and conversion from raw tokens.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use super::ArgumentError;
use crate::tree::{ArgSpec, ValueType};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Seconds.
    Duration(u64),
    Path(PathBuf),
    Map(BTreeMap<String, String>),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<u64> {
        match self {
            Value::Duration(secs) => Some(*secs),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Scalar rendering used for display and scope propagation.
    pub fn to_plain(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Duration(secs) => format!("{secs}s"),
            Value::Path(p) => p.display().to_string(),
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(","),
            Value::List(items) => items
                .iter()
                .map(Value::to_plain)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

/// Parses `90`, `45s`, `10m`, `2h`, `1d` or combinations such as `1h30m`.
pub fn parse_duration(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(secs);
    }
    let mut total: u64 = 0;
    let mut digits = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let unit = match ch.to_ascii_lowercase() {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            _ => return None,
        };
        let amount: u64 = digits.parse().ok()?;
        total = total.checked_add(amount.checked_mul(unit)?)?;
        digits.clear();
    }
    if !digits.is_empty() {
        return None;
    }
    Some(total)
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Merges `k=v[,k=v]` pairs into `map`; later keys win.
pub fn parse_key_values(
    spec: &ArgSpec,
    raw: &str,
    map: &mut BTreeMap<String, String>,
) -> Result<(), ArgumentError> {
    for pair in raw.split(',').filter(|p| !p.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ArgumentError::invalid(
                &spec.display(),
                raw,
                format!("Bad syntax for dict arg: [{pair}]. Please see `KEY=VALUE`."),
            ));
        };
        if key.is_empty() {
            return Err(ArgumentError::invalid(
                &spec.display(),
                raw,
                format!("Bad syntax for dict arg: [{pair}]. Keys must be non-empty."),
            ));
        }
        map.insert(key.to_string(), value.to_string());
    }
    Ok(())
}

/// Converts one raw token for `spec`. Key-value arguments are handled by
/// [`parse_key_values`] because they accumulate.
pub fn convert(spec: &ArgSpec, raw: &str) -> Result<Value, ArgumentError> {
    let arg = spec.display();
    match &spec.value_type {
        ValueType::String => Ok(Value::Str(raw.to_string())),
        ValueType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ArgumentError::invalid(&arg, raw, format!("Value must be an integer; received: {raw}"))),
        ValueType::Float => raw
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| ArgumentError::invalid(&arg, raw, format!("Value must be a number; received: {raw}"))),
        ValueType::Boolean => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| ArgumentError::invalid(&arg, raw, format!("Value must be true or false; received: {raw}"))),
        ValueType::Choice(choices) => {
            if choices.iter().any(|c| c == raw) {
                Ok(Value::Str(raw.to_string()))
            } else {
                Err(ArgumentError::InvalidChoice {
                    arg,
                    value: raw.to_string(),
                    choices: choices.clone(),
                })
            }
        }
        ValueType::Duration => parse_duration(raw).map(Value::Duration).ok_or_else(|| {
            ArgumentError::invalid(
                &arg,
                raw,
                format!("Failed to parse duration: {raw}. Use an integer number of seconds or a value such as 30s, 10m, 2h or 1d."),
            )
        }),
        ValueType::Path => Ok(Value::Path(PathBuf::from(raw))),
        ValueType::KeyValue => {
            let mut map = BTreeMap::new();
            parse_key_values(spec, raw, &mut map)?;
            Ok(Value::Map(map))
        }
    }
}
