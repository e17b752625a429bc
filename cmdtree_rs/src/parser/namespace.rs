use std::collections::BTreeMap;

use serde::Serialize;

use super::Value;

/// Where a namespace value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    CommandLine,
    Default,
    Unset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgValue {
    pub value: Option<Value>,
    pub specified: bool,
    pub source: ValueSource,
}

impl ArgValue {
    pub(crate) fn unset() -> Self {
        Self {
            value: None,
            specified: false,
            source: ValueSource::Unset,
        }
    }
}

/// Parsed arguments keyed by destination name (`machine_type`, `name`).
/// Every declared argument has an entry, specified or not.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Namespace {
    args: BTreeMap<String, ArgValue>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, dest: String, value: ArgValue) {
        self.args.insert(dest, value);
    }

    /// Sets `dest` as if it had been given on the command line.
    pub fn set(&mut self, dest: &str, value: Value) {
        self.args.insert(
            dest.to_string(),
            ArgValue {
                value: Some(value),
                specified: true,
                source: ValueSource::CommandLine,
            },
        );
    }

    pub fn entry(&self, dest: &str) -> Option<&ArgValue> {
        self.args.get(dest)
    }

    pub fn get(&self, dest: &str) -> Option<&Value> {
        self.args.get(dest).and_then(|a| a.value.as_ref())
    }

    pub fn is_declared(&self, dest: &str) -> bool {
        self.args.contains_key(dest)
    }

    pub fn is_specified(&self, dest: &str) -> bool {
        self.args.get(dest).is_some_and(|a| a.specified)
    }

    pub fn source(&self, dest: &str) -> ValueSource {
        self.args
            .get(dest)
            .map(|a| a.source)
            .unwrap_or(ValueSource::Unset)
    }

    pub fn str(&self, dest: &str) -> Option<&str> {
        self.get(dest).and_then(Value::as_str)
    }

    /// True only for a boolean argument set to true.
    pub fn flag(&self, dest: &str) -> bool {
        self.get(dest).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Values of a repeated argument; a scalar yields one item.
    pub fn strings(&self, dest: &str) -> Vec<String> {
        match self.get(dest) {
            Some(Value::List(items)) => items.iter().map(Value::to_plain).collect(),
            Some(other) => vec![other.to_plain()],
            None => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.args.iter().map(|(k, v)| (k.as_str(), v))
    }
}
