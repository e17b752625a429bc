//! Declarative argument schemas.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    Positional,
    Flag,
}

/// How a raw token converts into a [`crate::parser::Value`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "choices", rename_all = "kebab-case")]
pub enum ValueType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Choice(Vec<String>),
    /// Integer seconds or a `1h30m` style duration.
    Duration,
    Path,
    /// Comma separated `KEY=VALUE` pairs, accumulated across occurrences.
    KeyValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    /// Flag name without dashes (`machine-type`) or positional metavar
    /// (`NAME`).
    pub name: String,
    pub kind: ArgKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub repeated: bool,
    #[serde(default)]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutex_group: Option<String>,
    /// Completer identifier resolved through the completer registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completer: Option<String>,
    /// Complete values as `name:scope1:scope2` resource identifiers.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub gri: bool,
    #[serde(default)]
    pub help: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
}

impl ArgSpec {
    fn new(name: &str, kind: ArgKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            short: None,
            required: false,
            repeated: false,
            value_type: ValueType::String,
            default: None,
            mutex_group: None,
            completer: None,
            gri: false,
            help: String::new(),
            hidden: false,
        }
    }

    pub fn flag(name: &str) -> Self {
        Self::new(name, ArgKind::Flag)
    }

    /// Positionals are required unless marked [`optional`](Self::optional).
    pub fn positional(name: &str) -> Self {
        let mut spec = Self::new(name, ArgKind::Positional);
        spec.required = true;
        spec
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn value(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn boolean(self) -> Self {
        self.value(ValueType::Boolean)
    }

    pub fn choices(self, choices: &[&str]) -> Self {
        self.value(ValueType::Choice(
            choices.iter().map(|c| c.to_string()).collect(),
        ))
    }

    pub fn default_value(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    pub fn mutex(mut self, group: &str) -> Self {
        self.mutex_group = Some(group.to_string());
        self
    }

    pub fn completer(mut self, id: &str) -> Self {
        self.completer = Some(id.to_string());
        self
    }

    pub fn gri(mut self) -> Self {
        self.gri = true;
        self
    }

    pub fn help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn is_flag(&self) -> bool {
        self.kind == ArgKind::Flag
    }

    pub fn is_positional(&self) -> bool {
        self.kind == ArgKind::Positional
    }

    pub fn takes_value(&self) -> bool {
        self.is_positional() || self.value_type != ValueType::Boolean
    }

    /// Namespace key: lowercase with `-` folded to `_`.
    pub fn dest(&self) -> String {
        self.name.to_lowercase().replace('-', "_")
    }

    /// How the argument is written on the command line: `--zone` or `NAME`.
    pub fn display(&self) -> String {
        match self.kind {
            ArgKind::Flag => format!("--{}", self.name),
            ArgKind::Positional => self.name.clone(),
        }
    }

    /// Placeholder used in usage text.
    pub fn metavar(&self) -> String {
        match self.kind {
            ArgKind::Positional => self.name.clone(),
            ArgKind::Flag => self.name.to_uppercase().replace('-', "_"),
        }
    }

    pub fn choice_values(&self) -> Option<&[String]> {
        match &self.value_type {
            ValueType::Choice(choices) => Some(choices),
            _ => None,
        }
    }
}
