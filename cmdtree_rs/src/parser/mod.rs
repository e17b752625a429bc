//! Argument parser.
//!
//! Hand-written token loop over the argument schema of one command:
//! `--name=value`, `--name value`, boolean `--flag` / `--no-flag`, short
//! `-x value` / `-xvalue`, and `--` to end flag processing. Positionals are
//! assigned in declaration order; a repeated positional takes the rest.
//!
//! Tolerant mode is used while completing a partial command line: missing
//! required arguments and unconvertible values are skipped instead of
//! reported.

mod error;
mod namespace;
mod values;

use std::collections::BTreeMap;

pub use error::ArgumentError;
pub use namespace::{ArgValue, Namespace, ValueSource};
pub use values::{Value, convert, parse_bool, parse_duration, parse_key_values};

use crate::cancel::CancelToken;
use crate::tree::{ArgSpec, ValueType, suggest};

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(Namespace),
    /// `--help` or `-h` was given.
    Help,
}

#[derive(Debug, Clone)]
pub struct ArgParser<'a> {
    specs: &'a [ArgSpec],
    tolerant: bool,
    cancel: Option<&'a CancelToken>,
}

fn is_negative_number(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-') && token[1..].parse::<f64>().is_ok()
}

fn looks_like_flag(token: &str) -> bool {
    token.starts_with('-') && token != "-" && !is_negative_number(token)
}

struct FlagMatch {
    index: usize,
    attached: Option<String>,
    negated: bool,
}

impl<'a> ArgParser<'a> {
    pub fn new(specs: &'a [ArgSpec]) -> Self {
        Self {
            specs,
            tolerant: false,
            cancel: None,
        }
    }

    pub fn tolerant(mut self, tolerant: bool) -> Self {
        self.tolerant = tolerant;
        self
    }

    pub fn cancel(mut self, token: &'a CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn declares(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.is_flag() && s.name == name)
    }

    fn match_flag(&self, token: &str) -> Result<FlagMatch, ArgumentError> {
        if let Some(body) = token.strip_prefix("--") {
            let (name, attached) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (body, None),
            };
            if let Some(index) = self.specs.iter().position(|s| s.is_flag() && s.name == name) {
                return Ok(FlagMatch {
                    index,
                    attached,
                    negated: false,
                });
            }
            if let Some(positive) = name.strip_prefix("no-") {
                if let Some(index) = self
                    .specs
                    .iter()
                    .position(|s| s.is_flag() && s.name == positive && !s.takes_value())
                {
                    return Ok(FlagMatch {
                        index,
                        attached,
                        negated: true,
                    });
                }
            }
            let names = self
                .specs
                .iter()
                .filter(|s| s.is_flag() && !s.hidden)
                .map(|s| s.name.as_str());
            return Err(ArgumentError::Unknown {
                token: format!("--{name}"),
                suggestion: suggest(name, names).map(|s| format!("--{s}")),
            });
        }

        let mut chars = token.chars();
        chars.next();
        let short = chars.next();
        let rest: String = chars.collect();
        let found = short.and_then(|c| {
            self.specs
                .iter()
                .position(|s| s.is_flag() && s.short == Some(c))
        });
        match found {
            Some(index) if self.specs[index].takes_value() || rest.is_empty() => Ok(FlagMatch {
                index,
                attached: (!rest.is_empty()).then_some(rest),
                negated: false,
            }),
            _ => Err(ArgumentError::Unknown {
                token: token.to_string(),
                suggestion: None,
            }),
        }
    }

    pub fn parse(&self, tokens: &[String]) -> crate::Result<ParseOutcome> {
        let mut raw: Vec<Vec<String>> = vec![Vec::new(); self.specs.len()];
        let mut positionals: Vec<String> = Vec::new();
        let mut end_of_flags = false;
        let mut i = 0;

        while i < tokens.len() {
            if let Some(cancel) = self.cancel {
                cancel.check()?;
            }
            let token = &tokens[i];
            i += 1;

            if end_of_flags || !looks_like_flag(token) {
                positionals.push(token.clone());
                continue;
            }
            if token == "--" {
                end_of_flags = true;
                continue;
            }
            if (token == "--help" && !self.declares("help"))
                || (token == "-h" && !self.specs.iter().any(|s| s.short == Some('h')))
            {
                return Ok(ParseOutcome::Help);
            }

            let matched = match self.match_flag(token) {
                Ok(matched) => matched,
                Err(_) if self.tolerant => continue,
                Err(e) => return Err(e.into()),
            };
            let spec = &self.specs[matched.index];

            if !spec.takes_value() {
                let value = match matched.attached {
                    Some(attached) => match parse_bool(&attached) {
                        Some(b) => b != matched.negated,
                        None if self.tolerant => continue,
                        None => {
                            return Err(ArgumentError::invalid(
                                &spec.display(),
                                &attached,
                                format!("Value must be true or false; received: {attached}"),
                            )
                            .into());
                        }
                    },
                    None => !matched.negated,
                };
                raw[matched.index].push(value.to_string());
                continue;
            }

            let value = match matched.attached {
                Some(attached) => attached,
                None => match tokens.get(i) {
                    Some(next) if next != "--" && !looks_like_flag(next) => {
                        i += 1;
                        next.clone()
                    }
                    _ if self.tolerant => continue,
                    _ => {
                        return Err(ArgumentError::invalid(
                            &spec.display(),
                            "",
                            "expected one argument",
                        )
                        .into());
                    }
                },
            };
            raw[matched.index].push(value);
        }

        let mut remaining = positionals.into_iter();
        for (index, spec) in self.specs.iter().enumerate() {
            if !spec.is_positional() {
                continue;
            }
            if spec.repeated {
                raw[index].extend(remaining.by_ref());
            } else if let Some(value) = remaining.next() {
                raw[index].push(value);
            }
        }
        if let Some(extra) = remaining.next() {
            if !self.tolerant {
                return Err(ArgumentError::Unknown {
                    token: extra,
                    suggestion: None,
                }
                .into());
            }
        }

        let mut namespace = Namespace::new();
        for (index, spec) in self.specs.iter().enumerate() {
            let entry = self.build_entry(spec, &raw[index])?;
            namespace.record(spec.dest(), entry);
        }

        if self.tolerant {
            return Ok(ParseOutcome::Parsed(namespace));
        }

        let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for spec in self.specs {
            if let Some(group) = spec.mutex_group.as_deref() {
                if namespace.is_specified(&spec.dest()) {
                    groups.entry(group).or_default().push(spec.display());
                }
            }
        }
        if let Some(args) = groups.into_values().find(|args| args.len() > 1) {
            return Err(ArgumentError::Conflict { args }.into());
        }

        if let Some(missing) = self
            .specs
            .iter()
            .find(|s| s.required && namespace.get(&s.dest()).is_none())
        {
            return Err(ArgumentError::Required {
                arg: missing.display(),
            }
            .into());
        }

        Ok(ParseOutcome::Parsed(namespace))
    }

    fn build_entry(&self, spec: &ArgSpec, raw: &[String]) -> Result<ArgValue, ArgumentError> {
        if raw.is_empty() {
            let Some(default) = &spec.default else {
                return Ok(ArgValue::unset());
            };
            let value = match self.convert_all(spec, std::slice::from_ref(default)) {
                Ok(value) => value,
                Err(_) if self.tolerant => return Ok(ArgValue::unset()),
                Err(e) => return Err(e),
            };
            return Ok(ArgValue {
                value: Some(value),
                specified: false,
                source: ValueSource::Default,
            });
        }

        match self.convert_all(spec, raw) {
            Ok(value) => Ok(ArgValue {
                value: Some(value),
                specified: true,
                source: ValueSource::CommandLine,
            }),
            Err(_) if self.tolerant => Ok(ArgValue::unset()),
            Err(e) => Err(e),
        }
    }

    fn convert_all(&self, spec: &ArgSpec, raw: &[String]) -> Result<Value, ArgumentError> {
        if spec.value_type == ValueType::KeyValue {
            let mut map = BTreeMap::new();
            for item in raw {
                parse_key_values(spec, item, &mut map)?;
            }
            return Ok(Value::Map(map));
        }
        if spec.value_type == ValueType::Boolean {
            let last = raw.last().map(String::as_str).unwrap_or("false");
            return Ok(Value::Bool(last == "true"));
        }
        if spec.repeated {
            let items: Vec<&str> = if spec.is_flag() {
                raw.iter().flat_map(|r| r.split(',')).filter(|s| !s.is_empty()).collect()
            } else {
                raw.iter().map(String::as_str).collect()
            };
            return items
                .into_iter()
                .map(|item| convert(spec, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List);
        }
        match raw.last() {
            Some(last) => convert(spec, last),
            None => Ok(Value::List(Vec::new())),
        }
    }
}
