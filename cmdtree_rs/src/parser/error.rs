use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("argument {arg}: Must be specified.")]
    Required { arg: String },

    #[error("unrecognized arguments: {token}{}", suggestion_suffix(.suggestion))]
    Unknown {
        token: String,
        suggestion: Option<String>,
    },

    #[error("argument {arg}: Invalid choice: '{value}'. Valid choices are [{}].", .choices.join(", "))]
    InvalidChoice {
        arg: String,
        value: String,
        choices: Vec<String>,
    },

    #[error(
        "argument {}: At most one of {} can be specified.",
        .args.last().map(String::as_str).unwrap_or_default(),
        .args.join(" | ")
    )]
    Conflict { args: Vec<String> },

    #[error("argument {arg}: {reason}")]
    Invalid {
        arg: String,
        value: String,
        reason: String,
    },
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default()
}

impl ArgumentError {
    pub(crate) fn invalid(arg: &str, value: &str, reason: impl Into<String>) -> Self {
        ArgumentError::Invalid {
            arg: arg.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
