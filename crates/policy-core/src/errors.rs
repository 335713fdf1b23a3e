use thiserror::Error;

use crate::settings::SettingsErrors;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum PointerError {
    #[error("JSON pointer '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    #[error("reference token '{0}' contains an invalid '~' escape sequence")]
    InvalidEscape(String),
}

/// The candidate object has a field with an unexpected shape.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum StructuralError {
    #[error("field '{pointer}' must be {expected}, found {found}")]
    UnexpectedType {
        pointer: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field '{pointer}' is malformed: {message}")]
    Malformed { pointer: String, message: String },
}

/// Everything that makes an evaluation fail closed.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("cannot parse admission request: {0}")]
    RequestParse(#[source] serde_json::Error),

    #[error("cannot parse admission request: {0}")]
    InvalidRequest(String),

    #[error("cannot parse settings: {0}")]
    SettingsParse(#[source] serde_json::Error),

    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] SettingsErrors),

    #[error("malformed object: {0}")]
    Structural(#[from] StructuralError),
}

impl PolicyError {
    /// HTTP status code reported inside of the fail-closed response
    pub fn code(&self) -> u16 {
        match self {
            PolicyError::RequestParse(_)
            | PolicyError::InvalidRequest(_)
            | PolicyError::SettingsParse(_)
            | PolicyError::InvalidSettings(_) => 400,
            PolicyError::Structural(_) => 422,
        }
    }
}

/// Name of the JSON type of `value`, used inside of error messages
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
