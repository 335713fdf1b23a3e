//! Parsing and validation of the policy settings.
//!
//! Settings are validated with the `validator` derive macros. The nested
//! `ValidationErrors` tree is flattened into a sorted list of
//! `field: message` entries, so that the same invalid document always
//! produces the same message.

use std::{borrow::Cow, fmt};

use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::errors::PolicyError;

/// Settings of a policy. `Default` is the posture used when no settings
/// are provided.
pub trait PolicySettings: DeserializeOwned + Default + Validate {}

impl<T> PolicySettings for T where T: DeserializeOwned + Default + Validate {}

/// Parse raw settings. An empty buffer, whitespace or `null` yield the
/// default settings. Unknown fields are ignored.
pub fn parse<S: PolicySettings>(raw: &[u8]) -> Result<S, PolicyError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(S::default());
    }
    let value: Value = serde_json::from_slice(raw).map_err(PolicyError::SettingsParse)?;
    from_value(value)
}

pub fn from_value<S: PolicySettings>(value: Value) -> Result<S, PolicyError> {
    if value.is_null() {
        return Ok(S::default());
    }
    serde_json::from_value(value).map_err(PolicyError::SettingsParse)
}

pub fn validate<S: Validate>(settings: &S) -> Result<(), SettingsErrors> {
    settings.validate().map_err(SettingsErrors::from)
}

/// Parse and validate raw settings
pub fn load<S: PolicySettings>(raw: &[u8]) -> Result<S, PolicyError> {
    let settings = parse::<S>(raw)?;
    validate(&settings)?;
    Ok(settings)
}

pub fn load_value<S: PolicySettings>(value: Value) -> Result<S, PolicyError> {
    let settings = from_value::<S>(value)?;
    validate(&settings)?;
    Ok(settings)
}

/// Build a validation error carrying a human readable message, for use
/// inside of `custom` and `schema` validation functions.
pub fn validation_error(code: &'static str, message: impl Into<String>) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Owned(message.into()));
    error
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SettingsViolation {
    pub field: String,
    pub message: String,
}

impl fmt::Display for SettingsViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All the problems found inside of the settings, sorted by field path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsErrors(Vec<SettingsViolation>);

impl fmt::Display for SettingsErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SettingsErrors {}

impl From<ValidationErrors> for SettingsErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut violations = Vec::new();
        flatten("", &errors, &mut violations);
        violations.sort();
        violations.dedup();
        SettingsErrors(violations)
    }
}

fn flatten(prefix: &str, errors: &ValidationErrors, violations: &mut Vec<SettingsViolation>) {
    for (key, kind) in errors.errors() {
        let key = key.to_string();
        let field = if key == "__all__" {
            if prefix.is_empty() {
                "settings".to_string()
            } else {
                prefix.to_string()
            }
        } else if prefix.is_empty() {
            camel_case(&key)
        } else {
            format!("{prefix}.{}", camel_case(&key))
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                violations.extend(field_errors.iter().map(|error| SettingsViolation {
                    field: field.clone(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string()),
                }));
            }
            ValidationErrorsKind::Struct(nested) => flatten(&field, nested, violations),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten(&format!("{field}[{index}]"), nested, violations);
                }
            }
        }
    }
}

/// Rust field names are reported with the name they have inside of the
/// settings document: `allowed_flex_volumes` becomes `allowedFlexVolumes`
/// and `type_` becomes `type`.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.trim_end_matches('_').chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
