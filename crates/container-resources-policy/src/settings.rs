use itertools::Itertools;
use policy_core::settings::validation_error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use crate::quantity::{Quantity, QuantityError};

/// A quantity as written in the settings. Values that cannot be parsed
/// are kept, so that validation can report every one of them.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum QuantitySetting {
    Valid(Quantity),
    Invalid(Value),
}

impl QuantitySetting {
    pub fn quantity(&self) -> Option<&Quantity> {
        match self {
            QuantitySetting::Valid(quantity) => Some(quantity),
            QuantitySetting::Invalid(_) => None,
        }
    }

    fn error(&self) -> Option<QuantityError> {
        match self {
            QuantitySetting::Valid(_) => None,
            QuantitySetting::Invalid(Value::String(raw)) => raw.parse::<Quantity>().err(),
            QuantitySetting::Invalid(other) => Some(QuantityError::Invalid(other.to_string())),
        }
    }
}

/// Defaults and maximum of one resource
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq, Validate)]
#[serde(rename_all = "camelCase", default)]
#[validate(schema(function = "validate_constraint"))]
pub struct ResourceConstraint {
    #[serde(skip_serializing_if = "Option::is_none")]
    default_request: Option<QuantitySetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_limit: Option<QuantitySetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_limit: Option<QuantitySetting>,
}

impl ResourceConstraint {
    pub fn default_request(&self) -> Option<&Quantity> {
        self.default_request.as_ref().and_then(QuantitySetting::quantity)
    }

    pub fn default_limit(&self) -> Option<&Quantity> {
        self.default_limit.as_ref().and_then(QuantitySetting::quantity)
    }

    pub fn max_limit(&self) -> Option<&Quantity> {
        self.max_limit.as_ref().and_then(QuantitySetting::quantity)
    }
}

/// Absent settings do not constrain anything.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub cpu: Option<ResourceConstraint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub memory: Option<ResourceConstraint>,
    /// Images whose containers are left alone. A trailing `*` matches
    /// any image with the given prefix.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[validate(custom(function = "validate_ignore_images"))]
    pub ignore_images: Vec<String>,
}

impl Settings {
    /// Resource name and constraint, for every constrained resource
    pub fn constraints(&self) -> impl Iterator<Item = (&'static str, &ResourceConstraint)> {
        [("cpu", self.cpu.as_ref()), ("memory", self.memory.as_ref())]
            .into_iter()
            .filter_map(|(resource, constraint)| constraint.map(|c| (resource, c)))
    }

    pub fn is_ignored(&self, image: Option<&str>) -> bool {
        let Some(image) = image else {
            return false;
        };
        self.ignore_images
            .iter()
            .any(|pattern| match pattern.strip_suffix('*') {
                Some(prefix) => image.starts_with(prefix),
                None => image == pattern,
            })
    }
}

fn validate_constraint(constraint: &ResourceConstraint) -> Result<(), ValidationError> {
    let mut problems: Vec<String> = [
        ("defaultRequest", &constraint.default_request),
        ("defaultLimit", &constraint.default_limit),
        ("maxLimit", &constraint.max_limit),
    ]
    .into_iter()
    .filter_map(|(field, setting)| {
        let error = setting.as_ref()?.error()?;
        Some(format!("{field} is invalid: {error}"))
    })
    .collect();

    let values = [
        ("defaultRequest", constraint.default_request()),
        ("defaultLimit", constraint.default_limit()),
        ("maxLimit", constraint.max_limit()),
    ];

    problems.extend(values.iter().filter_map(|(field, value)| match value {
        Some(quantity) if quantity.is_negative() => {
            Some(format!("{field} ({quantity}) must not be negative"))
        }
        _ => None,
    }));

    // each value must not exceed the ones that follow it
    for (i, (lower_field, lower)) in values.iter().enumerate() {
        for (upper_field, upper) in &values[i + 1..] {
            if let (Some(lower), Some(upper)) = (lower, upper) {
                if lower > upper {
                    problems.push(format!(
                        "{lower_field} ({lower}) must not exceed {upper_field} ({upper})"
                    ));
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(validation_error("invalid_constraint", problems.join(", ")))
    }
}

fn validate_ignore_images(images: &[String]) -> Result<(), ValidationError> {
    let problems: Vec<String> = images
        .iter()
        .filter_map(|image| {
            if image.is_empty() {
                Some("images must not be empty".to_string())
            } else if image.trim_end_matches('*').contains('*') || image.ends_with("**") {
                Some(format!("'{image}' can only have a single trailing '*'"))
            } else {
                None
            }
        })
        .unique()
        .collect();

    if problems.is_empty() {
        Ok(())
    } else {
        Err(validation_error("invalid_image", problems.join(", ")))
    }
}
