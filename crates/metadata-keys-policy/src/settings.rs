use std::collections::BTreeSet;

use policy_core::settings::validation_error;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// How the keys of the resource are compared with the configured values
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Criteria {
    /// At least one of the values must be present
    #[default]
    ContainsAnyOf,
    /// None of the values can be present
    DoesNotContainAnyOf,
    /// Every value must be present
    ContainsAllOf,
    /// The values cannot be all present at the same time
    DoesNotContainAllOf,
    /// At least one key must not be among the values
    ContainsOtherThan,
    /// Every key must be among the values
    DoesNotContainOtherThan,
}

/// There is no meaningful default: absent settings fail validation.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct Settings {
    pub criteria: Criteria,
    #[validate(
        length(min = 1, message = "must contain at least one key"),
        custom(function = "validate_keys")
    )]
    pub values: BTreeSet<String>,
}

fn validate_keys(values: &BTreeSet<String>) -> Result<(), ValidationError> {
    if values.iter().any(String::is_empty) {
        return Err(validation_error("empty_key", "keys must not be empty"));
    }
    Ok(())
}
