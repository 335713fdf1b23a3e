use std::collections::BTreeSet;

use itertools::Itertools;
use policy_core::{CandidateObject, Decision, JsonPointer, Policy, StructuralError};

mod settings;
pub use settings::{Criteria, Settings};

/// Checks the label keys of any resource against the configured criteria
pub struct LabelsPolicy;

/// Checks the annotation keys of any resource against the configured
/// criteria
pub struct AnnotationsPolicy;

impl Policy for LabelsPolicy {
    const NAME: &'static str = "labels";
    type Settings = Settings;

    fn evaluate(
        settings: &Settings,
        object: &CandidateObject<'_>,
    ) -> Result<Decision, StructuralError> {
        check_keys(settings, object, "labels")
    }
}

impl Policy for AnnotationsPolicy {
    const NAME: &'static str = "annotations";
    type Settings = Settings;

    fn evaluate(
        settings: &Settings,
        object: &CandidateObject<'_>,
    ) -> Result<Decision, StructuralError> {
        check_keys(settings, object, "annotations")
    }
}

/// Keys of the `metadata.<field>` map, a missing map has no keys
fn metadata_keys<'a>(
    object: &CandidateObject<'a>,
    field: &str,
) -> Result<BTreeSet<&'a str>, StructuralError> {
    let pointer = JsonPointer::from_tokens(["metadata", field]);
    Ok(object
        .get_object(&pointer)?
        .map(|entries| entries.keys().map(String::as_str).collect())
        .unwrap_or_default())
}

fn check_keys(
    settings: &Settings,
    object: &CandidateObject<'_>,
    field: &str,
) -> Result<Decision, StructuralError> {
    let keys = metadata_keys(object, field)?;
    let values = &settings.values;
    let present: Vec<&str> = values
        .iter()
        .map(String::as_str)
        .filter(|value| keys.contains(value))
        .collect();

    let reason = match settings.criteria {
        Criteria::ContainsAnyOf if present.is_empty() => Some(format!(
            "the resource must have at least one of the following {field}: {}",
            values.iter().join(", ")
        )),
        Criteria::DoesNotContainAnyOf if !present.is_empty() => Some(format!(
            "the following {field} are not allowed: {}",
            present.iter().join(", ")
        )),
        Criteria::ContainsAllOf if present.len() < values.len() => Some(format!(
            "the following {field} are required: {}",
            values
                .iter()
                .filter(|value| !keys.contains(value.as_str()))
                .join(", ")
        )),
        Criteria::DoesNotContainAllOf if present.len() == values.len() => Some(format!(
            "the resource must not have all of the following {field}: {}",
            values.iter().join(", ")
        )),
        Criteria::ContainsOtherThan if keys.iter().all(|key| values.contains(*key)) => {
            Some(format!(
                "the resource must have {field} other than: {}",
                values.iter().join(", ")
            ))
        }
        Criteria::DoesNotContainOtherThan => {
            let extra = keys.iter().filter(|key| !values.contains(**key)).join(", ");
            (!extra.is_empty()).then(|| format!("the following {field} are not allowed: {extra}"))
        }
        _ => None,
    };

    Ok(reason.map_or(Decision::Allowed, Decision::reject))
}
