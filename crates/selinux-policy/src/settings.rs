use k8s_openapi::api::core::v1::SELinuxOptions;
use lazy_static::lazy_static;
use policy_core::settings::validation_error;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

lazy_static! {
    // sensitivity[:categories] with an optional range
    static ref MLS_LEVEL: Regex = Regex::new(
        r"^s[0-9]+(:c[0-9]+([.,]c[0-9]+)*)?(-s[0-9]+(:c[0-9]+([.,]c[0-9]+)*)?)?$"
    )
    .unwrap();
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rule {
    MustRunAs,
    #[default]
    RunAsAny,
}

/// Absent settings mean `RunAsAny`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq, Validate)]
#[serde(rename_all = "camelCase", default)]
#[validate(schema(function = "validate_rule"))]
pub struct Settings {
    pub rule: Rule,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub role: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub type_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_level"))]
    pub level: Option<String>,
}

impl Settings {
    pub fn must_run_as(options: SELinuxOptions) -> Self {
        Settings {
            rule: Rule::MustRunAs,
            user: options.user,
            role: options.role,
            type_: options.type_,
            level: options.level,
        }
    }

    /// The options every pod and container must have
    pub fn required_options(&self) -> SELinuxOptions {
        SELinuxOptions {
            user: self.user.clone(),
            role: self.role.clone(),
            type_: self.type_.clone(),
            level: self.level.clone(),
        }
    }

    fn has_options(&self) -> bool {
        self.user.is_some() || self.role.is_some() || self.type_.is_some() || self.level.is_some()
    }
}

fn validate_rule(settings: &Settings) -> Result<(), ValidationError> {
    match (settings.rule, settings.has_options()) {
        (Rule::MustRunAs, false) => Err(validation_error(
            "missing_options",
            "MustRunAs requires at least one of user, role, type or level",
        )),
        (Rule::RunAsAny, true) => Err(validation_error(
            "unexpected_options",
            "RunAsAny does not accept user, role, type or level",
        )),
        _ => Ok(()),
    }
}

fn validate_level(level: &str) -> Result<(), ValidationError> {
    if MLS_LEVEL.is_match(level) {
        Ok(())
    } else {
        Err(validation_error(
            "invalid_level",
            format!("'{level}' is not a valid MLS level"),
        ))
    }
}
