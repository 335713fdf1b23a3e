use k8s_openapi::api::core::v1::SELinuxOptions;
use policy_core::{
    CandidateObject, Decision, JsonPointer, Patch, PatchBuilder, Policy, StructuralError,
    constraint::FieldReport, pod_spec::PodSpec,
};
use serde_json::{Map, Value};

mod settings;
pub use settings::{Rule, Settings};

/// Enforces the SELinux context of pods.
///
/// With `MustRunAs` the options set by the pod, and by the containers that
/// override them, must match the configured ones. Conflicting values are
/// rejected, missing values are added by a patch.
pub struct SELinuxPolicy;

/// Where SELinux options are read and written
struct Target {
    pointer: JsonPointer,
    description: String,
}

fn targets(pod_spec: &PodSpec<'_>) -> Result<Vec<Target>, StructuralError> {
    let mut targets = vec![Target {
        pointer: pod_spec.field(["securityContext", "seLinuxOptions"]),
        description: "the pod".to_string(),
    }];

    // containers without their own options inherit the ones of the pod
    for container in pod_spec.containers()? {
        let pointer = container
            .pointer()
            .extend(["securityContext", "seLinuxOptions"]);
        if pod_spec.object().get(&pointer)?.is_some() {
            targets.push(Target {
                pointer,
                description: format!("{} '{}'", container.kind, container.name()),
            });
        }
    }

    Ok(targets)
}

/// Fields are compared in alphabetical order, which is also the order of
/// the patch operations
fn compare<'a>(required: &'a SELinuxOptions, actual: &'a SELinuxOptions) -> FieldReport<'a, str> {
    FieldReport::check([
        ("level", required.level.as_deref(), actual.level.as_deref()),
        ("role", required.role.as_deref(), actual.role.as_deref()),
        ("type", required.type_.as_deref(), actual.type_.as_deref()),
        ("user", required.user.as_deref(), actual.user.as_deref()),
    ])
}

fn options_of(
    object: &CandidateObject<'_>,
    target: &Target,
) -> Result<SELinuxOptions, StructuralError> {
    object
        .get_as::<SELinuxOptions>(&target.pointer)
        .map(Option::unwrap_or_default)
}

impl Policy for SELinuxPolicy {
    const NAME: &'static str = "selinux";
    type Settings = Settings;

    fn evaluate(
        settings: &Settings,
        object: &CandidateObject<'_>,
    ) -> Result<Decision, StructuralError> {
        if settings.rule == Rule::RunAsAny {
            return Ok(Decision::Allowed);
        }
        let Some(pod_spec) = PodSpec::locate(*object) else {
            return Ok(Decision::Allowed);
        };

        let required = settings.required_options();
        let mut violations = Vec::new();
        for target in targets(&pod_spec)? {
            let actual = options_of(object, &target)?;
            violations.extend(compare(&required, &actual).conflicts.iter().map(|c| {
                format!(
                    "SELinux option '{}' is '{}' on {}, expected '{}'",
                    c.field, c.actual, target.description, c.required
                )
            }));
        }

        Ok(Decision::from_violations(violations))
    }

    fn build_patch(
        settings: &Settings,
        object: &CandidateObject<'_>,
    ) -> Result<Patch, StructuralError> {
        let mut builder = PatchBuilder::new(object);
        if settings.rule == Rule::RunAsAny {
            return Ok(builder.build());
        }
        let Some(pod_spec) = PodSpec::locate(*object) else {
            return Ok(builder.build());
        };

        let required = settings.required_options();
        for target in targets(&pod_spec)? {
            let actual = options_of(object, &target)?;
            let missing: Map<String, Value> = compare(&required, &actual)
                .missing
                .iter()
                .map(|m| (m.field.to_string(), Value::String(m.required.to_string())))
                .collect();
            builder.merge(&target.pointer, missing)?;
        }

        Ok(builder.build())
    }
}
