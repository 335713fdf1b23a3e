use policy_core::{
    CandidateObject, Decision, JsonPointer, Patch, PatchBuilder, Policy, StructuralError,
    pod_spec::{Container, ContainerKind, PodSpec},
};
use serde_json::Value;

pub mod quantity;
mod settings;

use quantity::Quantity;
pub use settings::{ResourceConstraint, Settings};

/// Ephemeral containers cannot declare resources
const CONSTRAINED_CONTAINERS: [ContainerKind; 2] =
    [ContainerKind::Container, ContainerKind::InitContainer];

/// Caps the resources of the containers and fills in the missing
/// requests and limits with defaults
pub struct ContainerResourcesPolicy;

fn resource_pointer(container: &Container<'_>, section: &str, resource: &str) -> JsonPointer {
    container.pointer().extend(["resources", section, resource])
}

fn read_quantity(
    object: &CandidateObject<'_>,
    pointer: &JsonPointer,
) -> Result<Option<Quantity>, StructuralError> {
    object.get_as::<Quantity>(pointer)
}

fn constrained_containers<'a>(
    settings: &'a Settings,
    pod_spec: &PodSpec<'a>,
) -> Result<impl Iterator<Item = Container<'a>> + 'a, StructuralError> {
    Ok(pod_spec
        .containers_of(&CONSTRAINED_CONTAINERS)?
        .filter(move |container| !settings.is_ignored(container.image())))
}

impl Policy for ContainerResourcesPolicy {
    const NAME: &'static str = "container-resources";
    type Settings = Settings;

    fn evaluate(
        settings: &Settings,
        object: &CandidateObject<'_>,
    ) -> Result<Decision, StructuralError> {
        let Some(pod_spec) = PodSpec::locate(*object) else {
            return Ok(Decision::Allowed);
        };

        let mut violations = Vec::new();
        for container in constrained_containers(settings, &pod_spec)? {
            for (resource, constraint) in settings.constraints() {
                let Some(max) = constraint.max_limit() else {
                    continue;
                };
                for (section, what) in [("limits", "limit"), ("requests", "request")] {
                    let value = read_quantity(object, &resource_pointer(&container, section, resource))?;
                    if let Some(value) = value.filter(|value| value > max) {
                        violations.push(format!(
                            "{} '{}': {resource} {what} '{value}' exceeds the maximum allowed '{max}'",
                            container.kind,
                            container.name()
                        ));
                    }
                }
            }
        }

        Ok(Decision::from_violations(violations))
    }

    fn build_patch(
        settings: &Settings,
        object: &CandidateObject<'_>,
    ) -> Result<Patch, StructuralError> {
        let mut builder = PatchBuilder::new(object);
        let Some(pod_spec) = PodSpec::locate(*object) else {
            return Ok(builder.build());
        };

        for container in constrained_containers(settings, &pod_spec)? {
            for (resource, constraint) in settings.constraints() {
                let limit_pointer = resource_pointer(&container, "limits", resource);
                let request_pointer = resource_pointer(&container, "requests", resource);

                let request = read_quantity(object, &request_pointer)?;
                let limit = match read_quantity(object, &limit_pointer)? {
                    Some(limit) => Some(limit),
                    None => match constraint.default_limit() {
                        Some(default_limit) => {
                            // the limit can never be below the request
                            let limit = match &request {
                                Some(request) if request > default_limit => request,
                                _ => default_limit,
                            };
                            builder.set(&limit_pointer, Value::String(limit.to_string()))?;
                            Some(limit.clone())
                        }
                        None => None,
                    },
                };

                if request.is_some() {
                    continue;
                }
                if let Some(default_request) = constraint.default_request() {
                    // the request can never be above the limit
                    let request = match &limit {
                        Some(limit) if default_request > limit => limit,
                        _ => default_request,
                    };
                    builder.set(&request_pointer, Value::String(request.to_string()))?;
                }
            }
        }

        Ok(builder.build())
    }
}
