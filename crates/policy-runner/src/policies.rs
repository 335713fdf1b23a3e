use anyhow::{Result, anyhow};
use container_resources_policy::ContainerResourcesPolicy;
use flexvolume_drivers_policy::FlexVolumeDriversPolicy;
use metadata_keys_policy::{AnnotationsPolicy, LabelsPolicy};
use pod_ndots_policy::PodNdotsPolicy;
use policy_core::{Evaluator, Policy};
use selinux_policy::SELinuxPolicy;
use serde_json::Value;

type Respond = fn(Value, &[u8]) -> Vec<u8>;

const BUILTINS: [(&str, Respond); 6] = [
    (AnnotationsPolicy::NAME, respond::<AnnotationsPolicy>),
    (
        ContainerResourcesPolicy::NAME,
        respond::<ContainerResourcesPolicy>,
    ),
    (
        FlexVolumeDriversPolicy::NAME,
        respond::<FlexVolumeDriversPolicy>,
    ),
    (LabelsPolicy::NAME, respond::<LabelsPolicy>),
    (PodNdotsPolicy::NAME, respond::<PodNdotsPolicy>),
    (SELinuxPolicy::NAME, respond::<SELinuxPolicy>),
];

fn respond<P: Policy>(settings: Value, raw_request: &[u8]) -> Vec<u8> {
    Evaluator::<P>::from_value(settings).handle(raw_request)
}

/// Names of the built-in policies, sorted
pub(crate) fn list() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(name, _)| *name)
}

/// Evaluate the request with the policy called `name`, returning the
/// serialized admission response
pub(crate) fn evaluate(name: &str, settings: Value, raw_request: &[u8]) -> Result<Vec<u8>> {
    let (_, respond) = BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .ok_or_else(|| anyhow!("unknown policy: {}", name))?;

    Ok(respond(settings, raw_request))
}
