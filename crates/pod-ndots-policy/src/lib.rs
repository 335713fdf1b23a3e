use k8s_openapi::api::core::v1::PodDNSConfigOption;
use policy_core::{
    CandidateObject, Decision, JsonPointer, Patch, PatchBuilder, Policy, StructuralError,
};
use serde_json::json;

mod settings;
pub use settings::{DEFAULT_NDOTS, Settings};

const NDOTS: &str = "ndots";

/// Makes sure every Pod resolves names with the configured `ndots` value.
///
/// Never rejects: existing `ndots` options are rewritten, otherwise one
/// is appended. The other DNS options keep their order.
pub struct PodNdotsPolicy;

impl Policy for PodNdotsPolicy {
    const NAME: &'static str = "pod-ndots";
    type Settings = Settings;

    fn evaluate(
        _settings: &Settings,
        _object: &CandidateObject<'_>,
    ) -> Result<Decision, StructuralError> {
        Ok(Decision::Allowed)
    }

    fn build_patch(
        settings: &Settings,
        object: &CandidateObject<'_>,
    ) -> Result<Patch, StructuralError> {
        let mut builder = PatchBuilder::new(object);
        if object.kind() != "Pod" {
            return Ok(builder.build());
        }

        let options = JsonPointer::from_tokens(["spec", "dnsConfig", "options"]);
        let ndots = settings.ndots.to_string();
        let mut found = false;

        for element in object.items(&options)? {
            let option: PodDNSConfigOption = object.get_as(&element.pointer)?.unwrap_or_default();
            if option.name.as_deref() != Some(NDOTS) {
                continue;
            }
            found = true;
            if option.value.as_deref() != Some(ndots.as_str()) {
                builder.set(&element.pointer.join("value"), json!(ndots))?;
            }
        }

        if !found {
            builder.append(&options, json!({"name": NDOTS, "value": ndots}))?;
        }

        Ok(builder.build())
    }
}
