use itertools::Itertools;
use k8s_openapi::api::core::v1::FlexVolumeSource;
use policy_core::{CandidateObject, Decision, Policy, StructuralError, pod_spec::PodSpec};

mod settings;
pub use settings::{AllowedFlexVolume, Settings};

/// Rejects pods using a flexVolume driver that is not allow-listed
pub struct FlexVolumeDriversPolicy;

impl Policy for FlexVolumeDriversPolicy {
    const NAME: &'static str = "flexvolume-drivers";
    type Settings = Settings;

    fn evaluate(
        settings: &Settings,
        object: &CandidateObject<'_>,
    ) -> Result<Decision, StructuralError> {
        let Some(pod_spec) = PodSpec::locate(*object) else {
            return Ok(Decision::Allowed);
        };

        let mut drivers = Vec::new();
        for volume in pod_spec.volumes()? {
            let flex_volume: Option<FlexVolumeSource> =
                object.get_as(&volume.pointer.join("flexVolume"))?;
            if let Some(flex_volume) = flex_volume {
                drivers.push(flex_volume.driver);
            }
        }

        Ok(Decision::from_violations(
            drivers
                .iter()
                .filter(|driver| !settings.is_allowed(driver))
                .unique()
                .map(|driver| format!("flexVolume driver '{driver}' is not in the allowed list")),
        ))
    }
}
