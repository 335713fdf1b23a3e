use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct AllowedFlexVolume {
    #[validate(length(min = 1, message = "driver must not be empty"))]
    pub driver: String,
}

/// An empty allow-list rejects every flexVolume.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[validate(nested)]
    pub allowed_flex_volumes: Vec<AllowedFlexVolume>,
}

impl Settings {
    pub fn is_allowed(&self, driver: &str) -> bool {
        self.allowed_flex_volumes
            .iter()
            .any(|allowed| allowed.driver == driver)
    }
}
