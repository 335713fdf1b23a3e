use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_NDOTS: u32 = 5;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct Settings {
    #[validate(range(max = 15, message = "ndots must be between 0 and 15"))]
    pub ndots: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            ndots: DEFAULT_NDOTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_core::settings;
    use rstest::rstest;

    #[rstest]
    #[case(b"".as_slice(), 5)]
    #[case(b"{}".as_slice(), 5)]
    #[case(br#"{"ndots": 0}"#.as_slice(), 0)]
    #[case(br#"{"ndots": 15}"#.as_slice(), 15)]
    fn valid_settings(#[case] raw: &[u8], #[case] ndots: u32) {
        let settings: Settings = settings::load(raw).unwrap();
        assert_eq!(settings.ndots, ndots);
    }

    #[test]
    fn too_many_dots() {
        let err = settings::load::<Settings>(br#"{"ndots": 16}"#).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid settings: ndots: ndots must be between 0 and 15"
        );
    }

    #[rstest]
    #[case(br#"{"ndots": -1}"#.as_slice())]
    #[case(br#"{"ndots": "5"}"#.as_slice())]
    fn not_a_count(#[case] raw: &[u8]) {
        assert!(settings::load::<Settings>(raw).is_err());
    }
}
