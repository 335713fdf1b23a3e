use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{decision::Decision, decision::Evaluation, errors::PolicyError};

/// Returned when the response itself cannot be serialized
pub const FAIL_CLOSED_RESPONSE: &[u8] =
    br#"{"allowed":false,"message":"internal error: cannot serialize admission response","code":500}"#;

/// The verdict sent back to the runtime.
///
/// A reduced version of the admission/v1/AdmissionResponse object of
/// Kubernetes: the rejection message and code are flattened instead of
/// being nested inside of a `status` object.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    /// Copied over from the corresponding AdmissionRequest
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,

    pub allowed: bool,

    /// Why the request has been rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Suggested HTTP return code, set only when the evaluation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,

    /// Base64 encoded JSON Patch (RFC 6902)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
}

/// PatchType is the type of patch being used to represent the mutated object
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub enum PatchType {
    #[serde(rename = "JSONPatch")]
    #[default]
    JSONPatch,
}

impl AdmissionResponse {
    pub fn accept(uid: impl Into<String>) -> AdmissionResponse {
        AdmissionResponse {
            uid: uid.into(),
            allowed: true,
            ..Default::default()
        }
    }

    pub fn reject(
        uid: impl Into<String>,
        message: impl Into<String>,
        code: Option<u16>,
    ) -> AdmissionResponse {
        AdmissionResponse {
            uid: uid.into(),
            allowed: false,
            message: Some(message.into()),
            code,
            ..Default::default()
        }
    }

    /// Fail closed: the request is denied with the error as message
    pub fn from_error(uid: impl Into<String>, err: &PolicyError) -> AdmissionResponse {
        AdmissionResponse::reject(uid, err.to_string(), Some(err.code()))
    }

    /// The patch is attached only when the object is allowed and there is
    /// something to change.
    pub fn from_evaluation(uid: impl Into<String>, evaluation: Evaluation) -> AdmissionResponse {
        let uid = uid.into();
        let (decision, patch) = evaluation.into_parts();

        match decision {
            Decision::Rejected { reason } => AdmissionResponse::reject(uid, reason, None),
            Decision::Allowed if patch.is_empty() => AdmissionResponse::accept(uid),
            Decision::Allowed => match patch.to_base64() {
                Ok(encoded) => AdmissionResponse {
                    uid,
                    allowed: true,
                    patch_type: Some(PatchType::JSONPatch),
                    patch: Some(encoded),
                    ..Default::default()
                },
                Err(e) => {
                    error!(error = %e, "cannot serialize patch");
                    AdmissionResponse::reject(
                        uid,
                        format!("internal error: cannot serialize patch: {e}"),
                        Some(500),
                    )
                }
            },
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|e| {
            error!(error = %e, "cannot serialize admission response");
            FAIL_CLOSED_RESPONSE.to_vec()
        })
    }
}
