use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{PolicyError, json_type_name};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub resource: String,
}

/// This models the admission/v1/AdmissionRequest object of Kubernetes.
///
/// `object` and `oldObject` are kept as raw JSON documents: policies read
/// them through [`crate::CandidateObject`]. They are `null` when the
/// operation does not carry them (e.g. `object` on DELETE).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    pub resource: GroupVersionResource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<k8s_openapi::api::authentication::v1::UserInfo>,
    pub object: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub old_object: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl AdmissionRequest {
    /// Decode either an `AdmissionReview` wrapping a request, or a bare
    /// `AdmissionRequest`
    pub fn from_slice(raw: &[u8]) -> Result<AdmissionRequest, PolicyError> {
        let value: Value = serde_json::from_slice(raw).map_err(PolicyError::RequestParse)?;
        AdmissionRequest::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<AdmissionRequest, PolicyError> {
        if !value.is_object() {
            return Err(PolicyError::InvalidRequest(format!(
                "expected an object, found {}",
                json_type_name(&value)
            )));
        }

        let is_review = value.get("kind").and_then(Value::as_str) == Some("AdmissionReview")
            || value.get("request").is_some();
        if !is_review {
            return serde_json::from_value(value).map_err(PolicyError::RequestParse);
        }

        let review: AdmissionReview =
            serde_json::from_value(value).map_err(PolicyError::RequestParse)?;
        review.request.ok_or_else(|| {
            PolicyError::InvalidRequest("AdmissionReview does not contain a request".to_string())
        })
    }
}

/// The envelope the API server wraps the request into
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
}

impl Default for AdmissionReview {
    fn default() -> Self {
        AdmissionReview {
            api_version: Some(String::from("admission.k8s.io/v1")),
            kind: Some(String::from("AdmissionReview")),
            request: None,
        }
    }
}
