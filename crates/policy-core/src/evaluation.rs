//! Entry point of every policy: raw request and settings in, raw
//! response out.

use std::marker::PhantomData;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    admission_request::AdmissionRequest,
    admission_response::AdmissionResponse,
    decision::{Decision, Evaluation},
    errors::{PolicyError, StructuralError},
    object::CandidateObject,
    patch::Patch,
    settings::{self, PolicySettings},
};

/// An admission policy.
///
/// `evaluate` decides, `build_patch` computes the mutation and is invoked
/// only when the object has been allowed. Non-mutating policies keep the
/// default `build_patch`.
pub trait Policy {
    /// Name used inside of logs and by the CLI
    const NAME: &'static str;

    type Settings: PolicySettings + Send + Sync;

    fn evaluate(
        settings: &Self::Settings,
        object: &CandidateObject<'_>,
    ) -> Result<Decision, StructuralError>;

    fn build_patch(
        _settings: &Self::Settings,
        _object: &CandidateObject<'_>,
    ) -> Result<Patch, StructuralError> {
        Ok(Patch::default())
    }
}

/// Run the policy against a decoded request
pub fn evaluate<P: Policy>(
    settings: &P::Settings,
    request: &AdmissionRequest,
) -> Result<Evaluation, PolicyError> {
    let object = CandidateObject::from_request(request);
    if object.root().is_null() {
        debug!(policy = P::NAME, uid = %request.uid, operation = %request.operation, "no object to evaluate");
        return Ok(Evaluation::allowed());
    }

    match P::evaluate(settings, &object)? {
        Decision::Rejected { reason } => {
            info!(policy = P::NAME, uid = %request.uid, kind = object.kind(), %reason, "request rejected");
            Ok(Evaluation::rejected(reason))
        }
        Decision::Allowed => {
            let patch = P::build_patch(settings, &object)?;
            if patch.is_empty() {
                debug!(policy = P::NAME, uid = %request.uid, kind = object.kind(), "request accepted");
            } else {
                info!(
                    policy = P::NAME,
                    uid = %request.uid,
                    kind = object.kind(),
                    operations = patch.len(),
                    "request accepted with mutation"
                );
            }
            Ok(Evaluation::mutated(patch))
        }
    }
}

/// A policy together with its settings, parsed and validated once.
///
/// When the settings are invalid every request is rejected with the
/// validation error.
#[derive(Debug)]
pub struct Evaluator<P: Policy> {
    settings: Result<P::Settings, PolicyError>,
    policy: PhantomData<fn() -> P>,
}

impl<P: Policy> Evaluator<P> {
    pub fn new(raw_settings: &[u8]) -> Self {
        Evaluator::with_settings(settings::load(raw_settings))
    }

    pub fn from_value(settings: Value) -> Self {
        Evaluator::with_settings(settings::load_value(settings))
    }

    pub fn from_settings(settings: P::Settings) -> Self {
        let settings = settings::validate(&settings)
            .map(|_| settings)
            .map_err(PolicyError::from);
        Evaluator::with_settings(settings)
    }

    fn with_settings(settings: Result<P::Settings, PolicyError>) -> Self {
        if let Err(e) = &settings {
            warn!(policy = P::NAME, error = %e, "invalid settings, every request will be rejected");
        }
        Evaluator {
            settings,
            policy: PhantomData,
        }
    }

    pub fn settings(&self) -> Result<&P::Settings, &PolicyError> {
        self.settings.as_ref()
    }

    pub fn respond(&self, request: &AdmissionRequest) -> AdmissionResponse {
        let result = self
            .settings
            .as_ref()
            .map_err(|e| AdmissionResponse::from_error(request.uid.as_str(), e))
            .and_then(|settings| {
                evaluate::<P>(settings, request).map_err(|e| {
                    warn!(policy = P::NAME, uid = %request.uid, error = %e, "evaluation failed");
                    AdmissionResponse::from_error(request.uid.as_str(), &e)
                })
            });

        match result {
            Ok(evaluation) => AdmissionResponse::from_evaluation(request.uid.as_str(), evaluation),
            Err(response) => response,
        }
    }

    pub fn handle(&self, raw_request: &[u8]) -> Vec<u8> {
        match AdmissionRequest::from_slice(raw_request) {
            Ok(request) => self.respond(&request).to_vec(),
            Err(e) => request_error::<P>(&e),
        }
    }
}

fn request_error<P: Policy>(err: &PolicyError) -> Vec<u8> {
    warn!(policy = P::NAME, error = %err, "cannot decode admission request");
    AdmissionResponse::from_error("", err).to_vec()
}

/// Evaluate a single request. The request is decoded before the
/// settings.
pub fn handle<P: Policy>(raw_request: &[u8], raw_settings: &[u8]) -> Vec<u8> {
    match AdmissionRequest::from_slice(raw_request) {
        Ok(request) => Evaluator::<P>::new(raw_settings).respond(&request).to_vec(),
        Err(e) => request_error::<P>(&e),
    }
}

/// Request and settings shipped together inside of one document
#[derive(Deserialize, Debug, Clone)]
pub struct ValidationRequest {
    pub request: Value,
    #[serde(default)]
    pub settings: Value,
}

/// Evaluate a `{"request": ..., "settings": ...}` payload
pub fn handle_validation_request<P: Policy>(payload: &[u8]) -> Vec<u8> {
    let decoded = serde_json::from_slice::<ValidationRequest>(payload)
        .map_err(PolicyError::RequestParse)
        .and_then(|payload| {
            AdmissionRequest::from_value(payload.request).map(|request| (request, payload.settings))
        });

    match decoded {
        Ok((request, settings)) => Evaluator::<P>::from_value(settings).respond(&request).to_vec(),
        Err(e) => request_error::<P>(&e),
    }
}
