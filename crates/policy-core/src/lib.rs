pub mod admission_request;
pub mod admission_response;
pub mod constraint;
pub mod decision;
pub mod errors;
pub mod evaluation;
pub mod object;
pub mod patch;
pub mod pod_spec;
pub mod pointer;
pub mod settings;

pub use admission_request::AdmissionRequest;
pub use admission_response::AdmissionResponse;
pub use decision::{Decision, Evaluation};
pub use errors::{PolicyError, StructuralError};
pub use evaluation::{Evaluator, Policy, handle, handle_validation_request};
pub use object::CandidateObject;
pub use patch::{Patch, PatchBuilder, PatchOperation};
pub use pointer::JsonPointer;
pub use settings::PolicySettings;
