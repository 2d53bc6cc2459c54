//! Webhook module for Pod admission requests.
//!
//! Request flow:
//! decoder -> policies (validate) or mutators + patch (mutate) -> response
//!
//! Everything between decoding and encoding is a pure function of the
//! decoded request and the policy config.

pub mod decoder;
pub mod error;
pub mod mutators;
pub mod patch;
pub mod policies;
pub mod response;
mod server;

pub use decoder::{DecodedRequest, Decoder};
pub use error::{DecodeError, DecodeStage, EncodeError, PatchError, WebhookError};
pub use policies::{Decision, ReasonCode, ValidationContext};
pub use server::{
    Endpoint, MAX_BODY_BYTES, Outcome, Reviewed, WebhookState, create_webhook_router,
    review_mutation, review_validation, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
