//! Response encoding.
//!
//! Turns a [`Decision`] and optional patch into the outgoing AdmissionReview.
//! The response uid always comes from the request. A denial never carries a
//! patch, and an empty patch is left off the response entirely. A patch goes
//! out as a base64 string, the wire form of the API server's `[]byte`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use json_patch::Patch;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::{DynamicObject, TypeMeta};
use serde_json::{Value, json};

use crate::webhooks::error::EncodeError;
use crate::webhooks::policies::{Decision, ReasonCode};

/// Message returned for any internal failure; details stay in the logs
pub const INTERNAL_ERROR_MESSAGE: &str = "internal error processing admission request";

/// Envelope version for error replies when the request's own is unknown
pub const DEFAULT_ENVELOPE_API_VERSION: &str = "admission.k8s.io/v1";

/// Build the response for `request` from a decision and optional patch.
pub fn encode(
    request: &AdmissionRequest<DynamicObject>,
    decision: &Decision,
    patch: Option<Patch>,
) -> Result<AdmissionResponse, EncodeError> {
    let response = AdmissionResponse::from(request);

    if !decision.allowed {
        let reason = decision.reason.unwrap_or(ReasonCode::Invalid);
        let message = decision
            .message
            .clone()
            .unwrap_or_else(|| "Validation failed".to_string());
        return Ok(with_reason(response.deny(message), reason));
    }

    match patch {
        Some(patch) if !patch.0.is_empty() => response
            .with_patch(patch)
            .map_err(|e| EncodeError::Patch(e.to_string())),
        _ => Ok(response),
    }
}

/// Serialize a response as a full AdmissionReview body
pub fn to_body(mut response: AdmissionResponse) -> Result<Vec<u8>, EncodeError> {
    let patch = response.patch.take();
    let review: AdmissionReview<DynamicObject> = response.into_review();
    let mut review = serde_json::to_value(&review)?;

    if let (Some(patch), Some(Value::Object(reply))) = (patch, review.get_mut("response")) {
        reply.insert("patch".to_string(), Value::String(STANDARD.encode(patch)));
    }
    Ok(serde_json::to_vec(&review)?)
}

/// Minimal error envelope for requests that could not be processed.
///
/// Echoes `uid` and the envelope `api_version` when they are known. Falls
/// back to a hand-built document if the typed envelope cannot be serialized.
pub fn error_body(uid: Option<&str>, api_version: Option<&str>) -> Vec<u8> {
    let api_version = api_version.unwrap_or(DEFAULT_ENVELOPE_API_VERSION);

    let mut response = AdmissionResponse::invalid(INTERNAL_ERROR_MESSAGE);
    response.types = TypeMeta {
        api_version: api_version.to_string(),
        kind: "AdmissionReview".to_string(),
    };
    response.uid = uid.unwrap_or_default().to_string();
    let response = with_reason(response, ReasonCode::InternalError);

    to_body(response).unwrap_or_else(|_| {
        json!({
            "apiVersion": api_version,
            "kind": "AdmissionReview",
            "response": {
                "uid": uid.unwrap_or_default(),
                "allowed": false,
                "status": {
                    "message": INTERNAL_ERROR_MESSAGE,
                    "reason": ReasonCode::InternalError.as_str(),
                },
            },
        })
        .to_string()
        .into_bytes()
    })
}

fn with_reason(mut response: AdmissionResponse, reason: ReasonCode) -> AdmissionResponse {
    response.result.reason = reason.as_str().to_string();
    response
}
