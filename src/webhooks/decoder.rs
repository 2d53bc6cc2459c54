//! Request decoding.
//!
//! Two stages, each checking kinds on its own:
//! 1. the AdmissionReview envelope, against the accepted envelope kinds;
//! 2. the embedded object, against the target kind (request `kind` and, when
//!    present, the object's own `apiVersion`/`kind`).
//!
//! A kind mismatch is a decode error, never a policy decision.

use k8s_openapi::api::core::v1::Pod;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionReview, ConvertAdmissionReviewError};
use serde_json::Value;

use crate::config::{DecoderConfig, Gvk};
use crate::webhooks::error::DecodeError;

/// A decoded admission request and its typed target.
#[derive(Debug)]
pub struct DecodedRequest {
    /// The request envelope; read-only for the rest of the request
    pub request: AdmissionRequest<DynamicObject>,
    /// The typed target, absent when the request carries no object (DELETE)
    pub pod: Option<Pod>,
}

impl DecodedRequest {
    pub fn uid(&self) -> &str {
        &self.request.uid
    }
}

/// Decodes request bodies against a fixed set of accepted kinds.
#[derive(Clone, Debug, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a raw request body.
    pub fn decode(&self, body: &[u8]) -> Result<DecodedRequest, DecodeError> {
        let request = self.decode_envelope(body)?;
        let pod = self.decode_object(&request)?;
        Ok(DecodedRequest { request, pod })
    }

    fn decode_envelope(&self, body: &[u8]) -> Result<AdmissionRequest<DynamicObject>, DecodeError> {
        let review: AdmissionReview<DynamicObject> =
            serde_json::from_slice(body).map_err(|e| self.unreadable(body, e.to_string()))?;

        let declared = format!("{}/{}", review.types.api_version, review.types.kind);
        let uid = review.request.as_ref().map(|r| r.uid.clone());
        if !self.accepts(&review.types.api_version, &review.types.kind) {
            return Err(DecodeError::envelope(
                uid,
                format!("unsupported envelope kind {declared}"),
            ));
        }

        let api_version = review.types.api_version.clone();
        review.try_into().map_err(|e: ConvertAdmissionReviewError| {
            DecodeError::envelope(uid, e.to_string()).with_api_version(api_version)
        })
    }

    fn accepts(&self, api_version: &str, kind: &str) -> bool {
        self.config
            .envelope_kinds
            .iter()
            .any(|gvk| gvk.api_version() == api_version && gvk.kind == kind)
    }

    /// Envelope error for a body that failed typed decoding, keeping whatever
    /// identity can still be read from it
    fn unreadable(&self, body: &[u8], cause: String) -> DecodeError {
        let Ok(value) = serde_json::from_slice::<Value>(body) else {
            return DecodeError::envelope(None, cause);
        };
        let uid = value
            .pointer("/request/uid")
            .and_then(Value::as_str)
            .map(str::to_string);
        let err = DecodeError::envelope(uid, cause);

        let api_version = value.get("apiVersion").and_then(Value::as_str);
        let kind = value.get("kind").and_then(Value::as_str);
        match (api_version, kind) {
            (Some(api_version), Some(kind)) if self.accepts(api_version, kind) => {
                err.with_api_version(api_version)
            }
            _ => err,
        }
    }

    fn decode_object(
        &self,
        request: &AdmissionRequest<DynamicObject>,
    ) -> Result<Option<Pod>, DecodeError> {
        let target = &self.config.target_kind;

        let requested = Gvk::new(&request.kind.group, &request.kind.version, &request.kind.kind);
        if &requested != target {
            return Err(object_error(
                request,
                format!("request kind {requested} does not match {target}"),
            ));
        }

        let Some(object) = request.object.as_ref() else {
            return Ok(None);
        };

        if let Some(types) = &object.types {
            if types.api_version != target.api_version() || types.kind != target.kind {
                return Err(object_error(
                    request,
                    format!(
                        "object kind {}/{} does not match {target}",
                        types.api_version, types.kind
                    ),
                ));
            }
        }

        let mut raw = serde_json::to_value(object)
            .map_err(|e| object_error(request, e.to_string()))?;
        if let Value::Object(map) = &mut raw {
            map.entry("apiVersion")
                .or_insert_with(|| Value::String(target.api_version()));
            map.entry("kind")
                .or_insert_with(|| Value::String(target.kind.clone()));
        }

        serde_json::from_value(raw)
            .map(Some)
            .map_err(|e| object_error(request, e.to_string()))
    }
}

fn object_error(request: &AdmissionRequest<DynamicObject>, cause: String) -> DecodeError {
    DecodeError::object(&request.uid, cause).with_api_version(&request.types.api_version)
}
