//! Error types for admission request handling.
//!
//! Policy denials are not errors; they are successful decisions and live in
//! [`crate::webhooks::policies::Decision`]. Everything here ends in a 5xx.

use axum::http::StatusCode;
use kube::core::DynamicObject;
use kube::core::admission::AdmissionRequest;
use thiserror::Error;

/// Which half of the two-stage decode failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeStage {
    /// The outer AdmissionReview envelope
    Envelope,
    /// The embedded target object
    Object,
}

impl DecodeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeStage::Envelope => "envelope",
            DecodeStage::Object => "object",
        }
    }
}

impl std::fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to turn a request body into a typed request and target object
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to decode {stage}: {cause}")]
pub struct DecodeError {
    pub stage: DecodeStage,
    /// Request uid, when the envelope was readable far enough to find it
    pub uid: Option<String>,
    /// Accepted envelope apiVersion, when known; error envelopes echo it
    pub api_version: Option<String>,
    pub cause: String,
}

impl DecodeError {
    pub fn envelope(uid: Option<String>, cause: impl Into<String>) -> Self {
        Self {
            stage: DecodeStage::Envelope,
            uid,
            api_version: None,
            cause: cause.into(),
        }
    }

    pub fn object(uid: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            stage: DecodeStage::Object,
            uid: Some(uid.into()),
            api_version: None,
            cause: cause.into(),
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }
}

/// Diff input was not well-formed JSON
#[derive(Error, Debug)]
#[error("failed to compute patch: {0}")]
pub struct PatchError(#[from] pub serde_json::Error);

/// Failure serializing the outgoing response
#[derive(Error, Debug)]
pub enum EncodeError {
    /// The JSON Patch could not be attached to the response
    #[error("failed to serialize patch: {0}")]
    Patch(String),

    /// An object could not be converted to JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that can occur while serving admission requests
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Diff failed after a successful decode
    #[error("{source}")]
    Patch {
        uid: String,
        api_version: String,
        source: PatchError,
    },

    /// Response encoding failed after a successful decode
    #[error("{source}")]
    Encode {
        uid: String,
        api_version: String,
        source: EncodeError,
    },

    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

impl WebhookError {
    /// Patch failure for a decoded `request`
    pub fn patch(request: &AdmissionRequest<DynamicObject>, source: PatchError) -> Self {
        WebhookError::Patch {
            uid: request.uid.clone(),
            api_version: request.types.api_version.clone(),
            source,
        }
    }

    /// Encode failure for a decoded `request`
    pub fn encode(request: &AdmissionRequest<DynamicObject>, source: EncodeError) -> Self {
        WebhookError::Encode {
            uid: request.uid.clone(),
            api_version: request.types.api_version.clone(),
            source,
        }
    }

    /// Label used for the `stage` metric dimension
    pub fn stage(&self) -> &'static str {
        match self {
            WebhookError::Decode(_) => "decode",
            WebhookError::Patch { .. } => "patch",
            WebhookError::Encode { .. } => "encode",
            WebhookError::TlsConfig(_) | WebhookError::Server(_) => "server",
        }
    }

    /// Request uid carried by the error, if any
    pub fn uid(&self) -> Option<&str> {
        match self {
            WebhookError::Decode(e) => e.uid.as_deref(),
            WebhookError::Patch { uid, .. } | WebhookError::Encode { uid, .. } => Some(uid),
            WebhookError::TlsConfig(_) | WebhookError::Server(_) => None,
        }
    }

    /// Envelope apiVersion of the failed request, if known
    pub fn api_version(&self) -> Option<&str> {
        match self {
            WebhookError::Decode(e) => e.api_version.as_deref(),
            WebhookError::Patch { api_version, .. } | WebhookError::Encode { api_version, .. } => {
                Some(api_version)
            }
            WebhookError::TlsConfig(_) | WebhookError::Server(_) => None,
        }
    }

    /// HTTP status the transport should answer with
    pub fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
