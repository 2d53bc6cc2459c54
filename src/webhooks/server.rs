//! Admission webhook server.
//!
//! Provides HTTPS endpoints for Kubernetes admission webhooks:
//! - `POST /validate/pod` - ValidatingAdmissionWebhook
//! - `POST /mutate/pod` - MutatingAdmissionWebhook
//!
//! To enable webhooks:
//! 1. Issue a serving certificate for the webhook Service
//! 2. Mount it into the pod at /etc/webhook/certs/
//! 3. Register the endpoints in Validating/MutatingWebhookConfigurations
//!
//! Each request is decoded, evaluated and encoded on its own. Policy denials
//! are 200 responses with `allowed: false`; only internal failures become 5xx.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use kube::core::admission::Operation;
use tracing::{debug, error, info, warn};

use crate::config::{PolicyConfig, WebhookConfig};
use crate::health::HealthState;
use crate::webhooks::decoder::{DecodedRequest, Decoder};
use crate::webhooks::error::WebhookError;
use crate::webhooks::mutators::mutate_all;
use crate::webhooks::patch::{diff_objects, touched_paths};
use crate::webhooks::policies::{Decision, ValidationContext, validate_all};
use crate::webhooks::response::{encode, error_body, to_body};

/// Largest request body accepted; object and oldObject together
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Shared state for webhook handlers. Immutable after construction.
pub struct WebhookState {
    pub decoder: Decoder,
    pub policy: PolicyConfig,
    /// Metrics sink; handlers work the same without it
    pub health: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(decoder: Decoder, policy: PolicyConfig) -> Self {
        Self {
            decoder,
            policy,
            health: None,
        }
    }

    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }
}

/// Which admission endpoint handled a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Validate,
    Mutate,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Validate => "validate",
            Endpoint::Mutate => "mutate",
        }
    }
}

/// Terminal outcome of a successfully handled request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Allowed,
    Denied,
    Mutated,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allowed => "allowed",
            Outcome::Denied => "denied",
            Outcome::Mutated => "mutated",
        }
    }
}

/// A handled request ready to send
#[derive(Debug)]
pub struct Reviewed {
    pub outcome: Outcome,
    pub body: Vec<u8>,
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/validate/pod", post(validate_pod))
        .route("/mutate/pod", post(mutate_pod))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn validate_pod(State(state): State<Arc<WebhookState>>, body: Bytes) -> Response {
    respond(&state, Endpoint::Validate, &body)
}

async fn mutate_pod(State(state): State<Arc<WebhookState>>, body: Bytes) -> Response {
    respond(&state, Endpoint::Mutate, &body)
}

fn respond(state: &WebhookState, endpoint: Endpoint, body: &[u8]) -> Response {
    let start = Instant::now();
    let result = match endpoint {
        Endpoint::Validate => review_validation(state, body),
        Endpoint::Mutate => review_mutation(state, body),
    };
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(reviewed) => {
            if let Some(health) = &state.health {
                health
                    .metrics
                    .record_outcome(endpoint.as_str(), reviewed.outcome.as_str(), elapsed);
            }
            json_response(StatusCode::OK, reviewed.body)
        }
        Err(e) => {
            error!(
                uid = e.uid().unwrap_or_default(),
                endpoint = endpoint.as_str(),
                stage = e.stage(),
                error = %e,
                "Failed to process admission request"
            );
            if let Some(health) = &state.health {
                health
                    .metrics
                    .record_error(endpoint.as_str(), e.stage(), elapsed);
            }
            error_response(&e)
        }
    }
}

/// Error envelope echoing whatever identity the failed request had
fn error_response(e: &WebhookError) -> Response {
    json_response(e.status_code(), error_body(e.uid(), e.api_version()))
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// Decode, validate and encode one request body
pub fn review_validation(state: &WebhookState, body: &[u8]) -> Result<Reviewed, WebhookError> {
    let decoded = state.decoder.decode(body)?;
    log_decoded(&decoded);

    let request = &decoded.request;
    let encode_failed = |e| WebhookError::encode(request, e);

    let Some(pod) = admissible_object(&decoded) else {
        let body = encode(request, &Decision::allowed(), None)
            .and_then(to_body)
            .map_err(encode_failed)?;
        info!(uid = %decoded.uid(), operation = ?decoded.request.operation, "Admission request allowed (nothing to validate)");
        return Ok(Reviewed {
            outcome: Outcome::Allowed,
            body,
        });
    };

    let decision = validate_all(&ValidationContext::new(pod, &state.policy));
    let body = encode(request, &decision, None)
        .and_then(to_body)
        .map_err(encode_failed)?;

    if decision.allowed {
        info!(uid = %decoded.uid(), "Admission request allowed");
        Ok(Reviewed {
            outcome: Outcome::Allowed,
            body,
        })
    } else {
        warn!(
            uid = %decoded.uid(),
            reason = %decision.reason.map(|r| r.as_str()).unwrap_or_default(),
            message = %decision.message.as_deref().unwrap_or_default(),
            "Admission request denied"
        );
        Ok(Reviewed {
            outcome: Outcome::Denied,
            body,
        })
    }
}

/// Decode, mutate, diff and encode one request body
pub fn review_mutation(state: &WebhookState, body: &[u8]) -> Result<Reviewed, WebhookError> {
    let decoded = state.decoder.decode(body)?;
    log_decoded(&decoded);

    let request = &decoded.request;
    let encode_failed = |e| WebhookError::encode(request, e);

    let Some(original) = admissible_object(&decoded) else {
        let body = encode(request, &Decision::allowed(), None)
            .and_then(to_body)
            .map_err(encode_failed)?;
        info!(uid = %decoded.uid(), operation = ?decoded.request.operation, "Admission request allowed unchanged (nothing to mutate)");
        return Ok(Reviewed {
            outcome: Outcome::Allowed,
            body,
        });
    };

    let decision = mutate_all(original, &state.policy);
    let patch = match &decision.proposed {
        Some(proposed) => {
            Some(diff_objects(original, proposed).map_err(|e| WebhookError::patch(request, e))?)
        }
        None => None,
    };
    let paths = patch.as_ref().map(touched_paths).unwrap_or_default();
    let body = encode(request, &decision, patch)
        .and_then(to_body)
        .map_err(encode_failed)?;

    if paths.is_empty() {
        info!(uid = %decoded.uid(), "Admission request allowed unchanged");
        Ok(Reviewed {
            outcome: Outcome::Allowed,
            body,
        })
    } else {
        info!(
            uid = %decoded.uid(),
            patch_ops = paths.len(),
            paths = ?paths,
            "Admission request mutated"
        );
        Ok(Reviewed {
            outcome: Outcome::Mutated,
            body,
        })
    }
}

fn log_decoded(decoded: &DecodedRequest) {
    let request = &decoded.request;
    debug!(
        uid = %request.uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        "Processing admission request"
    );
}

/// The object to evaluate; DELETE requests and requests without an object
/// are admitted as-is.
fn admissible_object(decoded: &DecodedRequest) -> Option<&k8s_openapi::api::core::v1::Pod> {
    if decoded.request.operation == Operation::Delete {
        return None;
    }
    decoded.pod.as_ref()
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on the configured port. TLS certificates are loaded
/// from the configured PEM files; readiness is set once they load.
pub async fn run_webhook_server(
    config: &WebhookConfig,
    state: Arc<WebhookState>,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::net::SocketAddr;

    let tls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    if let Some(health) = &state.health {
        health.set_ready(true).await;
    }

    let app = create_webhook_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(port = config.port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, tls)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
