//! pod-admission-webhook library crate
//!
//! Validating and mutating admission webhook for Pods. The admission core
//! (decoding, policy evaluation, patch construction, response encoding) lives
//! in [`webhooks`]; [`health`] and [`config`] carry the serving concerns.

pub mod config;
pub mod health;
pub mod webhooks;

pub use config::{DecoderConfig, PolicyConfig, WebhookConfig};
pub use health::HealthState;
pub use webhooks::{WebhookError, WebhookState, create_webhook_router, run_webhook_server};
