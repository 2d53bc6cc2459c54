//! Runtime configuration for the webhook.
//!
//! Everything here is built once at startup and handed to the components
//! that need it. Nothing is read lazily or from a global registry.

use std::path::PathBuf;

use thiserror::Error;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;
/// Default health/metrics server port
pub const HEALTH_PORT: u16 = 8080;

/// Annotation key marking a Pod as vetted
pub const VALIDATED_BY_ANNOTATION: &str = "validated-by";
/// Required value of [`VALIDATED_BY_ANNOTATION`]
pub const VALIDATED_BY_VALUE: &str = "custom webhook";
/// Pull policy applied to containers that leave it unset
pub const DEFAULT_PULL_POLICY: &str = "IfNotPresent";

/// Errors raised while reading configuration from the environment
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Transport settings for the webhook and health servers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Port the TLS admission endpoints listen on
    pub port: u16,
    /// PEM certificate chain
    pub cert_path: PathBuf,
    /// PEM private key
    pub key_path: PathBuf,
    /// Port for `/healthz`, `/readyz` and `/metrics`
    pub health_port: u16,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: WEBHOOK_PORT,
            cert_path: PathBuf::from(WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(WEBHOOK_KEY_PATH),
            health_port: HEALTH_PORT,
        }
    }
}

impl WebhookConfig {
    /// Build the config from `WEBHOOK_PORT`, `WEBHOOK_CERT_PATH`,
    /// `WEBHOOK_KEY_PATH` and `HEALTH_PORT`, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            port: parse_port(&lookup, "WEBHOOK_PORT", defaults.port)?,
            cert_path: lookup("WEBHOOK_CERT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cert_path),
            key_path: lookup("WEBHOOK_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.key_path),
            health_port: parse_port(&lookup, "HEALTH_PORT", defaults.health_port)?,
        })
    }

    /// Whether both TLS files are present on disk
    pub fn tls_files_present(&self) -> bool {
        self.cert_path.exists() && self.key_path.exists()
    }
}

fn parse_port<F>(lookup: &F, var: &'static str, default: u16) -> Result<u16, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidValue {
                var,
                value: value.clone(),
                reason: e.to_string(),
            }),
    }
}

/// Constants the admission rules check against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Annotation key that must be present on admitted Pods
    pub required_annotation_key: String,
    /// Value the annotation must hold
    pub required_annotation_value: String,
    /// Pull policy written into containers that leave it empty
    pub default_pull_policy: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            required_annotation_key: VALIDATED_BY_ANNOTATION.to_string(),
            required_annotation_value: VALIDATED_BY_VALUE.to_string(),
            default_pull_policy: DEFAULT_PULL_POLICY.to_string(),
        }
    }
}

impl PolicyConfig {
    /// Override the required annotation from `REQUIRED_ANNOTATION_KEY` and
    /// `REQUIRED_ANNOTATION_VALUE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the policy config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let key = match lookup("REQUIRED_ANNOTATION_KEY") {
            Some(key) if key.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    var: "REQUIRED_ANNOTATION_KEY",
                    value: key,
                    reason: "annotation key cannot be empty".to_string(),
                });
            }
            Some(key) => key,
            None => defaults.required_annotation_key,
        };

        Ok(Self {
            required_annotation_key: key,
            required_annotation_value: lookup("REQUIRED_ANNOTATION_VALUE")
                .unwrap_or(defaults.required_annotation_value),
            default_pull_policy: defaults.default_pull_policy,
        })
    }
}

/// A group/version/kind triple as it appears in admission requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl Gvk {
    pub fn new(group: &str, version: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }

    /// The `apiVersion` string for this kind (`v1` for the core group)
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl std::fmt::Display for Gvk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

/// Kinds the decoder accepts, fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Envelope kinds accepted in the review's `apiVersion`/`kind`
    pub envelope_kinds: Vec<Gvk>,
    /// Kind the embedded object must be
    pub target_kind: Gvk,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            envelope_kinds: vec![
                Gvk::new("admission.k8s.io", "v1", "AdmissionReview"),
                Gvk::new("admission.k8s.io", "v1beta1", "AdmissionReview"),
            ],
            target_kind: Gvk::new("", "v1", "Pod"),
        }
    }
}
