//! Validation policies for Pod admission.
//!
//! Rules run in a fixed order and stop at the first denial:
//! 1. Image tags: no container may run a `latest` or unpinned image
//! 2. Provenance: the Pod must carry the required annotation

pub mod image_tag;
pub mod provenance;

use k8s_openapi::api::core::v1::Pod;

use crate::config::PolicyConfig;

/// Machine-readable reason attached to a denial.
///
/// Values follow the apimachinery `StatusReason` strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReasonCode {
    /// The object violates admission policy
    Invalid,
    /// The request itself could not be processed
    InternalError,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Invalid => "Invalid",
            ReasonCode::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one request
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    /// Whether the object may be persisted
    pub allowed: bool,
    /// Reason for denial (if not allowed)
    pub reason: Option<ReasonCode>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
    /// Rewritten object proposed by the mutating path
    pub proposed: Option<Pod>,
}

impl Decision {
    /// Create an allowed decision
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
            proposed: None,
        }
    }

    /// Create a denied decision
    pub fn denied(reason: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            message: Some(message.into()),
            proposed: None,
        }
    }

    /// Create an allowed decision carrying a proposed object
    pub fn mutated(proposed: Pod) -> Self {
        Self {
            proposed: Some(proposed),
            ..Self::allowed()
        }
    }
}

/// Context for validation
pub struct ValidationContext<'a> {
    /// The Pod being admitted
    pub pod: &'a Pod,
    /// Rule constants
    pub policy: &'a PolicyConfig,
}

impl<'a> ValidationContext<'a> {
    pub fn new(pod: &'a Pod, policy: &'a PolicyConfig) -> Self {
        Self { pod, policy }
    }
}

/// A single validation rule
pub type Rule = fn(&ValidationContext<'_>) -> Decision;

/// Rules in evaluation order
pub const RULES: &[Rule] = &[image_tag::validate, provenance::validate];

/// Run all validation policies, stopping at the first denial
pub fn validate_all(ctx: &ValidationContext<'_>) -> Decision {
    validate_with(RULES, ctx)
}

/// Run the given rules in order, stopping at the first denial
pub fn validate_with(rules: &[Rule], ctx: &ValidationContext<'_>) -> Decision {
    for rule in rules {
        let decision = rule(ctx);
        if !decision.allowed {
            return decision;
        }
    }

    Decision::allowed()
}
