//! Provenance annotation policy.
//!
//! Denies Pods that do not carry the required annotation with the required
//! value. A Pod with no annotations at all is denied, not an error.

use std::collections::BTreeMap;

use super::{Decision, ReasonCode, ValidationContext};

/// Presence of the required annotation on an object
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnnotationState<'a> {
    /// `metadata.annotations` is absent
    MappingAbsent,
    /// The mapping exists (possibly empty) but lacks the key
    KeyMissing,
    /// The key is present with a different value
    ValueMismatch(&'a str),
    /// The key is present with the required value
    Present,
}

impl<'a> AnnotationState<'a> {
    pub fn inspect(
        annotations: Option<&'a BTreeMap<String, String>>,
        key: &str,
        expected: &str,
    ) -> Self {
        let Some(annotations) = annotations else {
            return AnnotationState::MappingAbsent;
        };
        match annotations.get(key) {
            None => AnnotationState::KeyMissing,
            Some(value) if value == expected => AnnotationState::Present,
            Some(value) => AnnotationState::ValueMismatch(value),
        }
    }
}

/// Validate that the provenance annotation is present
pub fn validate(ctx: &ValidationContext<'_>) -> Decision {
    let key = &ctx.policy.required_annotation_key;
    let value = &ctx.policy.required_annotation_value;

    match AnnotationState::inspect(ctx.pod.metadata.annotations.as_ref(), key, value) {
        AnnotationState::Present => Decision::allowed(),
        _ => Decision::denied(
            ReasonCode::Invalid,
            format!(
                "Pod metadata: has no desired annotation in it {}:{}",
                key, value
            ),
        ),
    }
}
