//! Provenance annotation stamping.
//!
//! Sets the required annotation on Pods that lack it, creating the
//! annotation mapping if needed.

use k8s_openapi::api::core::v1::Pod;

use crate::config::PolicyConfig;
use crate::webhooks::policies::provenance::AnnotationState;

/// Stamp the required annotation unless it is already correct
pub fn mutate(pod: &mut Pod, policy: &PolicyConfig) {
    let key = &policy.required_annotation_key;
    let value = &policy.required_annotation_value;

    let state = AnnotationState::inspect(pod.metadata.annotations.as_ref(), key, value);
    if state == AnnotationState::Present {
        return;
    }

    pod.metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(key.clone(), value.clone());
}
