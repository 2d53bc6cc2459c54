//! Mutation policies for Pod admission.
//!
//! Mutators always admit. They work on an owned copy of the incoming Pod and
//! the decoded original is never touched, so it can be diffed afterwards.
//! Every mutator is idempotent: running it on its own output changes nothing.

pub mod provenance;
pub mod pull_policy;

use k8s_openapi::api::core::v1::Pod;

use crate::config::PolicyConfig;
use crate::webhooks::policies::Decision;

/// A single in-place mutation of the proposed Pod
pub type Mutator = fn(&mut Pod, &PolicyConfig);

/// Mutators in application order
pub const MUTATORS: &[Mutator] = &[pull_policy::mutate, provenance::mutate];

/// Produce the proposed object for `original`
pub fn propose(original: &Pod, policy: &PolicyConfig) -> Pod {
    propose_with(MUTATORS, original, policy)
}

/// Apply the given mutators, in order, to a copy of `original`
pub fn propose_with(mutators: &[Mutator], original: &Pod, policy: &PolicyConfig) -> Pod {
    let mut proposed = original.clone();
    for mutate in mutators {
        mutate(&mut proposed, policy);
    }
    proposed
}

/// Evaluate the mutating path; the decision always admits
pub fn mutate_all(original: &Pod, policy: &PolicyConfig) -> Decision {
    Decision::mutated(propose(original, policy))
}
