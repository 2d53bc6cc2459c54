//! Image pull policy defaulting.
//!
//! Containers (regular and init) that leave `imagePullPolicy` unset or empty
//! get the configured default. Explicit policies are kept as-is.

use k8s_openapi::api::core::v1::{Container, Pod};

use crate::config::PolicyConfig;

/// Typed view of a container's `imagePullPolicy`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PullPolicy {
    Always,
    IfNotPresent,
    Never,
    /// Absent or empty string
    Unset,
    /// Any value the API server would reject; left for it to report
    Other(String),
}

impl PullPolicy {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("") => PullPolicy::Unset,
            Some("Always") => PullPolicy::Always,
            Some("IfNotPresent") => PullPolicy::IfNotPresent,
            Some("Never") => PullPolicy::Never,
            Some(other) => PullPolicy::Other(other.to_string()),
        }
    }

    pub fn of(container: &Container) -> Self {
        Self::parse(container.image_pull_policy.as_deref())
    }
}

/// Default empty pull policies on every container
pub fn mutate(pod: &mut Pod, policy: &PolicyConfig) {
    let Some(spec) = pod.spec.as_mut() else {
        return;
    };

    let containers = spec
        .containers
        .iter_mut()
        .chain(spec.init_containers.iter_mut().flatten());
    for container in containers {
        if PullPolicy::of(container) == PullPolicy::Unset {
            container.image_pull_policy = Some(policy.default_pull_policy.clone());
        }
    }
}
