//! Image tag validation policy.
//!
//! Denies Pods whose containers (regular or init) run an image tagged
//! `latest`, or an image with neither a tag nor a digest.

use k8s_openapi::api::core::v1::{Container, Pod};
use tracing::debug;

use super::{Decision, ReasonCode, ValidationContext};

/// The floating tag that is never admitted
pub const LATEST_TAG: &str = "latest";

/// How an image reference is pinned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImagePin<'a> {
    /// Pinned to an explicit tag
    Tag(&'a str),
    /// Pinned to a content digest (`@sha256:...`), with or without a tag
    Digest(&'a str),
    /// Tagged `latest`
    Latest,
    /// No tag and no digest
    Unpinned,
}

impl<'a> ImagePin<'a> {
    /// Classify an image reference such as `registry:5000/team/app:1.2`.
    ///
    /// The tag delimiter is the last `:` after the last `/`, so a registry
    /// port is never mistaken for a tag.
    pub fn parse(image: &'a str) -> Self {
        let (name, digest) = match image.split_once('@') {
            Some((name, digest)) => (name, Some(digest)),
            None => (image, None),
        };
        if let Some(digest) = digest.filter(|d| !d.is_empty()) {
            return ImagePin::Digest(digest);
        }

        let last_segment_start = name.rfind('/').map_or(0, |i| i + 1);
        let last_segment = name.get(last_segment_start..).unwrap_or(name);
        match last_segment.rsplit_once(':') {
            Some((_, LATEST_TAG)) => ImagePin::Latest,
            Some((_, "")) | None => ImagePin::Unpinned,
            Some((_, tag)) => ImagePin::Tag(tag),
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self, ImagePin::Tag(_) | ImagePin::Digest(_))
    }
}

/// Containers then init containers, in declaration order
pub fn pod_containers(pod: &Pod) -> impl Iterator<Item = &Container> {
    pod.spec.iter().flat_map(|spec| {
        spec.containers
            .iter()
            .chain(spec.init_containers.iter().flatten())
    })
}

/// Validate that every container image is pinned
pub fn validate(ctx: &ValidationContext<'_>) -> Decision {
    for container in pod_containers(ctx.pod) {
        // A missing image is rejected by API server validation
        let Some(image) = container.image.as_deref() else {
            continue;
        };

        match ImagePin::parse(image) {
            ImagePin::Latest => {
                debug!(container = %container.name, image = %image, "Image uses latest tag");
                return Decision::denied(
                    ReasonCode::Invalid,
                    format!("Pod image name: {} has latest in it", image),
                );
            }
            ImagePin::Unpinned => {
                debug!(container = %container.name, image = %image, "Image is unpinned");
                return Decision::denied(
                    ReasonCode::Invalid,
                    format!("Pod image name: {} has no tag or digest", image),
                );
            }
            ImagePin::Tag(_) | ImagePin::Digest(_) => {}
        }
    }

    Decision::allowed()
}
