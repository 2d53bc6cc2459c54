// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for pod-admission-webhook.
//!
//! These tests drive the admission core through its public API without a
//! server or a cluster: request body in, AdmissionReview body out.

#[path = "../common/mod.rs"]
mod common;

use common::fixtures::{PodBuilder, ReviewBuilder, parse_body, response_patch};
use pod_admission_webhook::webhooks::{Decoder, Outcome, review_mutation, review_validation};
use pod_admission_webhook::{PolicyConfig, WebhookState};
use serde_json::json;

fn state() -> WebhookState {
    WebhookState::new(Decoder::default(), PolicyConfig::default())
}

mod validation_scenarios {
    use super::*;

    #[test]
    fn test_latest_image_without_annotations_denied() {
        let pod = PodBuilder::new("webserver")
            .container("webserver", "nginx:latest")
            .build();
        let body = ReviewBuilder::new("scenario-a").pod(&pod).build();

        let reviewed = review_validation(&state(), &body).unwrap();
        assert_eq!(reviewed.outcome, Outcome::Denied);

        let review = parse_body(&reviewed.body);
        assert_eq!(review["response"]["uid"], "scenario-a");
        assert_eq!(review["response"]["allowed"], false);
        assert_eq!(review["response"]["status"]["reason"], "Invalid");
        let message = review["response"]["status"]["message"].as_str().unwrap();
        assert!(message.contains("nginx:latest"), "message: {message}");
    }

    #[test]
    fn test_pinned_image_with_annotation_allowed() {
        let pod = PodBuilder::new("webserver")
            .container("webserver", "nginx:1.21")
            .validated()
            .build();
        let body = ReviewBuilder::new("scenario-b").pod(&pod).build();

        let reviewed = review_validation(&state(), &body).unwrap();
        assert_eq!(reviewed.outcome, Outcome::Allowed);

        let review = parse_body(&reviewed.body);
        assert_eq!(review["response"]["uid"], "scenario-b");
        assert_eq!(review["response"]["allowed"], true);
        assert!(review["response"].get("patch").is_none());
    }

    #[test]
    fn test_missing_annotation_variants_denied() {
        let variants = [
            PodBuilder::new("absent").container("web", "nginx:1.21"),
            PodBuilder::new("empty")
                .container("web", "nginx:1.21")
                .empty_annotations(),
            PodBuilder::new("other-key")
                .container("web", "nginx:1.21")
                .annotation("team", "web"),
            PodBuilder::new("wrong-value")
                .container("web", "nginx:1.21")
                .annotation("validated-by", "someone"),
        ];

        for builder in variants {
            let pod = builder.build();
            let name = pod.metadata.name.clone().unwrap();
            let body = ReviewBuilder::new(name.clone()).pod(&pod).build();

            let review = parse_body(&review_validation(&state(), &body).unwrap().body);
            assert_eq!(review["response"]["allowed"], false, "variant {name}");
            assert_eq!(review["response"]["uid"], name.as_str());
            assert_eq!(
                review["response"]["status"]["message"],
                "Pod metadata: has no desired annotation in it validated-by:custom webhook"
            );
        }
    }

    #[test]
    fn test_untagged_image_denied() {
        let pod = PodBuilder::new("webserver")
            .container("webserver", "registry.local:5000/nginx")
            .validated()
            .build();
        let body = ReviewBuilder::new("untagged").pod(&pod).build();

        let review = parse_body(&review_validation(&state(), &body).unwrap().body);
        assert_eq!(review["response"]["allowed"], false);
        assert!(
            review["response"]["status"]["message"]
                .as_str()
                .unwrap()
                .contains("no tag or digest")
        );
    }

    #[test]
    fn test_v1beta1_envelope_echoed() {
        let pod = PodBuilder::new("webserver")
            .container("webserver", "nginx:1.21")
            .validated()
            .build();
        let body = ReviewBuilder::new("beta")
            .api_version("admission.k8s.io/v1beta1")
            .pod(&pod)
            .build();

        let review = parse_body(&review_validation(&state(), &body).unwrap().body);
        assert_eq!(review["apiVersion"], "admission.k8s.io/v1beta1");
        assert_eq!(review["response"]["allowed"], true);
    }
}

mod mutation_scenarios {
    use super::*;

    #[test]
    fn test_unset_pull_policy_patched() {
        let pod = PodBuilder::new("webserver")
            .container("webserver", "nginx:1.21")
            .validated()
            .build();
        let body = ReviewBuilder::new("scenario-c").pod(&pod).build();

        let reviewed = review_mutation(&state(), &body).unwrap();
        assert_eq!(reviewed.outcome, Outcome::Mutated);

        let review = parse_body(&reviewed.body);
        assert_eq!(review["response"]["uid"], "scenario-c");
        assert_eq!(review["response"]["allowed"], true);
        assert_eq!(review["response"]["patchType"], "JSONPatch");
        assert_eq!(
            response_patch(&review).unwrap(),
            json!([{
                "op": "add",
                "path": "/spec/containers/0/imagePullPolicy",
                "value": "IfNotPresent"
            }])
        );
    }

    #[test]
    fn test_empty_string_pull_policy_replaced() {
        let pod = PodBuilder::new("webserver")
            .container_with_policy("webserver", "nginx:1.21", Some(""))
            .validated()
            .build();
        let body = ReviewBuilder::new("empty-policy").pod(&pod).build();

        let review = parse_body(&review_mutation(&state(), &body).unwrap().body);
        assert_eq!(
            response_patch(&review).unwrap(),
            json!([{
                "op": "replace",
                "path": "/spec/containers/0/imagePullPolicy",
                "value": "IfNotPresent"
            }])
        );
    }

    #[test]
    fn test_conformant_pod_unchanged() {
        let pod = PodBuilder::new("webserver")
            .container_with_policy("webserver", "nginx:1.21", Some("IfNotPresent"))
            .validated()
            .build();
        let body = ReviewBuilder::new("scenario-d").pod(&pod).build();

        let reviewed = review_mutation(&state(), &body).unwrap();
        assert_eq!(reviewed.outcome, Outcome::Allowed);

        let review = parse_body(&reviewed.body);
        assert_eq!(review["response"]["uid"], "scenario-d");
        assert_eq!(review["response"]["allowed"], true);
        assert!(review["response"].get("patch").is_none());
        assert!(review["response"].get("patchType").is_none());
    }

    #[test]
    fn test_annotation_mapping_created() {
        let pod = PodBuilder::new("webserver")
            .container_with_policy("webserver", "nginx:1.21", Some("Always"))
            .build();
        let body = ReviewBuilder::new("stamp").pod(&pod).build();

        let review = parse_body(&review_mutation(&state(), &body).unwrap().body);
        assert_eq!(
            response_patch(&review).unwrap(),
            json!([{
                "op": "add",
                "path": "/metadata/annotations",
                "value": {"validated-by": "custom webhook"}
            }])
        );
    }

    #[test]
    fn test_mutation_never_denies() {
        // The mutating endpoint admits even what validation would reject
        let pod = PodBuilder::new("webserver")
            .container("webserver", "nginx:latest")
            .build();
        let body = ReviewBuilder::new("latest").pod(&pod).build();

        let review = parse_body(&review_mutation(&state(), &body).unwrap().body);
        assert_eq!(review["response"]["allowed"], true);
    }

    #[test]
    fn test_patch_applies_to_submitted_object() {
        let pod = PodBuilder::new("webserver")
            .namespace("default")
            .container("web", "nginx:1.21")
            .container_with_policy("sidecar", "envoy:1.30", Some("Always"))
            .init_container("init", "busybox:1.36")
            .annotation("team", "web")
            .build();
        let body = ReviewBuilder::new("round-trip").pod(&pod).build();

        let review = parse_body(&review_mutation(&state(), &body).unwrap().body);
        let patch: json_patch::Patch =
            serde_json::from_value(response_patch(&review).unwrap()).unwrap();

        let mut applied = serde_json::to_value(&pod).unwrap();
        json_patch::patch(&mut applied, &patch).unwrap();

        assert_eq!(applied["metadata"]["annotations"]["validated-by"], "custom webhook");
        assert_eq!(applied["metadata"]["annotations"]["team"], "web");
        assert_eq!(applied["spec"]["containers"][0]["imagePullPolicy"], "IfNotPresent");
        assert_eq!(applied["spec"]["containers"][1]["imagePullPolicy"], "Always");
        assert_eq!(
            applied["spec"]["initContainers"][0]["imagePullPolicy"],
            "IfNotPresent"
        );
    }
}

mod error_scenarios {
    use super::*;
    use pod_admission_webhook::webhooks::{DecodeStage, WebhookError};

    #[test]
    fn test_kind_mismatch_is_decode_error() {
        let body = ReviewBuilder::new("deployment")
            .kind("apps", "v1", "Deployment")
            .object(json!({"metadata": {"name": "web"}, "spec": {}}))
            .build();

        let err = review_validation(&state(), &body).unwrap_err();
        match err {
            WebhookError::Decode(e) => {
                assert_eq!(e.stage, DecodeStage::Object);
                assert_eq!(e.uid.as_deref(), Some("deployment"));
            }
            other => panic!("expected decode error, got {other}"),
        }
    }

    #[test]
    fn test_malformed_envelope_is_decode_error() {
        let err = review_mutation(&state(), b"{\"apiVersion\": 1}").unwrap_err();
        assert_eq!(err.stage(), "decode");
        assert_eq!(err.uid(), None);
    }
}
