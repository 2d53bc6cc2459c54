//! JSON Patch construction.
//!
//! Computes a structural diff between the original and proposed objects.
//! The operation sequence is deterministic: the same pair of inputs always
//! yields the same operations in the same order.

use json_patch::{Patch, PatchOperation};
use serde::Serialize;
use serde_json::Value;

use crate::webhooks::error::PatchError;

/// Diff two serialized objects.
///
/// Fails only when either input is not well-formed JSON.
pub fn diff(original: &[u8], mutated: &[u8]) -> Result<Patch, PatchError> {
    let original: Value = serde_json::from_slice(original)?;
    let mutated: Value = serde_json::from_slice(mutated)?;
    Ok(diff_values(&original, &mutated))
}

/// Diff two typed objects through their JSON serialization
pub fn diff_objects<T: Serialize>(original: &T, mutated: &T) -> Result<Patch, PatchError> {
    let original = serde_json::to_vec(original)?;
    let mutated = serde_json::to_vec(mutated)?;
    diff(&original, &mutated)
}

/// Diff two JSON documents
pub fn diff_values(original: &Value, mutated: &Value) -> Patch {
    json_patch::diff(original, mutated)
}

/// Short name of an operation, for logging
pub fn op_name(op: &PatchOperation) -> &'static str {
    match op {
        PatchOperation::Add(_) => "add",
        PatchOperation::Remove(_) => "remove",
        PatchOperation::Replace(_) => "replace",
        PatchOperation::Move(_) => "move",
        PatchOperation::Copy(_) => "copy",
        PatchOperation::Test(_) => "test",
    }
}

/// Paths touched by a patch, in order
pub fn touched_paths(patch: &Patch) -> Vec<String> {
    patch.0.iter().map(|op| op.path().to_string()).collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_inputs_produce_empty_patch() {
        let doc = json!({"metadata": {"name": "web"}, "spec": {"containers": []}});
        let bytes = serde_json::to_vec(&doc).unwrap();
        let patch = diff(&bytes, &bytes).unwrap();
        assert!(patch.0.is_empty());
    }

    #[test]
    fn test_added_field() {
        let original = json!({"spec": {"containers": [{"name": "web", "image": "nginx:1.21"}]}});
        let mut mutated = original.clone();
        mutated["spec"]["containers"][0]["imagePullPolicy"] = json!("IfNotPresent");

        let patch = diff_values(&original, &mutated);
        assert_eq!(patch.0.len(), 1);
        assert_eq!(op_name(&patch.0[0]), "add");
        assert_eq!(
            touched_paths(&patch),
            vec!["/spec/containers/0/imagePullPolicy".to_string()]
        );
    }

    #[test]
    fn test_replaced_and_removed_fields() {
        let original = json!({"a": 1, "b": "x"});
        let mutated = json!({"a": 2});

        let patch = diff_values(&original, &mutated);
        let names: Vec<_> = patch.0.iter().map(op_name).collect();
        assert!(names.contains(&"replace"));
        assert!(names.contains(&"remove"));
    }

    #[test]
    fn test_annotation_key_is_escaped() {
        let original = json!({"metadata": {"annotations": {}}});
        let mutated = json!({"metadata": {"annotations": {"example.com/vetted": "yes"}}});

        let patch = diff_values(&original, &mutated);
        assert_eq!(
            touched_paths(&patch),
            vec!["/metadata/annotations/example.com~1vetted".to_string()]
        );
    }

    #[test]
    fn test_patch_applies_to_original() {
        let original = json!({
            "metadata": {"name": "web"},
            "spec": {"containers": [{"name": "a"}, {"name": "b", "imagePullPolicy": "Always"}]}
        });
        let mutated = json!({
            "metadata": {"name": "web", "annotations": {"validated-by": "custom webhook"}},
            "spec": {"containers": [
                {"name": "a", "imagePullPolicy": "IfNotPresent"},
                {"name": "b", "imagePullPolicy": "Always"}
            ]}
        });

        let patch = diff_values(&original, &mutated);
        let mut applied = original.clone();
        json_patch::patch(&mut applied, &patch).unwrap();
        assert_eq!(applied, mutated);
    }

    #[test]
    fn test_diff_is_deterministic() {
        let original = json!({"metadata": {"name": "web"}, "spec": {"x": 1}});
        let mutated = json!({"metadata": {"name": "web", "labels": {"a": "b"}}, "spec": {"x": 2}});
        let first = serde_json::to_string(&diff_values(&original, &mutated)).unwrap();
        let second = serde_json::to_string(&diff_values(&original, &mutated)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_input() {
        let result = diff(b"{\"a\":", b"{}");
        assert!(result.is_err());
        let result = diff(b"{}", b"not json");
        assert!(result.is_err());
    }

    #[test]
    fn test_diff_objects() {
        #[derive(Serialize)]
        struct Doc {
            name: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            policy: Option<&'static str>,
        }

        let patch = diff_objects(
            &Doc {
                name: "a",
                policy: None,
            },
            &Doc {
                name: "a",
                policy: Some("IfNotPresent"),
            },
        )
        .unwrap();
        assert_eq!(touched_paths(&patch), vec!["/policy".to_string()]);
    }
}
