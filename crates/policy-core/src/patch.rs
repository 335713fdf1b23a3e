use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    errors::{StructuralError, json_type_name},
    object::{CandidateObject, display},
    pointer::JsonPointer,
};

/// A single RFC 6902 operation. Only the operations used by the
/// policies are modelled.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: JsonPointer, value: Value },
    Remove { path: JsonPointer },
    Replace { path: JsonPointer, value: Value },
}

impl PatchOperation {
    pub fn path(&self) -> &JsonPointer {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Remove { path }
            | PatchOperation::Replace { path, .. } => path,
        }
    }
}

/// Ordered list of operations, serialized as a JSON Patch document
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Patch(Vec<PatchOperation>);

impl Patch {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchOperation> {
        self.0.iter()
    }

    /// Base64 encoding of the JSON document, as expected by the
    /// `patch` field of an AdmissionResponse
    pub fn to_base64(&self) -> serde_json::Result<String> {
        serde_json::to_string(self).map(|s| general_purpose::STANDARD.encode(s))
    }

    /// Apply all the operations to `document`, in order
    pub fn apply(&self, document: &mut Value) -> Result<(), StructuralError> {
        self.0.iter().try_for_each(|op| apply_operation(document, op))
    }
}

impl From<Vec<PatchOperation>> for Patch {
    fn from(operations: Vec<PatchOperation>) -> Self {
        Patch(operations)
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a PatchOperation;
    type IntoIter = std::slice::Iter<'a, PatchOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

enum Location<'v> {
    Present(&'v Value),
    /// The token at `depth` is the first one that cannot be resolved
    Missing { depth: usize },
}

fn locate<'v>(document: &'v Value, pointer: &JsonPointer) -> Result<Location<'v>, StructuralError> {
    let tokens = pointer.tokens();
    let mut current = document;

    for (depth, token) in tokens.iter().enumerate() {
        let last = depth + 1 == tokens.len();
        match current {
            Value::Object(fields) => match fields.get(token) {
                None | Some(Value::Null) => return Ok(Location::Missing { depth }),
                Some(value) => current = value,
            },
            Value::Array(elements) => {
                let element = if token == "-" {
                    None
                } else {
                    let index = token.parse::<usize>().map_err(|_| StructuralError::Malformed {
                        pointer: display(&pointer.prefix(depth + 1)),
                        message: format!("'{token}' is not a valid array index"),
                    })?;
                    elements.get(index)
                };
                match element {
                    Some(value) => current = value,
                    None if last => return Ok(Location::Missing { depth }),
                    None => {
                        return Err(StructuralError::Malformed {
                            pointer: display(&pointer.prefix(depth + 1)),
                            message: "array element does not exist".to_string(),
                        });
                    }
                }
            }
            other => {
                return Err(StructuralError::UnexpectedType {
                    pointer: display(&pointer.prefix(depth)),
                    expected: "an object or an array",
                    found: json_type_name(other),
                });
            }
        }
    }

    Ok(Location::Present(current))
}

/// Apply a single operation through `json_patch`. On failure the document
/// is left untouched.
fn apply_operation(document: &mut Value, op: &PatchOperation) -> Result<(), StructuralError> {
    let malformed = |message: String| StructuralError::Malformed {
        pointer: display(op.path()),
        message,
    };

    let patch: json_patch::Patch = serde_json::to_value([op])
        .and_then(serde_json::from_value)
        .map_err(|e| malformed(e.to_string()))?;
    json_patch::patch(document, &patch).map_err(|e| malformed(e.to_string()))
}

/// Computes the narrowest patch bringing an object into compliance.
///
/// The builder keeps a working copy of the object with all the operations
/// emitted so far already applied, so that later calls see the containers
/// created by earlier ones and never add the same parent twice.
#[derive(Debug, Clone)]
pub struct PatchBuilder {
    document: Value,
    operations: Vec<PatchOperation>,
}

impl PatchBuilder {
    pub fn new(object: &CandidateObject<'_>) -> Self {
        PatchBuilder {
            document: object.root().clone(),
            operations: Vec::new(),
        }
    }

    /// Ensure `pointer` holds `value`.
    ///
    /// Emits nothing when the value is already there, a `replace` when a
    /// different value is there, and an `add` of the first missing
    /// ancestor otherwise. The added value embeds the intermediate objects.
    pub fn set(&mut self, pointer: &JsonPointer, value: Value) -> Result<(), StructuralError> {
        let missing_depth = match locate(&self.document, pointer)? {
            Location::Present(current) if *current == value => return Ok(()),
            Location::Present(_) => None,
            Location::Missing { depth } => Some(depth),
        };

        let operation = match missing_depth {
            None => PatchOperation::Replace {
                path: pointer.clone(),
                value,
            },
            Some(depth) => {
                let nested = pointer.tokens()[depth + 1..]
                    .iter()
                    .rev()
                    .fold(value, |inner, token| {
                        let mut fields = Map::new();
                        fields.insert(token.clone(), inner);
                        Value::Object(fields)
                    });
                PatchOperation::Add {
                    path: pointer.prefix(depth + 1),
                    value: nested,
                }
            }
        };

        self.push(operation)
    }

    /// Ensure the object at `pointer` has all the given fields. Other
    /// fields of the object are left untouched.
    pub fn merge(
        &mut self,
        pointer: &JsonPointer,
        fields: Map<String, Value>,
    ) -> Result<(), StructuralError> {
        if fields.is_empty() {
            return Ok(());
        }

        match locate(&self.document, pointer)? {
            Location::Missing { .. } => return self.set(pointer, Value::Object(fields)),
            Location::Present(Value::Object(_)) => {}
            Location::Present(other) => {
                return Err(StructuralError::UnexpectedType {
                    pointer: display(pointer),
                    expected: "an object",
                    found: json_type_name(other),
                });
            }
        }

        for (field, value) in fields {
            self.set(&pointer.join(field), value)?;
        }
        Ok(())
    }

    /// Append `value` to the array at `pointer`, creating the array when
    /// it does not exist.
    pub fn append(&mut self, pointer: &JsonPointer, value: Value) -> Result<(), StructuralError> {
        match locate(&self.document, pointer)? {
            Location::Missing { .. } => self.set(pointer, Value::Array(vec![value])),
            Location::Present(Value::Array(_)) => self.push(PatchOperation::Add {
                path: pointer.join("-"),
                value,
            }),
            Location::Present(other) => Err(StructuralError::UnexpectedType {
                pointer: display(pointer),
                expected: "an array",
                found: json_type_name(other),
            }),
        }
    }

    /// The object with all the operations applied
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn build(self) -> Patch {
        Patch(self.operations)
    }

    fn push(&mut self, operation: PatchOperation) -> Result<(), StructuralError> {
        apply_operation(&mut self.document, &operation)?;
        self.operations.push(operation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    fn ptr(raw: &str) -> JsonPointer {
        raw.parse().unwrap()
    }

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(fields) => fields,
            _ => panic!("not an object"),
        }
    }

    /// Apply the whole patch document at once, the way the API server does
    fn apply_with_json_patch(document: &Value, patch: &Patch) -> Value {
        let patch: json_patch::Patch =
            serde_json::from_value(serde_json::to_value(patch).unwrap()).unwrap();
        let mut patched = document.clone();
        json_patch::patch(&mut patched, &patch).unwrap();
        patched
    }

    #[test]
    fn set_adds_first_missing_ancestor() {
        let pod = json!({"kind": "Pod", "spec": {"containers": [{"name": "nginx"}]}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);

        builder
            .set(&ptr("/spec/securityContext/seLinuxOptions/type"), json!("spc_t"))
            .unwrap();
        let patch = builder.build();

        assert_eq!(
            patch,
            Patch::from(vec![PatchOperation::Add {
                path: ptr("/spec/securityContext"),
                value: json!({"seLinuxOptions": {"type": "spc_t"}}),
            }])
        );
    }

    #[test]
    fn set_replaces_different_value_and_skips_equal_one() {
        let pod = json!({"spec": {"hostNetwork": true, "hostPID": false}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);

        builder.set(&ptr("/spec/hostNetwork"), json!(false)).unwrap();
        builder.set(&ptr("/spec/hostPID"), json!(false)).unwrap();

        assert_eq!(
            builder.build(),
            Patch::from(vec![PatchOperation::Replace {
                path: ptr("/spec/hostNetwork"),
                value: json!(false),
            }])
        );
    }

    #[test]
    fn null_member_is_replaced_with_add() {
        let pod = json!({"spec": {"securityContext": null}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);

        builder
            .set(&ptr("/spec/securityContext/runAsNonRoot"), json!(true))
            .unwrap();

        let patch = builder.build();
        assert_eq!(
            patch.operations(),
            &[PatchOperation::Add {
                path: ptr("/spec/securityContext"),
                value: json!({"runAsNonRoot": true}),
            }]
        );
        assert_json_eq!(
            apply_with_json_patch(&pod, &patch),
            json!({"spec": {"securityContext": {"runAsNonRoot": true}}})
        );
    }

    #[test]
    fn merge_into_missing_object_is_a_single_add() {
        let pod = json!({"spec": {"securityContext": {"runAsUser": 1000}}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);

        builder
            .merge(
                &ptr("/spec/securityContext/seLinuxOptions"),
                fields(json!({"level": "s0", "role": "system_r", "type": "spc_t", "user": "system_u"})),
            )
            .unwrap();

        let patch = builder.build();
        assert_eq!(patch.len(), 1);
        assert_json_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{
                "op": "add",
                "path": "/spec/securityContext/seLinuxOptions",
                "value": {"level": "s0", "role": "system_r", "type": "spc_t", "user": "system_u"}
            }])
        );
    }

    #[test]
    fn merge_into_existing_object_touches_only_given_fields() {
        let pod = json!({"spec": {"securityContext": {"seLinuxOptions": {
            "user": "system_u",
            "type": "container_t",
            "extra": "kept"
        }}}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);

        builder
            .merge(
                &ptr("/spec/securityContext/seLinuxOptions"),
                fields(json!({"level": "s0", "type": "spc_t", "user": "system_u"})),
            )
            .unwrap();

        let expected_document = json!({"spec": {"securityContext": {"seLinuxOptions": {
            "user": "system_u",
            "type": "spc_t",
            "level": "s0",
            "extra": "kept"
        }}}});
        assert_json_eq!(builder.document(), &expected_document);

        let patch = builder.build();
        assert_eq!(
            patch.operations(),
            &[
                PatchOperation::Add {
                    path: ptr("/spec/securityContext/seLinuxOptions/level"),
                    value: json!("s0"),
                },
                PatchOperation::Replace {
                    path: ptr("/spec/securityContext/seLinuxOptions/type"),
                    value: json!("spc_t"),
                },
            ]
        );
        assert_json_eq!(apply_with_json_patch(&pod, &patch), expected_document);
    }

    #[test]
    fn consecutive_sets_share_created_parents() {
        let pod = json!({"spec": {}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);

        builder
            .set(&ptr("/spec/dnsConfig/searches"), json!(["example.com"]))
            .unwrap();
        builder
            .set(&ptr("/spec/dnsConfig/nameservers"), json!(["1.1.1.1"]))
            .unwrap();

        let patch = builder.build();
        assert_eq!(
            patch.operations(),
            &[
                PatchOperation::Add {
                    path: ptr("/spec/dnsConfig"),
                    value: json!({"searches": ["example.com"]}),
                },
                PatchOperation::Add {
                    path: ptr("/spec/dnsConfig/nameservers"),
                    value: json!(["1.1.1.1"]),
                },
            ]
        );
    }

    #[test]
    fn keys_are_escaped_in_paths() {
        let pod = json!({"metadata": {"annotations": {}}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);

        builder
            .set(
                &JsonPointer::from_tokens(["metadata", "annotations", "example.com/team~a"]),
                json!("platform"),
            )
            .unwrap();

        let patch = builder.build();
        assert_json_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{"op": "add", "path": "/metadata/annotations/example.com~1team~0a", "value": "platform"}])
        );
        assert_json_eq!(
            apply_with_json_patch(&pod, &patch),
            json!({"metadata": {"annotations": {"example.com/team~a": "platform"}}})
        );
    }

    #[test]
    fn append_to_existing_and_missing_arrays() {
        let pod = json!({"spec": {"dnsConfig": {"options": [{"name": "timeout", "value": "5"}]}}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);

        builder
            .append(
                &ptr("/spec/dnsConfig/options"),
                json!({"name": "ndots", "value": "5"}),
            )
            .unwrap();
        builder
            .append(&ptr("/spec/dnsConfig/searches"), json!("example.com"))
            .unwrap();

        let patch = builder.build();
        assert_eq!(
            patch.operations(),
            &[
                PatchOperation::Add {
                    path: ptr("/spec/dnsConfig/options/-"),
                    value: json!({"name": "ndots", "value": "5"}),
                },
                PatchOperation::Add {
                    path: ptr("/spec/dnsConfig/searches"),
                    value: json!(["example.com"]),
                },
            ]
        );
        assert_json_eq!(
            apply_with_json_patch(&pod, &patch),
            json!({"spec": {"dnsConfig": {
                "options": [{"name": "timeout", "value": "5"}, {"name": "ndots", "value": "5"}],
                "searches": ["example.com"]
            }}})
        );
    }

    #[test]
    fn set_inside_array_element() {
        let pod = json!({"spec": {"containers": [{"name": "a"}, {"name": "b"}]}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);

        builder
            .set(
                &ptr("/spec/containers/1/resources/limits/cpu"),
                json!("500m"),
            )
            .unwrap();

        assert_eq!(
            builder.build().operations(),
            &[PatchOperation::Add {
                path: ptr("/spec/containers/1/resources"),
                value: json!({"limits": {"cpu": "500m"}}),
            }]
        );
    }

    #[test]
    fn set_below_missing_array_element_is_an_error() {
        let pod = json!({"spec": {"containers": []}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);

        let err = builder
            .set(&ptr("/spec/containers/0/name"), json!("x"))
            .unwrap_err();
        assert!(matches!(err, StructuralError::Malformed { .. }));
    }

    #[test]
    fn set_below_scalar_is_an_error() {
        let pod = json!({"spec": {"securityContext": "privileged"}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);

        let err = builder
            .set(&ptr("/spec/securityContext/seLinuxOptions"), json!({}))
            .unwrap_err();
        assert_eq!(
            err,
            StructuralError::UnexpectedType {
                pointer: "/spec/securityContext".to_string(),
                expected: "an object or an array",
                found: "a string",
            }
        );
    }

    #[test]
    fn merge_into_scalar_is_an_error() {
        let pod = json!({"spec": {"securityContext": 1}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);

        assert!(
            builder
                .merge(&ptr("/spec/securityContext"), fields(json!({"a": 1})))
                .is_err()
        );
    }

    #[test]
    fn patch_apply_matches_builder_document() {
        let pod = json!({"spec": {"containers": [{"name": "a", "resources": {}}]}});
        let object = CandidateObject::new("Pod", &pod);
        let mut builder = PatchBuilder::new(&object);
        builder
            .set(&ptr("/spec/containers/0/resources/limits/memory"), json!("128Mi"))
            .unwrap();
        builder
            .set(&ptr("/spec/containers/0/resources/requests/memory"), json!("64Mi"))
            .unwrap();
        let expected = builder.document().clone();
        let patch = builder.build();

        let mut patched = pod.clone();
        patch.apply(&mut patched).unwrap();
        assert_eq!(patched, expected);
        assert_eq!(apply_with_json_patch(&pod, &patch), expected);
    }

    #[test]
    fn failed_operation_names_its_path() {
        let mut pod = json!({"spec": {"containers": []}});
        let patch = Patch::from(vec![
            PatchOperation::Add {
                path: ptr("/spec/hostNetwork"),
                value: json!(false),
            },
            PatchOperation::Replace {
                path: ptr("/spec/containers/0/name"),
                value: json!("nginx"),
            },
        ]);

        let err = patch.apply(&mut pod).unwrap_err();
        assert!(
            matches!(err, StructuralError::Malformed { ref pointer, .. } if pointer == "/spec/containers/0/name")
        );
        // operations before the failing one stay applied
        assert_eq!(pod, json!({"spec": {"containers": [], "hostNetwork": false}}));
    }

    #[test]
    fn remove_operation_is_applied() {
        let mut pod = json!({"spec": {"hostNetwork": true, "hostPID": true}});
        let patch = Patch::from(vec![PatchOperation::Remove {
            path: ptr("/spec/hostNetwork"),
        }]);

        patch.apply(&mut pod).unwrap();
        assert_eq!(pod, json!({"spec": {"hostPID": true}}));
        assert!(patch.apply(&mut pod).is_err());
    }

    #[test]
    fn base64_encoding() {
        let patch = Patch::from(vec![PatchOperation::Remove {
            path: ptr("/spec/hostNetwork"),
        }]);
        let encoded = patch.to_base64().unwrap();
        let decoded = general_purpose::STANDARD.decode(encoded).unwrap();

        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            r#"[{"op":"remove","path":"/spec/hostNetwork"}]"#
        );
    }

    #[test]
    fn empty_patch() {
        let pod = json!({});
        let builder = PatchBuilder::new(&CandidateObject::new("Pod", &pod));
        let patch = builder.build();

        assert!(patch.is_empty());
        assert_eq!(serde_json::to_string(&patch).unwrap(), "[]");
    }
}
