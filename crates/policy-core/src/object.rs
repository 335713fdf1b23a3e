use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{
    admission_request::AdmissionRequest,
    errors::{StructuralError, json_type_name},
    pointer::JsonPointer,
};

/// Read-only view over the object being admitted.
///
/// Only the fields a policy asks for are interpreted, everything else is
/// left untouched. A missing field, or a field explicitly set to `null`, is
/// reported as `None`; a field with an unexpected shape is reported as a
/// [`StructuralError`].
#[derive(Debug, Clone, Copy)]
pub struct CandidateObject<'a> {
    kind: &'a str,
    root: &'a Value,
}

impl<'a> CandidateObject<'a> {
    pub fn new(kind: &'a str, root: &'a Value) -> Self {
        CandidateObject { kind, root }
    }

    /// The kind is taken from the admission request. When the request does
    /// not provide it, the `kind` of the object itself is used.
    pub fn from_request(request: &'a AdmissionRequest) -> Self {
        let kind = if request.kind.kind.is_empty() {
            request
                .object
                .get("kind")
                .and_then(Value::as_str)
                .unwrap_or_default()
        } else {
            request.kind.kind.as_str()
        };
        CandidateObject::new(kind, &request.object)
    }

    pub fn kind(&self) -> &'a str {
        self.kind
    }

    pub fn root(&self) -> &'a Value {
        self.root
    }

    pub fn get(&self, pointer: &JsonPointer) -> Result<Option<&'a Value>, StructuralError> {
        let mut current = self.root;
        if current.is_null() {
            return Ok(None);
        }

        for (depth, token) in pointer.tokens().iter().enumerate() {
            let next = match current {
                Value::Object(fields) => fields.get(token),
                Value::Array(elements) => {
                    let index = token.parse::<usize>().map_err(|_| StructuralError::Malformed {
                        pointer: display(&pointer.prefix(depth + 1)),
                        message: format!("'{token}' is not a valid array index"),
                    })?;
                    elements.get(index)
                }
                other => {
                    return Err(StructuralError::UnexpectedType {
                        pointer: display(&pointer.prefix(depth)),
                        expected: "an object or an array",
                        found: json_type_name(other),
                    });
                }
            };

            match next {
                None | Some(Value::Null) => return Ok(None),
                Some(value) => current = value,
            }
        }

        Ok(Some(current))
    }

    pub fn get_object(
        &self,
        pointer: &JsonPointer,
    ) -> Result<Option<&'a Map<String, Value>>, StructuralError> {
        match self.get(pointer)? {
            None => Ok(None),
            Some(Value::Object(fields)) => Ok(Some(fields)),
            Some(other) => Err(unexpected(pointer, "an object", other)),
        }
    }

    pub fn get_str(&self, pointer: &JsonPointer) -> Result<Option<&'a str>, StructuralError> {
        match self.get(pointer)? {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(unexpected(pointer, "a string", other)),
        }
    }

    /// Deserialize the sub-document referenced by `pointer` into `T`
    pub fn get_as<T>(&self, pointer: &JsonPointer) -> Result<Option<T>, StructuralError>
    where
        T: DeserializeOwned,
    {
        let Some(value) = self.get(pointer)? else {
            return Ok(None);
        };
        <T as serde::Deserialize>::deserialize(value)
            .map(Some)
            .map_err(|e| StructuralError::Malformed {
                pointer: display(pointer),
                message: e.to_string(),
            })
    }

    /// Enumerate the elements of the array referenced by `pointer`.
    ///
    /// A missing array yields an empty sequence.
    pub fn items(&self, pointer: &JsonPointer) -> Result<Items<'a>, StructuralError> {
        let elements: &'a [Value] = match self.get(pointer)? {
            None => Default::default(),
            Some(Value::Array(elements)) => elements.as_slice(),
            Some(other) => return Err(unexpected(pointer, "an array", other)),
        };
        Ok(Items {
            base: pointer.clone(),
            elements: elements.iter().enumerate(),
        })
    }
}

/// An element of an array, together with the pointer that references it
#[derive(Debug, Clone, PartialEq)]
pub struct Element<'a> {
    pub pointer: JsonPointer,
    pub value: &'a Value,
}

impl<'a> Element<'a> {
    pub fn name(&self) -> Option<&'a str> {
        self.value.get("name").and_then(Value::as_str)
    }
}

/// Lazy sequence over the elements of an array. Cloning it restarts the
/// enumeration from the current position.
#[derive(Debug, Clone)]
pub struct Items<'a> {
    base: JsonPointer,
    elements: std::iter::Enumerate<std::slice::Iter<'a, Value>>,
}

impl<'a> Iterator for Items<'a> {
    type Item = Element<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.elements.next().map(|(index, value)| Element {
            pointer: self.base.index(index),
            value,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.elements.size_hint()
    }
}

impl ExactSizeIterator for Items<'_> {}

fn unexpected(pointer: &JsonPointer, expected: &'static str, found: &Value) -> StructuralError {
    StructuralError::UnexpectedType {
        pointer: display(pointer),
        expected,
        found: json_type_name(found),
    }
}

pub(crate) fn display(pointer: &JsonPointer) -> String {
    if pointer.is_root() {
        "<root>".to_string()
    } else {
        pointer.to_string()
    }
}
