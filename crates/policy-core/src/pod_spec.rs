use std::fmt;

use crate::{
    errors::StructuralError,
    object::{CandidateObject, Element, Items},
    pointer::JsonPointer,
};

/// Where the pod spec lives inside of the objects that embed one
pub fn pod_spec_pointer(kind: &str) -> Option<JsonPointer> {
    let tokens: &[&str] = match kind {
        "Pod" => &["spec"],
        "Deployment" | "ReplicaSet" | "StatefulSet" | "DaemonSet" | "Job"
        | "ReplicationController" => &["spec", "template", "spec"],
        "CronJob" => &["spec", "jobTemplate", "spec", "template", "spec"],
        _ => return None,
    };
    Some(JsonPointer::from_tokens(tokens.iter().copied()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Container,
    InitContainer,
    EphemeralContainer,
}

impl ContainerKind {
    pub const ALL: [ContainerKind; 3] = [
        ContainerKind::Container,
        ContainerKind::InitContainer,
        ContainerKind::EphemeralContainer,
    ];

    /// Name of the pod spec field holding this kind of containers
    pub fn field(&self) -> &'static str {
        match self {
            ContainerKind::Container => "containers",
            ContainerKind::InitContainer => "initContainers",
            ContainerKind::EphemeralContainer => "ephemeralContainers",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerKind::Container => "container",
            ContainerKind::InitContainer => "init container",
            ContainerKind::EphemeralContainer => "ephemeral container",
        };
        write!(f, "{s}")
    }
}

/// A container of the pod spec
#[derive(Debug, Clone, PartialEq)]
pub struct Container<'a> {
    pub kind: ContainerKind,
    pub element: Element<'a>,
}

impl<'a> Container<'a> {
    pub fn pointer(&self) -> &JsonPointer {
        &self.element.pointer
    }

    pub fn name(&self) -> &'a str {
        self.element.name().unwrap_or("<unnamed>")
    }

    pub fn image(&self) -> Option<&'a str> {
        self.element
            .value
            .get("image")
            .and_then(serde_json::Value::as_str)
    }
}

/// The pod spec embedded into the candidate object.
///
/// The spec itself can be missing: the pointer is still meaningful, it is
/// where the fields would be added by a patch.
#[derive(Debug, Clone)]
pub struct PodSpec<'a> {
    object: CandidateObject<'a>,
    pointer: JsonPointer,
}

impl<'a> PodSpec<'a> {
    /// Locate the pod spec of `object`, `None` when its kind does not embed one
    pub fn locate(object: CandidateObject<'a>) -> Option<PodSpec<'a>> {
        pod_spec_pointer(object.kind()).map(|pointer| PodSpec { object, pointer })
    }

    pub fn pointer(&self) -> &JsonPointer {
        &self.pointer
    }

    pub fn object(&self) -> &CandidateObject<'a> {
        &self.object
    }

    /// Pointer to a field relative to the pod spec
    pub fn field<I, T>(&self, tokens: I) -> JsonPointer
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.pointer.extend(tokens)
    }

    pub fn volumes(&self) -> Result<Items<'a>, StructuralError> {
        self.object.items(&self.pointer.join("volumes"))
    }

    /// Enumerate regular, init and ephemeral containers, in this order
    pub fn containers(&self) -> Result<Containers<'a>, StructuralError> {
        self.containers_of(&ContainerKind::ALL)
    }

    pub fn containers_of(&self, kinds: &[ContainerKind]) -> Result<Containers<'a>, StructuralError> {
        let groups = kinds
            .iter()
            .map(|kind| {
                self.object
                    .items(&self.pointer.join(kind.field()))
                    .map(|items| (*kind, items))
            })
            .collect::<Result<Vec<_>, StructuralError>>()?;

        Ok(Containers {
            groups: groups.into_iter(),
            current: None,
        })
    }
}

/// Lazy, restartable sequence of the containers of a pod spec
#[derive(Debug, Clone)]
pub struct Containers<'a> {
    groups: std::vec::IntoIter<(ContainerKind, Items<'a>)>,
    current: Option<(ContainerKind, Items<'a>)>,
}

impl<'a> Iterator for Containers<'a> {
    type Item = Container<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((kind, items)) = self.current.as_mut() {
                if let Some(element) = items.next() {
                    return Some(Container {
                        kind: *kind,
                        element,
                    });
                }
            }
            self.current = Some(self.groups.next()?);
        }
    }
}
