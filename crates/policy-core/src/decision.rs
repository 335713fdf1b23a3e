use std::fmt;

use crate::patch::Patch;

/// The verdict of a policy about a candidate object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Rejected { reason: String },
}

impl Decision {
    pub fn reject(reason: impl Into<String>) -> Decision {
        Decision::Rejected {
            reason: reason.into(),
        }
    }

    /// Reject with all the given reasons, allow when there are none.
    ///
    /// Reasons are joined in the order they are given.
    pub fn from_violations<I, S>(violations: I) -> Decision
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let reasons: Vec<String> = violations
            .into_iter()
            .map(|v| v.as_ref().to_string())
            .collect();
        if reasons.is_empty() {
            Decision::Allowed
        } else {
            Decision::reject(reasons.join("; "))
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Decision::Allowed => None,
            Decision::Rejected { reason } => Some(reason.as_str()),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allowed => write!(f, "allowed"),
            Decision::Rejected { reason } => write!(f, "rejected: {reason}"),
        }
    }
}

/// Decision plus the patch to apply when the object is allowed.
///
/// A rejected evaluation never carries a patch.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    decision: Decision,
    patch: Patch,
}

impl Evaluation {
    pub fn allowed() -> Self {
        Evaluation {
            decision: Decision::Allowed,
            patch: Patch::default(),
        }
    }

    pub fn mutated(patch: Patch) -> Self {
        Evaluation {
            decision: Decision::Allowed,
            patch,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Evaluation {
            decision: Decision::reject(reason),
            patch: Patch::default(),
        }
    }

    pub fn decision(&self) -> &Decision {
        &self.decision
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn is_allowed(&self) -> bool {
        self.decision.is_allowed()
    }

    pub fn into_parts(self) -> (Decision, Patch) {
        (self.decision, self.patch)
    }
}
