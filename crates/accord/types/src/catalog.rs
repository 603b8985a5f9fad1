//! Static reference catalogs
//!
//! Steps enumerate document kinds, statuses enumerate lifecycle labels. Both
//! are immutable ordinal tables seeded once into storage and never edited by
//! the transition path.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal of a step (document kind) in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub i32);

/// Ordinal of a lifecycle status in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusId(pub i32);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step:{}", self.0)
    }
}

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status:{}", self.0)
    }
}

/// A step catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Step {
    pub id: StepId,
    pub name: &'static str,
}

/// A status catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    pub id: StatusId,
    pub label: &'static str,
}

pub const STEPS: [Step; 5] = [
    Step { id: StepId(1), name: "MOM" },
    Step { id: StepId(2), name: "NDA" },
    Step { id: StepId(3), name: "JIK" },
    Step { id: StepId(4), name: "MSA" },
    Step { id: StepId(5), name: "MOU" },
];

pub const STATUSES: [Status; 5] = [
    Status { id: StatusId(1), label: "Review Partner" },
    Status { id: StatusId(2), label: "Review Legal Tsat" },
    Status { id: StatusId(3), label: "Circulation" },
    Status { id: StatusId(4), label: "Signing" },
    Status { id: StatusId(5), label: "Finished" },
];

impl Status {
    /// Look up a status by ordinal
    pub fn by_id(id: StatusId) -> Option<&'static Status> {
        STATUSES.iter().find(|s| s.id == id)
    }

    /// Look up a status by its exact label
    pub fn by_label(label: &str) -> Option<&'static Status> {
        let label = label.trim();
        STATUSES.iter().find(|s| s.label == label)
    }
}

impl Step {
    pub fn by_id(id: StepId) -> Option<&'static Step> {
        STEPS.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_ordinals_are_dense() {
        for (i, step) in STEPS.iter().enumerate() {
            assert_eq!(step.id.0, i as i32 + 1);
        }
        for (i, status) in STATUSES.iter().enumerate() {
            assert_eq!(status.id.0, i as i32 + 1);
        }
    }

    #[test]
    fn test_status_lookup() {
        assert_eq!(Status::by_label(" Circulation ").map(|s| s.id), Some(StatusId(3)));
        assert_eq!(Status::by_id(StatusId(5)).map(|s| s.label), Some("Finished"));
        assert!(Status::by_id(StatusId(9)).is_none());
        assert!(Status::by_label("Review Legal").is_none());
    }
}
