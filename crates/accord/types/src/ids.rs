//! Strongly-typed identifiers for Accord entities
//!
//! All IDs are database serial keys wrapped in newtype structs so a progress
//! id can never be passed where a document id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! serial_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

serial_id!(
    /// Identifier of a partnership company
    CompanyId,
    "company"
);
serial_id!(
    /// Identifier of a row in the progress ledger
    ProgressId,
    "progress"
);
serial_id!(
    /// Identifier of a kind-specific document record
    DocumentId,
    "document"
);
serial_id!(
    /// Identifier of a stored document artifact
    ArtifactId,
    "artifact"
);
serial_id!(
    /// Identifier of an approver (person or organisation)
    ApproverId,
    "approver"
);
serial_id!(
    /// Identifier of the join row binding one approver to one document
    ApproverLinkId,
    "approver-link"
);
