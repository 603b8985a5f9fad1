//! Action vocabulary and the per-kind action table
//!
//! Each kind maps an action to the next status ordinal through a base map.
//! A kind may override individual entries when the document currently sits
//! in a specific status. Both maps are static data: resolving a transition
//! is a pure lookup keyed by `(kind, action, current status label)` with no
//! state shared between requests.

use crate::catalog::StatusId;
use crate::error::TypeError;
use crate::kind::Kind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An approval action a client can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Submit,
    Approve,
    Circulate,
    Upload,
    Sign,
    Finish,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::Submit,
        Action::Approve,
        Action::Circulate,
        Action::Upload,
        Action::Sign,
        Action::Finish,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Submit => "Submit",
            Action::Approve => "Approve",
            Action::Circulate => "Circulate",
            Action::Upload => "Upload",
            Action::Sign => "Sign",
            Action::Finish => "Finish",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| TypeError::UnknownAction(s.to_string()))
    }
}

/// Conditional entry that replaces the base mapping for one action while
/// the document is in the named status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusOverride {
    pub action: Action,
    pub when_status: &'static str,
    pub next: StatusId,
}

/// Action table for a single kind
#[derive(Debug, Clone, Copy)]
pub struct ActionTable {
    pub kind: Kind,
    pub base: &'static [(Action, StatusId)],
    pub overrides: &'static [StatusOverride],
    /// Actions that require every approver of the document to be asked
    pub notify_on: &'static [Action],
}

const UPLOADED_BASE: &[(Action, StatusId)] = &[
    (Action::Submit, StatusId(1)),
    (Action::Approve, StatusId(2)),
    (Action::Circulate, StatusId(3)),
    (Action::Upload, StatusId(4)),
    (Action::Sign, StatusId(5)),
];

const GENERATED_BASE: &[(Action, StatusId)] = &[
    (Action::Submit, StatusId(1)),
    (Action::Approve, StatusId(2)),
    (Action::Sign, StatusId(4)),
    (Action::Finish, StatusId(5)),
];

const LEGAL_APPROVAL_SKIPS_REVIEW: &[StatusOverride] = &[StatusOverride {
    action: Action::Approve,
    when_status: "Review Legal Tsat",
    next: StatusId(3),
}];

static TABLES: [ActionTable; 5] = [
    ActionTable {
        kind: Kind::Mom,
        base: GENERATED_BASE,
        overrides: &[],
        notify_on: &[Action::Approve],
    },
    ActionTable {
        kind: Kind::Nda,
        base: UPLOADED_BASE,
        overrides: LEGAL_APPROVAL_SKIPS_REVIEW,
        notify_on: &[],
    },
    ActionTable {
        kind: Kind::Jik,
        base: GENERATED_BASE,
        overrides: LEGAL_APPROVAL_SKIPS_REVIEW,
        notify_on: &[Action::Approve],
    },
    ActionTable {
        kind: Kind::Msa,
        base: UPLOADED_BASE,
        overrides: LEGAL_APPROVAL_SKIPS_REVIEW,
        notify_on: &[],
    },
    ActionTable {
        kind: Kind::Mou,
        base: UPLOADED_BASE,
        overrides: LEGAL_APPROVAL_SKIPS_REVIEW,
        notify_on: &[],
    },
];

impl ActionTable {
    /// Table for a kind
    pub fn for_kind(kind: Kind) -> &'static ActionTable {
        match kind {
            Kind::Mom => &TABLES[0],
            Kind::Nda => &TABLES[1],
            Kind::Jik => &TABLES[2],
            Kind::Msa => &TABLES[3],
            Kind::Mou => &TABLES[4],
        }
    }

    /// Resolve the next status for `action` given the document's current
    /// status label. Overrides win over the base map; an action absent from
    /// both is `InvalidAction`.
    pub fn resolve(&self, action: &str, current_status: Option<&str>) -> Result<StatusId, TypeError> {
        let invalid = || TypeError::InvalidAction {
            kind: self.kind,
            action: action.trim().to_string(),
            status: current_status.map(|s| s.trim().to_string()),
        };

        let action: Action = action.parse().map_err(|_| invalid())?;
        let current = current_status.map(str::trim);

        if let Some(hit) = self
            .overrides
            .iter()
            .find(|o| o.action == action && Some(o.when_status) == current)
        {
            return Ok(hit.next);
        }

        self.base
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, next)| *next)
            .ok_or_else(invalid)
    }

    pub fn requires_notification(&self, action: Action) -> bool {
        self.notify_on.contains(&action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Status;
    use proptest::prelude::*;

    #[test]
    fn test_nda_legal_override() {
        let table = ActionTable::for_kind(Kind::Nda);
        assert_eq!(
            table.resolve("Approve", Some("Review Legal Tsat")).unwrap(),
            StatusId(3)
        );
        assert_eq!(table.resolve("Approve", Some("Review Partner")).unwrap(), StatusId(2));
        assert_eq!(table.resolve("Approve", None).unwrap(), StatusId(2));
    }

    #[test]
    fn test_mom_has_no_override() {
        let table = ActionTable::for_kind(Kind::Mom);
        assert_eq!(
            table.resolve("Approve", Some("Review Legal Tsat")).unwrap(),
            StatusId(2)
        );
    }

    #[test]
    fn test_unmapped_action_is_invalid() {
        let jik = ActionTable::for_kind(Kind::Jik);
        assert!(matches!(
            jik.resolve("Reject", Some("Review Partner")),
            Err(TypeError::InvalidAction { kind: Kind::Jik, .. })
        ));
        // Known vocabulary but not part of this kind's map
        assert!(jik.resolve("Upload", None).is_err());
        assert!(jik.resolve("approve", None).is_err());
    }

    #[test]
    fn test_every_target_exists_in_catalog() {
        for kind in Kind::ALL {
            let table = ActionTable::for_kind(kind);
            assert_eq!(table.kind, kind);
            for (_, next) in table.base {
                assert!(Status::by_id(*next).is_some());
            }
            for o in table.overrides {
                assert!(Status::by_id(o.next).is_some());
                assert!(Status::by_label(o.when_status).is_some());
            }
        }
    }

    #[test]
    fn test_notification_gate() {
        assert!(ActionTable::for_kind(Kind::Mom).requires_notification(Action::Approve));
        assert!(ActionTable::for_kind(Kind::Jik).requires_notification(Action::Approve));
        assert!(!ActionTable::for_kind(Kind::Nda).requires_notification(Action::Approve));
        assert!(!ActionTable::for_kind(Kind::Mom).requires_notification(Action::Sign));
    }

    proptest! {
        #[test]
        fn resolve_is_total_and_deterministic(
            kind_idx in 0usize..5,
            action in "[A-Za-z ]{0,12}",
            status in proptest::option::of("[A-Za-z ]{0,20}"),
        ) {
            let table = ActionTable::for_kind(Kind::ALL[kind_idx]);
            let first = table.resolve(&action, status.as_deref());
            let second = table.resolve(&action, status.as_deref());
            prop_assert_eq!(first.is_ok(), second.is_ok());
            if let (Ok(a), Ok(b)) = (first, second) {
                prop_assert_eq!(a, b);
                prop_assert!(Status::by_id(a).is_some());
            }
        }
    }
}
