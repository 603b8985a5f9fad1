//! Accord Types - Core types for partnership document tracking
//!
//! Accord follows partnership documents through a multi-stage approval
//! lifecycle. Every lifecycle change is recorded as a new row in an
//! append-only progress ledger; the document record only holds a pointer to
//! its latest row.
//!
//! ## Key Concepts
//!
//! - **Kind**: one of the five document categories (MOM, NDA, JIK, MSA, MOU)
//! - **Step / Status**: static catalogs for kinds and lifecycle labels
//! - **Action table**: pure lookup from `(kind, action, current status label)`
//!   to the next status ordinal
//! - **Progress**: one immutable ledger row per lifecycle state
//! - **Artifact**: the stored file attached to a progress row

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod action;
pub mod catalog;
pub mod error;
pub mod ids;
pub mod kind;
pub mod model;

pub use action::{Action, ActionTable, StatusOverride};
pub use catalog::{Status, StatusId, Step, StepId, STATUSES, STEPS};
pub use error::TypeError;
pub use ids::{ApproverId, ApproverLinkId, ArtifactId, CompanyId, DocumentId, ProgressId};
pub use kind::{ArtifactPolicy, Kind};
pub use model::{
    ApproverContact, ApproverLink, Artifact, Company, DocumentRecord, NewProgress, Progress,
};
