//! Persistent data model

use crate::catalog::{Status, StatusId, StepId};
use crate::ids::{ApproverId, ApproverLinkId, ArtifactId, CompanyId, DocumentId, ProgressId};
use crate::kind::Kind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity anchor for a partnership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Company {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// One immutable row of the progress ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub id: ProgressId,
    pub company_id: CompanyId,
    pub step_id: StepId,
    /// Empty right after a document is created
    pub status_id: Option<StatusId>,
    pub created_at: DateTime<Utc>,
}

impl Progress {
    pub fn status_label(&self) -> Option<&'static str> {
        self.status_id.and_then(Status::by_id).map(|s| s.label)
    }
}

/// Values for a progress row about to be appended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewProgress {
    pub company_id: CompanyId,
    pub step_id: StepId,
    pub status_id: Option<StatusId>,
}

/// A kind-specific document record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub kind: Kind,
    pub company_id: CompanyId,
    pub title: String,
    /// Latest ledger row for this document
    pub progress_id: Option<ProgressId>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DocumentRecord {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A stored file reference bound to exactly one progress row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub progress_id: ProgressId,
    pub document_url: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Join row binding one approver to one document
///
/// `verify_token` and `expires_at` are only set while a verification email
/// is outstanding. Consuming the token clears both in the same write that
/// sets `is_approved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverLink {
    pub id: ApproverLinkId,
    pub kind: Kind,
    pub document_id: DocumentId,
    pub approver_id: ApproverId,
    pub approver_type: String,
    #[serde(skip_serializing)]
    pub verify_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_approved: bool,
}

/// Everything needed to email one approver of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApproverContact {
    pub link_id: ApproverLinkId,
    pub approver_id: ApproverId,
    pub name: String,
    pub email: Option<String>,
}
