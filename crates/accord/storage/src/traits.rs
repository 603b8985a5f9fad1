//! Storage trait definitions

use crate::StorageResult;
use accord_types::{
    ApproverContact, ApproverLink, ApproverLinkId, Artifact, ArtifactId, Company, CompanyId,
    DocumentId, DocumentRecord, Kind, NewProgress, Progress, ProgressId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Combined storage trait
pub trait Storage: LedgerStore + ApproverStore + Send + Sync {
    /// Short backend name for health reporting
    fn backend_label(&self) -> &'static str;
}

/// Read access to the ledger plus the entry point for atomic transitions
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Get a company by ID, including soft-deleted ones
    async fn get_company(&self, id: CompanyId) -> StorageResult<Option<Company>>;

    /// Get a document record of the given kind, including soft-deleted ones
    async fn get_document(&self, kind: Kind, id: DocumentId)
        -> StorageResult<Option<DocumentRecord>>;

    /// Get one progress row
    async fn get_progress(&self, id: ProgressId) -> StorageResult<Option<Progress>>;

    /// Progress rows a document has pointed at, oldest first. The current
    /// pointer is always included.
    async fn document_history(
        &self,
        kind: Kind,
        document_id: DocumentId,
    ) -> StorageResult<Vec<Progress>>;

    /// The live artifact bound to a progress row, if any
    async fn artifact_for_progress(&self, progress_id: ProgressId)
        -> StorageResult<Option<Artifact>>;

    /// Open a unit of work for one transition
    async fn begin(&self) -> StorageResult<Box<dyn LedgerTransaction>>;
}

/// A unit of work spanning one transition
///
/// Nothing written through a transaction is visible to other readers until
/// [`LedgerTransaction::commit`] returns. Dropping the transaction rolls it
/// back.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Append a progress row
    async fn insert_progress(&mut self, row: NewProgress) -> StorageResult<Progress>;

    /// Re-point a document record at a progress row. The previous and the
    /// new row are both recorded in the document's history.
    async fn point_document(
        &mut self,
        kind: Kind,
        document_id: DocumentId,
        progress_id: ProgressId,
    ) -> StorageResult<()>;

    /// The live artifact bound to a progress row, as seen inside this unit
    async fn artifact_for_progress(&mut self, progress_id: ProgressId)
        -> StorageResult<Option<Artifact>>;

    /// Move an artifact to a new progress row, optionally replacing its URL
    async fn repoint_artifact(
        &mut self,
        artifact_id: ArtifactId,
        progress_id: ProgressId,
        document_url: Option<&str>,
    ) -> StorageResult<Artifact>;

    /// Create an artifact bound to a progress row
    async fn insert_artifact(
        &mut self,
        progress_id: ProgressId,
        document_url: &str,
    ) -> StorageResult<Artifact>;

    /// Make every staged write durable
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discard every staged write
    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}

/// Result of presenting a verification token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenConsumption {
    /// The token matched a live link; the link is now approved and the
    /// token cleared
    Approved(ApproverLinkId),
    /// The token matched a link whose expiry has passed; nothing changed
    Expired(ApproverLinkId),
    /// No link carries this token
    Unknown,
}

/// Storage for approver join rows and their verification tokens
#[async_trait]
pub trait ApproverStore: Send + Sync {
    /// Approvers attached to a document, in link order
    async fn list_approver_contacts(
        &self,
        kind: Kind,
        document_id: DocumentId,
    ) -> StorageResult<Vec<ApproverContact>>;

    /// Get a single join row
    async fn get_approver_link(&self, id: ApproverLinkId) -> StorageResult<Option<ApproverLink>>;

    /// Store a token on a join row, replacing any outstanding one
    async fn store_verify_token(
        &self,
        link_id: ApproverLinkId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Consume a token in one conditional write: a live match sets
    /// `is_approved` and clears token and expiry together.
    async fn consume_verify_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<TokenConsumption>;
}
