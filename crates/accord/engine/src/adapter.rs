//! Kind adapters
//!
//! One adapter per document kind, all behind [`KindAdapter`]. An adapter
//! knows which table owns the kind's records, how actions map to statuses,
//! and how the kind's artifact is located or produced. Kind-specific
//! branching lives in the kind's [`ActionTable`], not here.

use crate::error::{EngineError, EngineResult};
use crate::gateway::DocumentGenerator;
use accord_storage::{LedgerTransaction, Storage};
use accord_types::{
    Action, ActionTable, Artifact, ArtifactPolicy, DocumentId, DocumentRecord, Kind, ProgressId,
    StatusId,
};
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait KindAdapter: Send + Sync {
    fn kind(&self) -> Kind;

    fn artifact_policy(&self) -> ArtifactPolicy;

    /// Next status for `action` given the document's current status label
    fn resolve(&self, action: &str, current_status: Option<&str>) -> EngineResult<StatusId>;

    /// Whether `action` asks every approver of the document to confirm
    fn requires_notification(&self, action: Action) -> bool;

    /// Load a live record of this kind
    async fn load(&self, storage: &dyn Storage, document_id: DocumentId)
        -> EngineResult<DocumentRecord>;

    /// Re-point the record at a progress row inside an open transaction
    async fn point_to_progress(
        &self,
        tx: &mut dyn LedgerTransaction,
        document_id: DocumentId,
        progress_id: ProgressId,
    ) -> EngineResult<()>;

    /// The artifact attached to the record's current progress row
    async fn current_artifact(
        &self,
        storage: &dyn Storage,
        record: &DocumentRecord,
    ) -> EngineResult<Option<Artifact>>;

    /// Render the record through the external generator
    async fn generate_artifact(
        &self,
        generator: &dyn DocumentGenerator,
        record: &DocumentRecord,
    ) -> EngineResult<Bytes>;

    /// File name used when a rendered artifact is stored
    fn artifact_filename(&self, document_id: DocumentId) -> String {
        format!("{}-{}.docx", self.kind().as_str().to_lowercase(), document_id.get())
    }
}

/// Table-driven adapter shared by all five kinds
#[derive(Debug, Clone, Copy)]
pub struct DocumentKindAdapter {
    table: &'static ActionTable,
}

impl DocumentKindAdapter {
    pub fn new(kind: Kind) -> Self {
        Self {
            table: ActionTable::for_kind(kind),
        }
    }
}

#[async_trait]
impl KindAdapter for DocumentKindAdapter {
    fn kind(&self) -> Kind {
        self.table.kind
    }

    fn artifact_policy(&self) -> ArtifactPolicy {
        self.table.kind.artifact_policy()
    }

    fn resolve(&self, action: &str, current_status: Option<&str>) -> EngineResult<StatusId> {
        Ok(self.table.resolve(action, current_status)?)
    }

    fn requires_notification(&self, action: Action) -> bool {
        self.table.requires_notification(action)
    }

    async fn load(
        &self,
        storage: &dyn Storage,
        document_id: DocumentId,
    ) -> EngineResult<DocumentRecord> {
        storage
            .get_document(self.kind(), document_id)
            .await?
            .filter(|record| !record.is_deleted())
            .ok_or_else(|| EngineError::NotFound(format!("{} {}", self.kind(), document_id)))
    }

    async fn point_to_progress(
        &self,
        tx: &mut dyn LedgerTransaction,
        document_id: DocumentId,
        progress_id: ProgressId,
    ) -> EngineResult<()> {
        tx.point_document(self.kind(), document_id, progress_id)
            .await
            .map_err(EngineError::from)
    }

    async fn current_artifact(
        &self,
        storage: &dyn Storage,
        record: &DocumentRecord,
    ) -> EngineResult<Option<Artifact>> {
        match record.progress_id {
            Some(progress_id) => Ok(storage.artifact_for_progress(progress_id).await?),
            None => Ok(None),
        }
    }

    async fn generate_artifact(
        &self,
        generator: &dyn DocumentGenerator,
        record: &DocumentRecord,
    ) -> EngineResult<Bytes> {
        Ok(generator.generate(self.kind(), record.id, &record.title).await?)
    }
}

/// Adapter lookup by kind
pub struct AdapterRegistry {
    adapters: [DocumentKindAdapter; 5],
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self {
            adapters: Kind::ALL.map(DocumentKindAdapter::new),
        }
    }
}

impl AdapterRegistry {
    pub fn get(&self, kind: Kind) -> &dyn KindAdapter {
        // ALL is ordered by step ordinal
        &self.adapters[(kind.step().0 - 1) as usize]
    }
}
