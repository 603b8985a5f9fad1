//! In-memory storage implementation
//!
//! All tables live behind one mutex. A transaction holds the lock for its
//! whole lifetime and writes to a staged copy that replaces the live state
//! on commit, so a dropped transaction leaves no trace.

use crate::traits::*;
use crate::{StorageError, StorageResult};
use accord_types::{
    ApproverContact, ApproverId, ApproverLink, ApproverLinkId, Artifact, ArtifactId, Company,
    CompanyId, DocumentId, DocumentRecord, Kind, NewProgress, Progress, ProgressId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone)]
struct ApproverEntry {
    name: String,
    email: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    companies: BTreeMap<CompanyId, Company>,
    documents: HashMap<(Kind, DocumentId), DocumentRecord>,
    progress: BTreeMap<ProgressId, Progress>,
    document_progress: HashMap<(Kind, DocumentId), BTreeSet<ProgressId>>,
    artifacts: BTreeMap<ArtifactId, Artifact>,
    approvers: HashMap<ApproverId, ApproverEntry>,
    links: BTreeMap<ApproverLinkId, ApproverLink>,
    sequence: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }

    fn append_progress(&mut self, row: NewProgress) -> Progress {
        let progress = Progress {
            id: ProgressId(self.next_id()),
            company_id: row.company_id,
            step_id: row.step_id,
            status_id: row.status_id,
            created_at: Utc::now(),
        };
        self.progress.insert(progress.id, progress.clone());
        progress
    }

    fn live_artifact(&self, progress_id: ProgressId) -> Option<Artifact> {
        self.artifacts
            .values()
            .find(|a| a.progress_id == progress_id && a.deleted_at.is_none())
            .cloned()
    }
}

/// In-memory storage for development and testing
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    // Reference data is maintained outside the transition core; these
    // helpers stand in for it when running in memory.

    pub async fn create_company(&self, name: &str) -> Company {
        let mut state = self.state.lock().await;
        let company = Company {
            id: CompanyId(state.next_id()),
            name: name.to_string(),
            deleted_at: None,
        };
        state.companies.insert(company.id, company.clone());
        company
    }

    /// Create a document record together with its initial, status-less
    /// progress row
    pub async fn create_document(
        &self,
        kind: Kind,
        company_id: CompanyId,
        title: &str,
    ) -> DocumentRecord {
        let mut state = self.state.lock().await;
        let progress = state.append_progress(NewProgress {
            company_id,
            step_id: kind.step(),
            status_id: None,
        });
        let record = DocumentRecord {
            id: DocumentId(state.next_id()),
            kind,
            company_id,
            title: title.to_string(),
            progress_id: Some(progress.id),
            deleted_at: None,
        };
        state.documents.insert((kind, record.id), record.clone());
        record
    }

    pub async fn attach_artifact(&self, progress_id: ProgressId, document_url: &str) -> Artifact {
        let mut state = self.state.lock().await;
        let artifact = Artifact {
            id: ArtifactId(state.next_id()),
            progress_id,
            document_url: document_url.to_string(),
            deleted_at: None,
        };
        state.artifacts.insert(artifact.id, artifact.clone());
        artifact
    }

    pub async fn create_approver(&self, name: &str, email: Option<&str>) -> ApproverId {
        let mut state = self.state.lock().await;
        let id = ApproverId(state.next_id());
        state.approvers.insert(
            id,
            ApproverEntry {
                name: name.to_string(),
                email: email.map(str::to_string),
            },
        );
        id
    }

    pub async fn link_approver(
        &self,
        kind: Kind,
        document_id: DocumentId,
        approver_id: ApproverId,
        approver_type: &str,
    ) -> ApproverLinkId {
        let mut state = self.state.lock().await;
        let link = ApproverLink {
            id: ApproverLinkId(state.next_id()),
            kind,
            document_id,
            approver_id,
            approver_type: approver_type.to_string(),
            verify_token: None,
            expires_at: None,
            is_approved: false,
        };
        let id = link.id;
        state.links.insert(id, link);
        id
    }

    pub async fn soft_delete_document(&self, kind: Kind, document_id: DocumentId) -> bool {
        let mut state = self.state.lock().await;
        match state.documents.get_mut(&(kind, document_id)) {
            Some(record) => {
                record.deleted_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    pub async fn soft_delete_company(&self, company_id: CompanyId) -> bool {
        let mut state = self.state.lock().await;
        match state.companies.get_mut(&company_id) {
            Some(company) => {
                company.deleted_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Every ledger row, oldest first
    pub async fn progress_rows(&self) -> Vec<Progress> {
        let state = self.state.lock().await;
        state.progress.values().cloned().collect()
    }

    /// Every artifact row, including soft-deleted ones
    pub async fn artifacts(&self) -> Vec<Artifact> {
        let state = self.state.lock().await;
        state.artifacts.values().cloned().collect()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStorage {
    async fn get_company(&self, id: CompanyId) -> StorageResult<Option<Company>> {
        let state = self.state.lock().await;
        Ok(state.companies.get(&id).cloned())
    }

    async fn get_document(
        &self,
        kind: Kind,
        id: DocumentId,
    ) -> StorageResult<Option<DocumentRecord>> {
        let state = self.state.lock().await;
        Ok(state.documents.get(&(kind, id)).cloned())
    }

    async fn get_progress(&self, id: ProgressId) -> StorageResult<Option<Progress>> {
        let state = self.state.lock().await;
        Ok(state.progress.get(&id).cloned())
    }

    async fn document_history(
        &self,
        kind: Kind,
        document_id: DocumentId,
    ) -> StorageResult<Vec<Progress>> {
        let state = self.state.lock().await;
        let mut ids = state
            .document_progress
            .get(&(kind, document_id))
            .cloned()
            .unwrap_or_default();
        if let Some(current) = state
            .documents
            .get(&(kind, document_id))
            .and_then(|r| r.progress_id)
        {
            ids.insert(current);
        }
        Ok(ids
            .iter()
            .filter_map(|id| state.progress.get(id))
            .cloned()
            .collect())
    }

    async fn artifact_for_progress(
        &self,
        progress_id: ProgressId,
    ) -> StorageResult<Option<Artifact>> {
        let state = self.state.lock().await;
        Ok(state.live_artifact(progress_id))
    }

    async fn begin(&self) -> StorageResult<Box<dyn LedgerTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryLedgerTransaction { guard, staged }))
    }
}

/// Transaction over the in-memory state
pub struct MemoryLedgerTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl LedgerTransaction for MemoryLedgerTransaction {
    async fn insert_progress(&mut self, row: NewProgress) -> StorageResult<Progress> {
        if !self.staged.companies.contains_key(&row.company_id) {
            return Err(StorageError::InvalidData(format!(
                "progress references unknown {}",
                row.company_id
            )));
        }
        Ok(self.staged.append_progress(row))
    }

    async fn point_document(
        &mut self,
        kind: Kind,
        document_id: DocumentId,
        progress_id: ProgressId,
    ) -> StorageResult<()> {
        let record = self
            .staged
            .documents
            .get_mut(&(kind, document_id))
            .ok_or_else(|| StorageError::NotFound(format!("{} {}", kind, document_id)))?;
        let previous = record.progress_id.replace(progress_id);
        let history = self
            .staged
            .document_progress
            .entry((kind, document_id))
            .or_default();
        history.extend(previous);
        history.insert(progress_id);
        Ok(())
    }

    async fn artifact_for_progress(
        &mut self,
        progress_id: ProgressId,
    ) -> StorageResult<Option<Artifact>> {
        Ok(self.staged.live_artifact(progress_id))
    }

    async fn repoint_artifact(
        &mut self,
        artifact_id: ArtifactId,
        progress_id: ProgressId,
        document_url: Option<&str>,
    ) -> StorageResult<Artifact> {
        let artifact = self
            .staged
            .artifacts
            .get_mut(&artifact_id)
            .ok_or_else(|| StorageError::NotFound(artifact_id.to_string()))?;
        artifact.progress_id = progress_id;
        if let Some(url) = document_url {
            artifact.document_url = url.to_string();
        }
        Ok(artifact.clone())
    }

    async fn insert_artifact(
        &mut self,
        progress_id: ProgressId,
        document_url: &str,
    ) -> StorageResult<Artifact> {
        let artifact = Artifact {
            id: ArtifactId(self.staged.next_id()),
            progress_id,
            document_url: document_url.to_string(),
            deleted_at: None,
        };
        self.staged.artifacts.insert(artifact.id, artifact.clone());
        Ok(artifact)
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let MemoryLedgerTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ApproverStore for InMemoryStorage {
    async fn list_approver_contacts(
        &self,
        kind: Kind,
        document_id: DocumentId,
    ) -> StorageResult<Vec<ApproverContact>> {
        let state = self.state.lock().await;
        Ok(state
            .links
            .values()
            .filter(|l| l.kind == kind && l.document_id == document_id)
            .map(|l| {
                let approver = state.approvers.get(&l.approver_id);
                ApproverContact {
                    link_id: l.id,
                    approver_id: l.approver_id,
                    name: approver.map(|a| a.name.clone()).unwrap_or_default(),
                    email: approver.and_then(|a| a.email.clone()),
                }
            })
            .collect())
    }

    async fn get_approver_link(&self, id: ApproverLinkId) -> StorageResult<Option<ApproverLink>> {
        let state = self.state.lock().await;
        Ok(state.links.get(&id).cloned())
    }

    async fn store_verify_token(
        &self,
        link_id: ApproverLinkId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let mut state = self.state.lock().await;
        if state
            .links
            .values()
            .any(|l| l.id != link_id && l.verify_token.as_deref() == Some(token))
        {
            return Err(StorageError::Conflict("verification token collision".to_string()));
        }
        let link = state
            .links
            .get_mut(&link_id)
            .ok_or_else(|| StorageError::NotFound(link_id.to_string()))?;
        link.verify_token = Some(token.to_string());
        link.expires_at = Some(expires_at);
        Ok(())
    }

    async fn consume_verify_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<TokenConsumption> {
        let mut state = self.state.lock().await;
        let Some(link) = state
            .links
            .values_mut()
            .find(|l| l.verify_token.as_deref() == Some(token))
        else {
            return Ok(TokenConsumption::Unknown);
        };

        if link.expires_at.is_some_and(|expires_at| now > expires_at) {
            return Ok(TokenConsumption::Expired(link.id));
        }

        link.is_approved = true;
        link.verify_token = None;
        link.expires_at = None;
        Ok(TokenConsumption::Approved(link.id))
    }
}

impl Storage for InMemoryStorage {
    fn backend_label(&self) -> &'static str {
        "memory"
    }
}
