//! Transition engine
//!
//! Applies one client action to one document:
//! 1. resolve the next status through the kind's adapter (fail fast)
//! 2. load the live document record and its company
//! 3. inside one transaction: append a progress row, re-point the record,
//!    carry or create the artifact for the new row
//! 4. commit, or roll everything back on the first failure
//!
//! Approver notification is the caller's business and only happens after
//! `apply` has returned, i.e. after commit.

use crate::adapter::{AdapterRegistry, KindAdapter};
use crate::error::{EngineError, EngineResult};
use crate::gateway::{DocumentGenerator, ObjectStore, DOCX_CONTENT_TYPE};
use accord_storage::{LedgerTransaction, Storage};
use accord_types::{
    Action, Artifact, ArtifactPolicy, DocumentId, DocumentRecord, Kind, NewProgress, Progress,
    ProgressId, StatusId,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Engine tunables
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound for the whole transactional part of a transition
    pub transaction_timeout: Duration,
    /// Upper bound for each generator or upload call
    pub gateway_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transaction_timeout: Duration::from_secs(30),
            gateway_timeout: Duration::from_secs(20),
        }
    }
}

/// A client's request to advance a document
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub document_id: DocumentId,
    pub kind: Kind,
    pub action: String,
    pub current_status: Option<String>,
    /// Replacement artifact URL for kinds with uploaded artifacts
    pub artifact_url: Option<String>,
}

/// A committed transition
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub kind: Kind,
    pub document_id: DocumentId,
    pub title: String,
    pub action: Action,
    pub previous_progress_id: Option<ProgressId>,
    pub progress: Progress,
    pub artifact: Option<Artifact>,
    /// Whether the caller should now ask the document's approvers
    pub notify_approvers: bool,
}

/// Orchestrates transitions across kinds
pub struct TransitionEngine {
    storage: Arc<dyn Storage>,
    generator: Arc<dyn DocumentGenerator>,
    objects: Arc<dyn ObjectStore>,
    adapters: AdapterRegistry,
    config: EngineConfig,
}

async fn bounded<T, F>(limit: Duration, what: &str, fut: F) -> EngineResult<T>
where
    F: Future<Output = EngineResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| EngineError::Timeout(what.to_string()))?
}

impl TransitionEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        generator: Arc<dyn DocumentGenerator>,
        objects: Arc<dyn ObjectStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            generator,
            objects,
            adapters: AdapterRegistry::default(),
            config,
        }
    }

    pub fn adapter(&self, kind: Kind) -> &dyn KindAdapter {
        self.adapters.get(kind)
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Apply one action. On error nothing has been written.
    pub async fn apply(&self, request: TransitionRequest) -> EngineResult<TransitionOutcome> {
        let adapter = self.adapters.get(request.kind);
        let next_status = adapter.resolve(&request.action, request.current_status.as_deref())?;
        let action: Action = request.action.parse()?;

        let record = adapter.load(self.storage.as_ref(), request.document_id).await?;
        let company = self
            .storage
            .get_company(record.company_id)
            .await?
            .filter(|c| !c.is_deleted())
            .ok_or_else(|| EngineError::NotFound(record.company_id.to_string()))?;

        let artifact_url = request
            .artifact_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty());

        let (progress, artifact) = bounded(
            self.config.transaction_timeout,
            "transition transaction",
            self.run_transaction(adapter, &record, next_status, artifact_url),
        )
        .await?;

        tracing::info!(
            kind = %record.kind,
            document_id = %record.id,
            company_id = %company.id,
            action = %action,
            previous = ?record.progress_id,
            progress_id = %progress.id,
            status = ?progress.status_label(),
            "Transition committed"
        );

        Ok(TransitionOutcome {
            kind: record.kind,
            document_id: record.id,
            title: record.title,
            action,
            previous_progress_id: record.progress_id,
            progress,
            artifact,
            notify_approvers: adapter.requires_notification(action),
        })
    }

    async fn run_transaction(
        &self,
        adapter: &dyn KindAdapter,
        record: &DocumentRecord,
        next_status: StatusId,
        artifact_url: Option<&str>,
    ) -> EngineResult<(Progress, Option<Artifact>)> {
        let mut tx = self.storage.begin().await?;

        let staged = self
            .stage(tx.as_mut(), adapter, record, next_status, artifact_url)
            .await;
        let (progress, artifact) = match staged {
            Ok(staged) => staged,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(
                        kind = %record.kind,
                        document_id = %record.id,
                        error = %rollback,
                        "Rollback failed"
                    );
                }
                return Err(e);
            }
        };

        tx.commit()
            .await
            .map_err(|e| EngineError::Transition(e.to_string()))?;
        Ok((progress, artifact))
    }

    async fn stage(
        &self,
        tx: &mut dyn LedgerTransaction,
        adapter: &dyn KindAdapter,
        record: &DocumentRecord,
        next_status: StatusId,
        artifact_url: Option<&str>,
    ) -> EngineResult<(Progress, Option<Artifact>)> {
        let progress = tx
            .insert_progress(NewProgress {
                company_id: record.company_id,
                step_id: adapter.kind().step(),
                status_id: Some(next_status),
            })
            .await?;
        adapter
            .point_to_progress(tx, record.id, progress.id)
            .await?;

        let artifact = match adapter.artifact_policy() {
            ArtifactPolicy::Uploaded => {
                self.carry_uploaded(tx, record, progress.id, artifact_url)
                    .await?
            }
            ArtifactPolicy::Generated => {
                if artifact_url.is_some() {
                    tracing::debug!(
                        kind = %record.kind,
                        document_id = %record.id,
                        "Ignoring artifact url for generated kind"
                    );
                }
                Some(
                    self.carry_generated(tx, adapter, record, progress.id)
                        .await?,
                )
            }
        };
        Ok((progress, artifact))
    }

    /// Uploaded kinds keep their artifact on a separate entity: move it to the
    /// new row, swapping the URL when a new upload was supplied.
    async fn carry_uploaded(
        &self,
        tx: &mut dyn LedgerTransaction,
        record: &DocumentRecord,
        progress_id: ProgressId,
        artifact_url: Option<&str>,
    ) -> EngineResult<Option<Artifact>> {
        let existing = match record.progress_id {
            Some(previous) => tx.artifact_for_progress(previous).await?,
            None => None,
        };

        let artifact = match (existing, artifact_url) {
            (Some(current), url) => Some(tx.repoint_artifact(current.id, progress_id, url).await?),
            (None, Some(url)) => Some(tx.insert_artifact(progress_id, url).await?),
            (None, None) => None,
        };
        Ok(artifact)
    }

    /// Generated kinds reuse the previous row's artifact or render a new one.
    async fn carry_generated(
        &self,
        tx: &mut dyn LedgerTransaction,
        adapter: &dyn KindAdapter,
        record: &DocumentRecord,
        progress_id: ProgressId,
    ) -> EngineResult<Artifact> {
        if let Some(previous) = record.progress_id {
            if let Some(current) = tx.artifact_for_progress(previous).await? {
                return Ok(tx.repoint_artifact(current.id, progress_id, None).await?);
            }
        }

        let limit = self.config.gateway_timeout;
        let content = bounded(
            limit,
            "document generation",
            adapter.generate_artifact(self.generator.as_ref(), record),
        )
        .await?;

        let filename = adapter.artifact_filename(record.id);
        let url = bounded(limit, "artifact upload", async {
            self.objects
                .upload(&filename, DOCX_CONTENT_TYPE, content)
                .await
                .map_err(EngineError::from)
        })
        .await?;

        tracing::debug!(
            kind = %record.kind,
            document_id = %record.id,
            url = %url,
            "Stored generated artifact"
        );
        Ok(tx.insert_artifact(progress_id, &url).await?)
    }
}
