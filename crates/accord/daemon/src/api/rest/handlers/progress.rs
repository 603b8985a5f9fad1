//! Document transition handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use accord_engine::TransitionRequest;
use accord_storage::LedgerStore;
use accord_types::{Action, Artifact, CompanyId, DocumentId, Kind, Progress, ProgressId, StatusId};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transition request body
///
/// Every field is optional at the wire level so a missing one is reported as
/// a 400 rather than a deserialization failure.
#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub id: Option<Value>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub action: Option<String>,
    pub current_status: Option<String>,
    pub url: Option<String>,
}

/// The re-pointed document record
#[derive(Debug, Serialize)]
pub struct DocumentView {
    pub id: DocumentId,
    pub company_id: CompanyId,
    pub title: String,
    pub progress_id: ProgressId,
    pub status_id: Option<StatusId>,
    pub status: Option<&'static str>,
    pub artifact: Option<Artifact>,
}

/// Transition response body
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub message: String,
    pub id: DocumentId,
    #[serde(rename = "type")]
    pub kind: Kind,
    pub action: Action,
    pub document: DocumentView,
    pub progress_id: ProgressId,
    /// Approver emails accepted by the mail relay
    pub notified: usize,
    /// Post-commit notification problems
    pub warnings: Vec<String>,
}

fn parse_document_id(raw: Option<&Value>) -> ApiResult<DocumentId> {
    let id = match raw {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    match (raw, id) {
        (None | Some(Value::Null), _) => Err(ApiError::BadRequest("id is required".to_string())),
        (_, Some(id)) if id > 0 => Ok(DocumentId::new(id)),
        _ => Err(ApiError::BadRequest("id must be a positive integer".to_string())),
    }
}

impl ProgressRequest {
    fn validate(self) -> ApiResult<TransitionRequest> {
        let document_id = parse_document_id(self.id.as_ref())?;

        let kind: Kind = self
            .kind
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("type is required".to_string()))?
            .parse()
            .map_err(|e: accord_types::TypeError| ApiError::BadRequest(e.to_string()))?;

        let action = self
            .action
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("action is required".to_string()))?;

        Ok(TransitionRequest {
            document_id,
            kind,
            action,
            current_status: self.current_status,
            artifact_url: self.url,
        })
    }
}

/// Apply one action to one document, then notify approvers if the action
/// calls for it
pub async fn advance_progress(
    State(state): State<AppState>,
    payload: Result<Json<ProgressRequest>, JsonRejection>,
) -> ApiResult<Json<ProgressResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let request = request.validate()?;

    let outcome = state.engine.apply(request).await?;

    let (notified, warnings) = if outcome.notify_approvers {
        let report = state.dispatcher.dispatch(&outcome).await;
        (report.sent, report.warnings())
    } else {
        (0, Vec::new())
    };

    let status = outcome.progress.status_label();
    Ok(Json(ProgressResponse {
        message: format!(
            "{} {} moved to {}",
            outcome.kind,
            outcome.document_id.get(),
            status.unwrap_or("no status")
        ),
        id: outcome.document_id,
        kind: outcome.kind,
        action: outcome.action,
        progress_id: outcome.progress.id,
        document: DocumentView {
            id: outcome.document_id,
            company_id: outcome.progress.company_id,
            title: outcome.title,
            progress_id: outcome.progress.id,
            status_id: outcome.progress.status_id,
            status,
            artifact: outcome.artifact,
        },
        notified,
        warnings,
    }))
}

/// One ledger row with its resolved label
#[derive(Debug, Serialize)]
pub struct ProgressEntry {
    pub id: ProgressId,
    pub status_id: Option<StatusId>,
    pub status: Option<&'static str>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Progress> for ProgressEntry {
    fn from(row: Progress) -> Self {
        Self {
            id: row.id,
            status_id: row.status_id,
            status: row.status_label(),
            created_at: row.created_at,
        }
    }
}

/// Lifecycle history response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub id: DocumentId,
    #[serde(rename = "type")]
    pub kind: Kind,
    pub title: String,
    pub current: Option<ProgressEntry>,
    pub artifact: Option<Artifact>,
    /// Oldest first, ending at the current pointer
    pub history: Vec<ProgressEntry>,
}

/// Reconstruct a document's lifecycle from the progress ledger
pub async fn progress_history(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> ApiResult<Json<HistoryResponse>> {
    let kind: Kind = kind
        .parse()
        .map_err(|e: accord_types::TypeError| ApiError::BadRequest(e.to_string()))?;
    let adapter = state.engine.adapter(kind);
    let record = adapter
        .load(state.storage.as_ref(), DocumentId::new(id))
        .await?;

    let history: Vec<ProgressEntry> = state
        .storage
        .document_history(kind, record.id)
        .await?
        .into_iter()
        .map(ProgressEntry::from)
        .collect();
    let artifact = adapter
        .current_artifact(state.storage.as_ref(), &record)
        .await?;

    let current = match record.progress_id {
        Some(current) => state
            .storage
            .get_progress(current)
            .await?
            .map(ProgressEntry::from),
        None => None,
    };

    Ok(Json(HistoryResponse {
        id: record.id,
        kind,
        title: record.title,
        current,
        artifact,
        history,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_document_id() {
        assert_eq!(parse_document_id(Some(&json!(7))).unwrap(), DocumentId::new(7));
        assert_eq!(parse_document_id(Some(&json!(" 12 "))).unwrap(), DocumentId::new(12));
        assert!(matches!(parse_document_id(None), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_document_id(Some(&json!(null))), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_document_id(Some(&json!(-1))), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_document_id(Some(&json!("abc"))), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_validate_requires_action_and_type() {
        let request = ProgressRequest {
            id: Some(json!(1)),
            kind: Some("NDA".to_string()),
            action: Some("  ".to_string()),
            current_status: None,
            url: None,
        };
        assert!(matches!(request.validate(), Err(ApiError::BadRequest(_))));

        let request = ProgressRequest {
            id: Some(json!(1)),
            kind: Some("SOW".to_string()),
            action: Some("Approve".to_string()),
            current_status: None,
            url: None,
        };
        assert!(matches!(request.validate(), Err(ApiError::BadRequest(_))));
    }
}
