//! REST API tests against the in-memory backend

use accord_daemon::api::create_router;
use accord_daemon::{AppState, Collaborators, DaemonConfig};
use accord_engine::{DocumentGenerator, GatewayError, MailMessage, Notifier, ObjectStore};
use accord_storage::{
    ApproverStore, InMemoryStorage, LedgerStore, LedgerTransaction, Storage, StorageResult,
    TokenConsumption,
};
use accord_types::{
    ApproverContact, ApproverLink, ApproverLinkId, Artifact, Company, CompanyId, DocumentId,
    DocumentRecord, Kind, Progress, ProgressId,
};
use chrono::{DateTime, Utc};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

struct StubGenerator {
    fail: bool,
}

#[async_trait]
impl DocumentGenerator for StubGenerator {
    async fn generate(
        &self,
        _kind: Kind,
        document_id: DocumentId,
        _title: &str,
    ) -> Result<Bytes, GatewayError> {
        if self.fail {
            return Err(GatewayError::Status {
                service: "generator",
                status: 500,
            });
        }
        Ok(Bytes::from(format!("docx-{}", document_id.get())))
    }
}

struct StubObjectStore;

#[async_trait]
impl ObjectStore for StubObjectStore {
    async fn upload(
        &self,
        filename: &str,
        _content_type: &str,
        _content: Bytes,
    ) -> Result<String, GatewayError> {
        Ok(format!("https://files.test/{}", filename))
    }

    async fn download(&self, _url: &str) -> Result<Bytes, GatewayError> {
        Ok(Bytes::from_static(b"docx"))
    }
}

#[derive(Default)]
struct FlakyNotifier {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for FlakyNotifier {
    async fn send(&self, message: MailMessage) -> Result<(), GatewayError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.to);
        if sent.len() == 2 {
            return Err(GatewayError::Mail("relay refused".to_string()));
        }
        Ok(())
    }
}

/// In-memory storage whose token consumption never answers
struct StalledTokenStorage {
    inner: InMemoryStorage,
}

#[async_trait]
impl LedgerStore for StalledTokenStorage {
    async fn get_company(&self, id: CompanyId) -> StorageResult<Option<Company>> {
        self.inner.get_company(id).await
    }

    async fn get_document(
        &self,
        kind: Kind,
        id: DocumentId,
    ) -> StorageResult<Option<DocumentRecord>> {
        self.inner.get_document(kind, id).await
    }

    async fn get_progress(&self, id: ProgressId) -> StorageResult<Option<Progress>> {
        self.inner.get_progress(id).await
    }

    async fn document_history(
        &self,
        kind: Kind,
        document_id: DocumentId,
    ) -> StorageResult<Vec<Progress>> {
        self.inner.document_history(kind, document_id).await
    }

    async fn artifact_for_progress(
        &self,
        progress_id: ProgressId,
    ) -> StorageResult<Option<Artifact>> {
        LedgerStore::artifact_for_progress(&self.inner, progress_id).await
    }

    async fn begin(&self) -> StorageResult<Box<dyn LedgerTransaction>> {
        self.inner.begin().await
    }
}

#[async_trait]
impl ApproverStore for StalledTokenStorage {
    async fn list_approver_contacts(
        &self,
        kind: Kind,
        document_id: DocumentId,
    ) -> StorageResult<Vec<ApproverContact>> {
        self.inner.list_approver_contacts(kind, document_id).await
    }

    async fn get_approver_link(&self, id: ApproverLinkId) -> StorageResult<Option<ApproverLink>> {
        self.inner.get_approver_link(id).await
    }

    async fn store_verify_token(
        &self,
        link_id: ApproverLinkId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.inner.store_verify_token(link_id, token, expires_at).await
    }

    async fn consume_verify_token(
        &self,
        _token: &str,
        _now: DateTime<Utc>,
    ) -> StorageResult<TokenConsumption> {
        std::future::pending().await
    }
}

impl Storage for StalledTokenStorage {
    fn backend_label(&self) -> &'static str {
        "stalled"
    }
}

struct TestApp {
    storage: Arc<InMemoryStorage>,
    notifier: Arc<FlakyNotifier>,
    state: AppState,
    router: Router,
}

fn app_with(generator_fails: bool) -> TestApp {
    let storage = Arc::new(InMemoryStorage::new());
    let notifier = Arc::new(FlakyNotifier::default());
    let config = DaemonConfig::default();
    let state = AppState::new(
        storage.clone(),
        Collaborators {
            generator: Arc::new(StubGenerator {
                fail: generator_fails,
            }),
            objects: Arc::new(StubObjectStore),
            notifier: notifier.clone(),
        },
        &config,
    );
    let router = create_router(state.clone(), &config.server);
    TestApp {
        storage,
        notifier,
        state,
        router,
    }
}

fn app() -> TestApp {
    app_with(false)
}

impl TestApp {
    async fn document(&self, kind: Kind, title: &str) -> DocumentRecord {
        let company = self.storage.create_company("Acme Partners").await;
        self.storage.create_document(kind, company.id, title).await
    }

    async fn post_progress(&self, body: Value) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/progress")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn get(&self, uri: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

#[tokio::test]
async fn test_progress_applies_override() {
    let app = app();
    let record = app.document(Kind::Nda, "Mutual NDA").await;

    let (status, body) = app
        .post_progress(json!({
            "id": record.id.get(),
            "type": "NDA",
            "action": "Approve",
            "current_status": "Review Legal Tsat"
        }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "NDA");
    assert_eq!(body["action"], "Approve");
    assert_eq!(body["document"]["status_id"], 3);
    assert_eq!(body["document"]["status"], "Circulation");
    assert_eq!(body["notified"], 0);
    assert_eq!(app.storage.progress_rows().await.len(), 2);
}

#[tokio::test]
async fn test_progress_validation_errors() {
    let app = app();
    let record = app.document(Kind::Jik, "Joint implementation").await;

    let (status, body) = app
        .post_progress(json!({"type": "JIK", "action": "Approve"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, _) = app
        .post_progress(json!({"id": record.id.get(), "type": "JIK"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_progress(json!({"id": record.id.get(), "type": "SOW", "action": "Approve"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_progress(json!({
            "id": record.id.get(),
            "type": "JIK",
            "action": "Reject",
            "current_status": "Review Partner"
        }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/progress")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing was written
    assert_eq!(app.storage.progress_rows().await.len(), 1);
}

#[tokio::test]
async fn test_progress_unknown_document() {
    let app = app();
    let (status, body) = app
        .post_progress(json!({"id": 404, "type": "MOU", "action": "Submit"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_generator_failure_is_internal_error() {
    let app = app_with(true);
    let record = app.document(Kind::Mom, "Kickoff minutes").await;

    let (status, _) = app
        .post_progress(json!({"id": record.id.get(), "type": "MOM", "action": "Approve"}))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.storage.progress_rows().await.len(), 1);
}

#[tokio::test]
async fn test_failed_email_is_a_warning() {
    let app = app();
    let record = app.document(Kind::Mom, "Kickoff minutes").await;
    for (name, email) in [("Rina", "rina@partner.test"), ("Tomas", "tomas@partner.test")] {
        let approver = app.storage.create_approver(name, Some(email)).await;
        app.storage
            .link_approver(Kind::Mom, record.id, approver, "partner")
            .await;
    }

    let (status, body) = app
        .post_progress(json!({
            "id": record.id.get().to_string(),
            "type": "mom",
            "action": "Approve",
            "current_status": "Review Partner"
        }))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notified"], 1);
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
    assert_eq!(
        body["document"]["artifact"]["document_url"],
        format!("https://files.test/mom-{}.docx", record.id.get())
    );
    assert_eq!(app.notifier.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_verify_redirects() {
    let app = app();
    let config = DaemonConfig::default().verification;
    let record = app.document(Kind::Jik, "Joint implementation").await;
    let approver = app.storage.create_approver("Rina", Some("rina@partner.test")).await;
    let link = app
        .storage
        .link_approver(Kind::Jik, record.id, approver, "partner")
        .await;

    let token = app.state.verifier.issue(link).await.unwrap();

    let response = app.get(&format!("/verify/{}", token)).await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), config.approved_url);

    let response = app.get(&format!("/verify/{}", token)).await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), config.invalid_url);

    let stale = app
        .state
        .verifier
        .issue_at(link, chrono::Utc::now() - chrono::Duration::hours(48))
        .await
        .unwrap();
    let response = app.get(&format!("/verify/{}", stale)).await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), config.expired_url);
}

#[tokio::test]
async fn test_history_follows_ledger() {
    let app = app();
    let record = app.document(Kind::Msa, "Master services").await;
    for action in ["Submit", "Circulate", "Upload"] {
        let (status, _) = app
            .post_progress(json!({
                "id": record.id.get(),
                "type": "MSA",
                "action": action,
                "url": "https://files.test/msa.pdf"
            }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = app
        .get(&format!("/progress/MSA/{}/history", record.id.get()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    let statuses: Vec<Value> = body["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["status"].clone())
        .collect();
    assert_eq!(
        statuses,
        vec![Value::Null, json!("Review Partner"), json!("Circulation"), json!("Signing")]
    );
    assert_eq!(body["current"]["status"], "Signing");
    assert_eq!(body["artifact"]["document_url"], "https://files.test/msa.pdf");

    let response = app
        .get(&format!("/progress/NDA/{}/history", record.id.get()))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_is_scoped_to_one_document() {
    let app = app();
    let company = app.storage.create_company("Acme Partners").await;
    let first = app.storage.create_document(Kind::Nda, company.id, "NDA one").await;
    let second = app.storage.create_document(Kind::Nda, company.id, "NDA two").await;

    for (record, action) in [(&second, "Submit"), (&second, "Circulate"), (&first, "Circulate")] {
        let (status, _) = app
            .post_progress(json!({"id": record.id.get(), "type": "NDA", "action": action}))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let history = |body: &Value| -> Vec<Value> {
        body["history"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["status"].clone())
            .collect()
    };

    let body = json_body(
        app.get(&format!("/progress/NDA/{}/history", first.id.get()))
            .await,
    )
    .await;
    assert_eq!(history(&body), vec![Value::Null, json!("Circulation")]);

    let body = json_body(
        app.get(&format!("/progress/NDA/{}/history", second.id.get()))
            .await,
    )
    .await;
    assert_eq!(
        history(&body),
        vec![Value::Null, json!("Review Partner"), json!("Circulation")]
    );
}

#[tokio::test]
async fn test_health_and_catalogs() {
    let app = app();

    let body = json_body(app.get("/health").await).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage_backend"], "memory");

    let steps = json_body(app.get("/catalog/steps").await).await;
    assert_eq!(steps.as_array().unwrap().len(), 5);
    assert_eq!(steps[2]["name"], "JIK");

    let statuses = json_body(app.get("/catalog/statuses").await).await;
    assert_eq!(statuses[1]["label"], "Review Legal Tsat");
}

#[tokio::test]
async fn test_stalled_token_lookup_redirects_to_invalid_page() {
    let inner = InMemoryStorage::new();
    let company = inner.create_company("Acme Partners").await;
    let record = inner.create_document(Kind::Jik, company.id, "Joint implementation").await;
    let approver = inner.create_approver("Rina", Some("rina@partner.test")).await;
    let link = inner
        .link_approver(Kind::Jik, record.id, approver, "partner")
        .await;

    let config = DaemonConfig::default();
    let mut state = AppState::new(
        Arc::new(StalledTokenStorage { inner }),
        Collaborators {
            generator: Arc::new(StubGenerator { fail: false }),
            objects: Arc::new(StubObjectStore),
            notifier: Arc::new(FlakyNotifier::default()),
        },
        &config,
    );
    state.verify_timeout = Duration::from_millis(50);
    let token = state.verifier.issue(link).await.unwrap();
    let router = create_router(state, &config.server);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/verify/{}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), config.verification.invalid_url);
}
