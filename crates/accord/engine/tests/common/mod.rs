#![allow(dead_code)]

use accord_engine::{
    ApprovalDispatcher, DocumentGenerator, EngineConfig, GatewayError, MailMessage, Notifier,
    ObjectStore, TransitionEngine, VerificationService,
};
use accord_storage::{InMemoryStorage, LedgerStore, Storage};
use accord_types::{DocumentId, DocumentRecord, Kind};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct FakeGenerator {
    pub calls: AtomicUsize,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl FakeGenerator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Answers only after `delay`
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentGenerator for FakeGenerator {
    async fn generate(
        &self,
        kind: Kind,
        document_id: DocumentId,
        title: &str,
    ) -> Result<Bytes, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(GatewayError::Status {
                service: "generator",
                status: 502,
            });
        }
        Ok(Bytes::from(format!("{}:{}:{}", kind, document_id.get(), title)))
    }
}

#[derive(Debug, Default)]
pub struct FakeObjectStore {
    pub uploads: Mutex<Vec<String>>,
    pub fail_download: bool,
}

impl FakeObjectStore {
    pub fn without_downloads() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            fail_download: true,
        }
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn upload(
        &self,
        filename: &str,
        _content_type: &str,
        _content: Bytes,
    ) -> Result<String, GatewayError> {
        let url = format!("https://files.test/{}", filename);
        self.uploads.lock().unwrap().push(url.clone());
        Ok(url)
    }

    async fn download(&self, url: &str) -> Result<Bytes, GatewayError> {
        if self.fail_download {
            return Err(GatewayError::Status {
                service: "download",
                status: 404,
            });
        }
        Ok(Bytes::from(url.to_string()))
    }
}

/// Records every message; fails or stalls the sends whose 1-based position
/// is listed
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub attempts: Mutex<Vec<MailMessage>>,
    pub fail_on: Vec<usize>,
    pub stall_on: Vec<usize>,
    pub stall_for: Duration,
}

impl RecordingNotifier {
    pub fn failing_on(positions: &[usize]) -> Self {
        Self {
            fail_on: positions.to_vec(),
            ..Self::default()
        }
    }

    pub fn stalling_on(positions: &[usize], stall_for: Duration) -> Self {
        Self {
            stall_on: positions.to_vec(),
            stall_for,
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> Vec<MailMessage> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: MailMessage) -> Result<(), GatewayError> {
        let position = {
            let mut attempts = self.attempts.lock().unwrap();
            attempts.push(message);
            attempts.len()
        };
        if self.stall_on.contains(&position) {
            tokio::time::sleep(self.stall_for).await;
        }
        if self.fail_on.contains(&position) {
            return Err(GatewayError::Mail("connection reset by relay".to_string()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub storage: Arc<InMemoryStorage>,
    pub generator: Arc<FakeGenerator>,
    pub objects: Arc<FakeObjectStore>,
    pub engine: TransitionEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_generator(FakeGenerator::default())
    }

    pub fn with_generator(generator: FakeGenerator) -> Self {
        Self::with_config(generator, EngineConfig::default())
    }

    pub fn with_config(generator: FakeGenerator, config: EngineConfig) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let generator = Arc::new(generator);
        let objects = Arc::new(FakeObjectStore::default());
        let engine = TransitionEngine::new(
            storage.clone(),
            generator.clone(),
            objects.clone(),
            config,
        );
        Self {
            storage,
            generator,
            objects,
            engine,
        }
    }

    pub fn dyn_storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    pub fn verifier(&self) -> VerificationService {
        VerificationService::new(self.dyn_storage(), chrono::Duration::hours(24))
    }

    pub fn dispatcher(&self, notifier: Arc<dyn Notifier>) -> ApprovalDispatcher {
        self.dispatcher_with_timeout(notifier, Duration::from_secs(5))
    }

    pub fn dispatcher_with_timeout(
        &self,
        notifier: Arc<dyn Notifier>,
        notify_timeout: Duration,
    ) -> ApprovalDispatcher {
        ApprovalDispatcher::new(
            self.dyn_storage(),
            self.verifier(),
            notifier,
            self.objects.clone(),
            "https://accord.test/",
            notify_timeout,
        )
    }

    pub async fn document(&self, kind: Kind, title: &str) -> DocumentRecord {
        let company = self.storage.create_company("Acme Partners").await;
        self.storage.create_document(kind, company.id, title).await
    }

    pub async fn reload(&self, record: &DocumentRecord) -> DocumentRecord {
        self.storage
            .get_document(record.kind, record.id)
            .await
            .unwrap()
            .unwrap()
    }
}
