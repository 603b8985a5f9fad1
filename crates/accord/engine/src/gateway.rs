//! Outbound collaborators
//!
//! The engine talks to three external services through narrow traits: a
//! document generator that renders a kind's content, an object store that
//! keeps binary artifacts, and a notifier that delivers email. HTTP
//! implementations of the first two live here; the SMTP notifier lives in
//! [`crate::mail`].

use crate::error::GatewayError;
use accord_types::{DocumentId, Kind};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Renders a document's current content into a binary artifact
#[async_trait]
pub trait DocumentGenerator: Send + Sync {
    async fn generate(
        &self,
        kind: Kind,
        document_id: DocumentId,
        title: &str,
    ) -> Result<Bytes, GatewayError>;
}

/// Binary storage addressed by URL
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes and return the URL they can be fetched from
    async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        content: Bytes,
    ) -> Result<String, GatewayError>;

    /// Fetch previously stored bytes
    async fn download(&self, url: &str) -> Result<Bytes, GatewayError>;
}

/// A file attached to an outgoing email
#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub content: Bytes,
}

/// An outgoing email
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<MailAttachment>,
}

/// Delivers email
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), GatewayError>;
}

fn http_client(timeout: Duration) -> Result<Client, GatewayError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Document generator reached over HTTP (`POST {base}/generate-docx`)
#[derive(Debug, Clone)]
pub struct HttpDocumentGenerator {
    client: Client,
    base_url: String,
}

impl HttpDocumentGenerator {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DocumentGenerator for HttpDocumentGenerator {
    async fn generate(
        &self,
        kind: Kind,
        document_id: DocumentId,
        title: &str,
    ) -> Result<Bytes, GatewayError> {
        let response = self
            .client
            .post(format!("{}/generate-docx", self.base_url))
            .json(&serde_json::json!({
                "documentId": document_id.get(),
                "type": kind.as_str(),
                "title": title,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                service: "generator",
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(GatewayError::InvalidResponse {
                service: "generator",
                message: "empty document".to_string(),
            });
        }
        Ok(body)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Object store reached over HTTP (`POST {base}/upload`, multipart)
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        content: Bytes,
    ) -> Result<String, GatewayError> {
        let part = Part::bytes(content.to_vec())
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                service: "upload",
                status: status.as_u16(),
            });
        }

        let body: UploadResponse =
            response
                .json()
                .await
                .map_err(|e| GatewayError::InvalidResponse {
                    service: "upload",
                    message: e.to_string(),
                })?;
        if body.url.trim().is_empty() {
            return Err(GatewayError::InvalidResponse {
                service: "upload",
                message: "empty url".to_string(),
            });
        }
        Ok(body.url)
    }

    async fn download(&self, url: &str) -> Result<Bytes, GatewayError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                service: "download",
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }
}
