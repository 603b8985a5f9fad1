//! Approval notification fan-out
//!
//! Runs after a transition has committed. Each approver of the document gets
//! a fresh verification token and an email carrying the link; sends are
//! independent, so one failure never stops the rest.

use crate::error::GatewayError;
use crate::gateway::{MailAttachment, MailMessage, Notifier, ObjectStore, DOCX_CONTENT_TYPE};
use crate::transition::TransitionOutcome;
use crate::verification::VerificationService;
use accord_storage::Storage;
use accord_types::{ApproverContact, ApproverLinkId, Artifact};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// One approver the fan-out could not reach
#[derive(Debug, Clone, Serialize)]
pub struct DispatchFailure {
    pub link_id: ApproverLinkId,
    pub approver: String,
    pub reason: String,
}

/// Summary of one fan-out
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    /// Emails the notifier accepted
    pub sent: usize,
    /// Approvers without an email address
    pub skipped: usize,
    pub failures: Vec<DispatchFailure>,
    /// Set when the approver list itself could not be read
    pub lookup_error: Option<String>,
    /// Set when the artifact could not be attached
    pub attachment_error: Option<String>,
}

impl DispatchReport {
    /// Human readable warnings for the transition response
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::with_capacity(self.failures.len() + 2);
        if let Some(error) = &self.lookup_error {
            warnings.push(format!("approvers not notified: {}", error));
        }
        if let Some(error) = &self.attachment_error {
            warnings.push(format!("artifact not attached: {}", error));
        }
        warnings.extend(
            self.failures
                .iter()
                .map(|f| format!("notification to {} failed: {}", f.approver, f.reason)),
        );
        warnings
    }
}

/// Sends verification emails to a document's approvers
pub struct ApprovalDispatcher {
    storage: Arc<dyn Storage>,
    verifier: VerificationService,
    notifier: Arc<dyn Notifier>,
    objects: Arc<dyn ObjectStore>,
    public_base_url: String,
    notify_timeout: Duration,
}

impl ApprovalDispatcher {
    pub fn new(
        storage: Arc<dyn Storage>,
        verifier: VerificationService,
        notifier: Arc<dyn Notifier>,
        objects: Arc<dyn ObjectStore>,
        public_base_url: &str,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            verifier,
            notifier,
            objects,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            notify_timeout,
        }
    }

    pub fn verification_link(&self, token: &str) -> String {
        format!("{}/verify/{}", self.public_base_url, token)
    }

    /// Email every approver of the transitioned document. Never fails; every
    /// problem ends up in the report.
    pub async fn dispatch(&self, outcome: &TransitionOutcome) -> DispatchReport {
        let mut report = DispatchReport::default();

        let contacts = match self
            .storage
            .list_approver_contacts(outcome.kind, outcome.document_id)
            .await
        {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::warn!(
                    kind = %outcome.kind,
                    document_id = %outcome.document_id,
                    error = %e,
                    "Could not list approvers; nobody notified"
                );
                report.lookup_error = Some(e.to_string());
                return report;
            }
        };

        if contacts.is_empty() {
            tracing::info!(
                kind = %outcome.kind,
                document_id = %outcome.document_id,
                "Document has no approvers to notify"
            );
            return report;
        }

        let attachment = match &outcome.artifact {
            Some(artifact) => match self.fetch_attachment(outcome, artifact).await {
                Ok(attachment) => Some(attachment),
                Err(e) => {
                    tracing::warn!(
                        kind = %outcome.kind,
                        document_id = %outcome.document_id,
                        url = %artifact.document_url,
                        error = %e,
                        "Artifact download failed; sending without attachment"
                    );
                    report.attachment_error = Some(e.to_string());
                    None
                }
            },
            None => None,
        };

        for contact in contacts {
            let Some(email) = contact.email.as_deref().filter(|e| !e.trim().is_empty()) else {
                tracing::debug!(link_id = %contact.link_id, "Approver has no email address");
                report.skipped += 1;
                continue;
            };

            match self
                .notify_one(outcome, &contact, email, attachment.clone())
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        kind = %outcome.kind,
                        document_id = %outcome.document_id,
                        link_id = %contact.link_id,
                        "Verification email sent"
                    );
                    report.sent += 1;
                }
                Err(reason) => {
                    tracing::warn!(
                        kind = %outcome.kind,
                        document_id = %outcome.document_id,
                        link_id = %contact.link_id,
                        error = %reason,
                        "Verification email failed"
                    );
                    report.failures.push(DispatchFailure {
                        link_id: contact.link_id,
                        approver: contact.name.clone(),
                        reason,
                    });
                }
            }
        }

        report
    }

    async fn fetch_attachment(
        &self,
        outcome: &TransitionOutcome,
        artifact: &Artifact,
    ) -> Result<MailAttachment, GatewayError> {
        let content = tokio::time::timeout(
            self.notify_timeout,
            self.objects.download(&artifact.document_url),
        )
        .await
        .map_err(|_| GatewayError::Timeout("artifact download".to_string()))??;

        Ok(MailAttachment {
            filename: format!(
                "{}-{}.docx",
                outcome.kind.as_str().to_lowercase(),
                outcome.document_id.get()
            ),
            content_type: DOCX_CONTENT_TYPE.to_string(),
            content,
        })
    }

    async fn notify_one(
        &self,
        outcome: &TransitionOutcome,
        contact: &ApproverContact,
        email: &str,
        attachment: Option<MailAttachment>,
    ) -> Result<(), String> {
        let token = self
            .verifier
            .issue(contact.link_id)
            .await
            .map_err(|e| e.to_string())?;
        let link = self.verification_link(&token);

        let message = MailMessage {
            to: email.to_string(),
            subject: format!("Approval requested: {} {}", outcome.kind, outcome.title),
            html_body: render_body(&contact.name, outcome, &link, self.verifier.ttl().num_hours()),
            attachment,
        };

        tokio::time::timeout(self.notify_timeout, self.notifier.send(message))
            .await
            .map_err(|_| "mail delivery timed out".to_string())?
            .map_err(|e| e.to_string())
    }
}

fn render_body(name: &str, outcome: &TransitionOutcome, link: &str, ttl_hours: i64) -> String {
    format!(
        "<p>Dear {name},</p>\
         <p>The {kind} document <strong>{title}</strong> is awaiting your approval.</p>\
         <p><a href=\"{link}\">Approve this document</a></p>\
         <p>This link is valid for one use within {ttl_hours} hours.</p>",
        name = escape_html(name),
        kind = outcome.kind,
        title = escape_html(&outcome.title),
        link = link,
        ttl_hours = ttl_hours,
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>R&D</b>"), "&lt;b&gt;R&amp;D&lt;/b&gt;");
    }

    #[test]
    fn test_warnings_lists_attachment_then_failures() {
        let report = DispatchReport {
            sent: 1,
            skipped: 0,
            failures: vec![DispatchFailure {
                link_id: ApproverLinkId::new(4),
                approver: "Bea".to_string(),
                reason: "smtp down".to_string(),
            }],
            lookup_error: None,
            attachment_error: Some("404".to_string()),
        };
        let warnings = report.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("404"));
        assert!(warnings[1].contains("Bea"));
    }
}
