//! SMTP delivery

use crate::error::GatewayError;
use crate::gateway::{MailMessage, Notifier};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Connection settings for the SMTP relay
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Notifier backed by one pooled SMTP transport, built once at startup
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, GatewayError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| GatewayError::Mail(format!("invalid sender '{}': {}", settings.from, e)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| GatewayError::Mail(e.to_string()))?
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: MailMessage) -> Result<(), GatewayError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| GatewayError::Mail(format!("invalid recipient '{}': {}", message.to, e)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject);
        let html = SinglePart::html(message.html_body);

        let email = match message.attachment {
            Some(attachment) => {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|e| GatewayError::Mail(e.to_string()))?;
                let file = Attachment::new(attachment.filename)
                    .body(attachment.content.to_vec(), content_type);
                builder.multipart(MultiPart::mixed().singlepart(html).singlepart(file))
            }
            None => builder.singlepart(html),
        }
        .map_err(|e| GatewayError::Mail(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| GatewayError::Mail(e.to_string()))?;
        Ok(())
    }
}

/// Notifier used when no SMTP relay is configured; every send fails so the
/// fan-out reports it as a warning
#[derive(Debug, Clone, Default)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, message: MailMessage) -> Result<(), GatewayError> {
        tracing::warn!(to = %message.to, "Mail delivery is not configured; dropping message");
        Err(GatewayError::Mail("mail delivery is not configured".to_string()))
    }
}
