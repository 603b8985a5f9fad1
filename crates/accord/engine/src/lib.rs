//! Accord Engine - document transitions and approver verification
//!
//! The engine owns the only write path into the progress ledger:
//!
//! - [`TransitionEngine`] applies a client action atomically (new progress
//!   row, re-pointed record, carried or generated artifact)
//! - [`VerificationService`] issues and consumes one-time approver tokens
//! - [`ApprovalDispatcher`] emails approvers after a transition commits
//!
//! External services (document generator, object store, mail relay) are
//! reached through the traits in [`gateway`] and injected at construction.

#![deny(unsafe_code)]

pub mod adapter;
pub mod error;
pub mod gateway;
pub mod mail;
pub mod notify;
pub mod transition;
pub mod verification;

pub use adapter::{AdapterRegistry, DocumentKindAdapter, KindAdapter};
pub use error::{EngineError, EngineResult, GatewayError, VerificationError};
pub use gateway::{
    DocumentGenerator, HttpDocumentGenerator, HttpObjectStore, MailAttachment, MailMessage,
    Notifier, ObjectStore, DOCX_CONTENT_TYPE,
};
pub use mail::{DisabledNotifier, SmtpNotifier, SmtpSettings};
pub use notify::{ApprovalDispatcher, DispatchFailure, DispatchReport};
pub use transition::{EngineConfig, TransitionEngine, TransitionOutcome, TransitionRequest};
pub use verification::{generate_token, VerificationService, TOKEN_BYTES};
