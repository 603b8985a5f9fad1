use crate::kind::Kind;
use thiserror::Error;

/// Errors raised while interpreting client vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("unknown document type: {0}")]
    UnknownKind(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("action '{action}' is not valid for {kind} in status {status:?}")]
    InvalidAction {
        kind: Kind,
        action: String,
        status: Option<String>,
    },
}
