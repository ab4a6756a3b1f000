//! Errors returned by messenger operations.
//!
//! Every failure maps to exactly one [`ErrorKind`]. `Display` shows text that
//! is safe to put in front of a user; the underlying cause stays available
//! through [`std::error::Error::source`].

use crate::store::StoreError;
use cloudmsg_core::classify;
use cloudmsg_types::{
    ErrorKind, NotificationError, RecordId, RemoteError, SchemaError, ValidationError,
};
use std::time::Duration;
use thiserror::Error;

/// Messenger operation failure.
#[derive(Debug, Error)]
pub enum MessengerError {
    /// A classified failure of the remote store or of the account state.
    #[error("{kind}")]
    Remote {
        /// Failure category.
        kind: ErrorKind,
        /// Server-provided wait before retrying (rate limiting only).
        retry_after: Option<Duration>,
    },

    /// The record no longer exists on the server.
    #[error("This message is no longer available.")]
    RecordNotFound(RecordId),

    /// The outgoing message failed local validation.
    #[error("{0}")]
    Invalid(#[from] ValidationError),

    /// A record or push payload did not match the message schema.
    #[error("{}", ErrorKind::Unexpected)]
    Schema(#[from] SchemaError),

    /// A push payload could not be parsed.
    #[error("{}", ErrorKind::Unexpected)]
    Payload(#[from] NotificationError),

    /// Local persistence failed.
    #[error("{}", ErrorKind::Unexpected)]
    Storage(#[from] StoreError),
}

impl MessengerError {
    /// The failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MessengerError::Remote { kind, .. } => *kind,
            MessengerError::RecordNotFound(_)
            | MessengerError::Invalid(_)
            | MessengerError::Schema(_)
            | MessengerError::Payload(_)
            | MessengerError::Storage(_) => ErrorKind::Unexpected,
        }
    }

    /// Stable machine code of [`MessengerError::kind`].
    pub fn code(&self) -> u16 {
        self.kind().code()
    }

    /// How long the server asked us to wait, if it did.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MessengerError::Remote { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<ErrorKind> for MessengerError {
    fn from(kind: ErrorKind) -> Self {
        MessengerError::Remote {
            kind,
            retry_after: None,
        }
    }
}

impl From<RemoteError> for MessengerError {
    fn from(error: RemoteError) -> Self {
        let kind = classify(&error);
        tracing::debug!("Remote error {:?} classified as {:?}", error.code, kind);
        MessengerError::Remote {
            kind,
            retry_after: error.retry_after.filter(|_| kind == ErrorKind::RateLimit),
        }
    }
}
