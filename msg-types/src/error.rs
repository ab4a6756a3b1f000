//! Error taxonomy for cloudmsg.
//!
//! [`RemoteError`] is what collaborators (the remote record store, the
//! transport under it) report. Callers never see it: every remote failure is
//! classified into one [`ErrorKind`] first.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The fixed set of failure categories surfaced to applications.
///
/// Codes are stable and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Anything not covered below.
    Unexpected,
    /// No usable cloud account on this device.
    AccountProblem,
    /// The user has not allowed discoverability.
    MissingDiscoveryPermission,
    /// The network is unreachable or timed out.
    Network,
    /// The service is temporarily down.
    ServiceUnavailable,
    /// The service asked us to slow down.
    RateLimit,
    /// The operation was cancelled.
    Cancelled,
    /// A different account signed in since the last run.
    AccountChanged,
}

impl ErrorKind {
    /// Every kind, in code order.
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Unexpected,
        ErrorKind::AccountProblem,
        ErrorKind::MissingDiscoveryPermission,
        ErrorKind::Network,
        ErrorKind::ServiceUnavailable,
        ErrorKind::RateLimit,
        ErrorKind::Cancelled,
        ErrorKind::AccountChanged,
    ];

    /// Stable machine code.
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::Unexpected => 0,
            ErrorKind::AccountProblem => 1,
            ErrorKind::MissingDiscoveryPermission => 2,
            ErrorKind::Network => 3,
            ErrorKind::ServiceUnavailable => 4,
            ErrorKind::RateLimit => 5,
            ErrorKind::Cancelled => 6,
            ErrorKind::AccountChanged => 7,
        }
    }

    /// Look a kind up by its machine code.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    /// Human-readable description, safe to show to users.
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::Unexpected => "An unexpected error occurred. Please try again later.",
            ErrorKind::AccountProblem => {
                "There is a problem with your cloud account. Make sure you are signed in."
            }
            ErrorKind::MissingDiscoveryPermission => {
                "Discoverability is turned off. Allow others to find you by email to send and receive messages."
            }
            ErrorKind::Network => {
                "The service could not be reached. Check your network connection and try again."
            }
            ErrorKind::ServiceUnavailable => {
                "The service is temporarily unavailable. Please try again later."
            }
            ErrorKind::RateLimit => "Too many requests. Please wait a moment and try again.",
            ErrorKind::Cancelled => "The operation was cancelled.",
            ErrorKind::AccountChanged => {
                "A different cloud account signed in. Data from the previous account has to be cleared."
            }
        }
    }

    /// True for kinds a caller may simply retry after a backoff.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::ServiceUnavailable | ErrorKind::RateLimit
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Low-level error codes reported by the remote store and its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteErrorCode {
    /// Server-side bug.
    InternalError,
    /// Some items in a batch failed.
    PartialFailure,
    /// No network route.
    NetworkUnavailable,
    /// The connection dropped.
    NetworkFailure,
    /// The transport gave up waiting.
    Timeout,
    /// Misconfigured container.
    BadContainer,
    /// Service temporarily down.
    ServiceUnavailable,
    /// The request may or may not have been applied.
    ServerResponseLost,
    /// Too much contention on the target zone.
    ZoneBusy,
    /// Per-client request throttling.
    RequestRateLimited,
    /// Request too large.
    LimitExceeded,
    /// Storage quota exhausted.
    QuotaExceeded,
    /// App not entitled to the service.
    MissingEntitlement,
    /// No account signed in.
    NotAuthenticated,
    /// Account exists but cannot be used right now.
    AccountTemporarilyUnavailable,
    /// Caller lacks permission.
    PermissionFailure,
    /// The record, asset or subscription does not exist.
    UnknownItem,
    /// Malformed request.
    InvalidArguments,
    /// Conflicting server-side change.
    ServerRecordChanged,
    /// The server refused the request.
    ServerRejectedRequest,
    /// An item with that id already exists.
    AlreadyExists,
    /// A local asset file is missing.
    AssetFileNotFound,
    /// Client/server protocol mismatch.
    IncompatibleVersion,
    /// A uniqueness constraint failed.
    ConstraintViolation,
    /// The operation was cancelled.
    OperationCancelled,
    /// The change token is no longer valid.
    ChangeTokenExpired,
    /// The signed-in identity changed during the request.
    UserIdentityChanged,
    /// A code this build does not know.
    Other(i64),
}

impl RemoteErrorCode {
    /// Every named code (excludes `Other`).
    pub const KNOWN: [RemoteErrorCode; 27] = [
        RemoteErrorCode::InternalError,
        RemoteErrorCode::PartialFailure,
        RemoteErrorCode::NetworkUnavailable,
        RemoteErrorCode::NetworkFailure,
        RemoteErrorCode::Timeout,
        RemoteErrorCode::BadContainer,
        RemoteErrorCode::ServiceUnavailable,
        RemoteErrorCode::ServerResponseLost,
        RemoteErrorCode::ZoneBusy,
        RemoteErrorCode::RequestRateLimited,
        RemoteErrorCode::LimitExceeded,
        RemoteErrorCode::QuotaExceeded,
        RemoteErrorCode::MissingEntitlement,
        RemoteErrorCode::NotAuthenticated,
        RemoteErrorCode::AccountTemporarilyUnavailable,
        RemoteErrorCode::PermissionFailure,
        RemoteErrorCode::UnknownItem,
        RemoteErrorCode::InvalidArguments,
        RemoteErrorCode::ServerRecordChanged,
        RemoteErrorCode::ServerRejectedRequest,
        RemoteErrorCode::AlreadyExists,
        RemoteErrorCode::AssetFileNotFound,
        RemoteErrorCode::IncompatibleVersion,
        RemoteErrorCode::ConstraintViolation,
        RemoteErrorCode::OperationCancelled,
        RemoteErrorCode::ChangeTokenExpired,
        RemoteErrorCode::UserIdentityChanged,
    ];
}

/// A failure reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote error {code:?}: {message}")]
pub struct RemoteError {
    /// Low-level code.
    pub code: RemoteErrorCode,
    /// Transport/service detail. Never shown to users.
    pub message: String,
    /// Server-suggested wait before retrying.
    pub retry_after: Option<Duration>,
}

impl RemoteError {
    /// Create an error without a retry hint.
    pub fn new(code: RemoteErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Attach a retry-after hint.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    /// True if this error carries the given code.
    pub fn is(&self, code: RemoteErrorCode) -> bool {
        self.code == code
    }
}
