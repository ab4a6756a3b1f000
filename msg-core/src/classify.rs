//! Error classification.
//!
//! Maps every low-level [`RemoteError`] onto exactly one [`ErrorKind`].
//! The mapping is total: codes this build does not recognise collapse to
//! [`ErrorKind::Unexpected`].

use cloudmsg_types::{ErrorKind, RemoteError, RemoteErrorCode};

/// Classify a remote error.
pub fn classify(error: &RemoteError) -> ErrorKind {
    classify_code(error.code)
}

/// Classify a bare error code.
pub fn classify_code(code: RemoteErrorCode) -> ErrorKind {
    use RemoteErrorCode::*;

    match code {
        NetworkUnavailable | NetworkFailure | Timeout => ErrorKind::Network,
        ServiceUnavailable | ZoneBusy | ServerResponseLost => ErrorKind::ServiceUnavailable,
        RequestRateLimited | LimitExceeded | QuotaExceeded => ErrorKind::RateLimit,
        NotAuthenticated | AccountTemporarilyUnavailable => ErrorKind::AccountProblem,
        PermissionFailure => ErrorKind::MissingDiscoveryPermission,
        OperationCancelled => ErrorKind::Cancelled,
        UserIdentityChanged => ErrorKind::AccountChanged,
        InternalError
        | PartialFailure
        | BadContainer
        | MissingEntitlement
        | UnknownItem
        | InvalidArguments
        | ServerRecordChanged
        | ServerRejectedRequest
        | AlreadyExists
        | AssetFileNotFound
        | IncompatibleVersion
        | ConstraintViolation
        | ChangeTokenExpired
        | Other(_) => ErrorKind::Unexpected,
    }
}

/// True if a failed write may still have been applied by the server.
///
/// The request left the client, but no answer came back.
pub fn outcome_unknown(code: RemoteErrorCode) -> bool {
    matches!(
        code,
        RemoteErrorCode::NetworkFailure
            | RemoteErrorCode::Timeout
            | RemoteErrorCode::ServerResponseLost
    )
}
