//! # cloudmsg-core
//!
//! Pure logic for cloudmsg (no I/O, instant tests).
//!
//! This crate holds every decision the messenger makes that does not need
//! the network or the disk:
//! - [`classify`]: remote error → [`ErrorKind`](cloudmsg_types::ErrorKind)
//! - [`account`]: account/permission decision table and identity reconciliation
//! - [`persisted`]: the versioned encoding of the three persisted keys
//! - [`retry`]: send retry policy with capped exponential backoff
//!
//! The actual I/O is performed by `cloudmsg-client`, which calls into these
//! functions at each step.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod account;
pub mod classify;
pub mod persisted;
pub mod retry;

pub use account::{
    check_account, reconcile_identity, AccountState, AccountStatus, IdentityCheck,
    PermissionStatus, PromptDecision, MAX_PERMISSION_REQUESTS,
};
pub use classify::{classify, classify_code, outcome_unknown};
pub use persisted::{
    CodecError, PersistedIdentity, PersistedSubscription, PersistedToken, PersistedValue,
    StoreKey, SCHEMA_VERSION,
};
pub use retry::RetryPolicy;
