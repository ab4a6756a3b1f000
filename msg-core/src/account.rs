//! Account and permission decisions.
//!
//! The gateway in `cloudmsg-client` fetches the raw statuses; the decisions
//! about what they mean live here so they can be tested without a network.

use cloudmsg_types::{DiscoveredUser, ErrorKind, IdentityRef};
use serde::{Deserialize, Serialize};

/// Availability of the cloud account on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccountStatus {
    /// Status could not be determined (or not fetched yet).
    #[default]
    Unknown,
    /// An account is signed in and usable.
    Available,
    /// Parental controls or device management block the account.
    Restricted,
    /// No account is signed in.
    NoAccount,
}

/// The user's discoverability decision for this app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PermissionStatus {
    /// The user has not decided yet.
    #[default]
    Initial,
    /// Fetching or setting the permission failed.
    Errored,
    /// The user said no.
    Denied,
    /// The user said yes.
    Granted,
}

/// Consent requests made before giving up on an undecided answer.
///
/// One request plus one re-request if the answer comes back undecided.
pub const MAX_PERMISSION_REQUESTS: u8 = 2;

/// What to do about discoverability consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptDecision {
    /// Already granted; go ahead.
    Proceed,
    /// Ask the user (again).
    Request,
    /// Stop: the user must change the setting themselves.
    Refuse,
}

impl PermissionStatus {
    /// Decide the next consent step after `requests_made` requests.
    pub fn prompt_decision(self, requests_made: u8) -> PromptDecision {
        match self {
            PermissionStatus::Granted => PromptDecision::Proceed,
            PermissionStatus::Denied => PromptDecision::Refuse,
            PermissionStatus::Initial | PermissionStatus::Errored => {
                if requests_made < MAX_PERMISSION_REQUESTS {
                    PromptDecision::Request
                } else {
                    PromptDecision::Refuse
                }
            }
        }
    }
}

/// Snapshot of the signed-in account as last verified.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountState {
    /// Account availability.
    pub account_status: AccountStatus,
    /// Discoverability permission.
    pub permission_status: PermissionStatus,
    /// The active identity, once fetched.
    pub identity: Option<DiscoveredUser>,
}

impl AccountState {
    /// Nothing known yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the account can be used at all.
    pub fn is_available(&self) -> bool {
        self.account_status == AccountStatus::Available && self.identity.is_some()
    }

    /// True if discovery and subscription operations are allowed.
    pub fn is_ready(&self) -> bool {
        self.is_available() && self.permission_status == PermissionStatus::Granted
    }

    /// The active identity reference, if fetched.
    pub fn identity_ref(&self) -> Option<&IdentityRef> {
        self.identity.as_ref().map(|user| &user.identity)
    }
}

/// Apply the account half of the verify decision table.
///
/// Account problems take precedence over permission problems.
pub fn check_account(
    account_status: AccountStatus,
    permission_status: PermissionStatus,
) -> Result<(), ErrorKind> {
    if account_status != AccountStatus::Available {
        return Err(ErrorKind::AccountProblem);
    }
    if permission_status == PermissionStatus::Denied {
        return Err(ErrorKind::MissingDiscoveryPermission);
    }
    Ok(())
}

/// Outcome of comparing the fetched identity with the persisted one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityCheck {
    /// Nothing persisted yet: record the fetched identity.
    FirstRun,
    /// Same identity as last time.
    Unchanged,
    /// A different account signed in.
    Changed {
        /// The identity persisted from the previous account.
        previous: IdentityRef,
    },
}

/// Compare the fetched identity with the last-known one.
pub fn reconcile_identity(
    fetched: &IdentityRef,
    last_known: Option<&IdentityRef>,
) -> IdentityCheck {
    match last_known {
        None => IdentityCheck::FirstRun,
        Some(known) if known == fetched => IdentityCheck::Unchanged,
        Some(known) => IdentityCheck::Changed {
            previous: known.clone(),
        },
    }
}
