//! Account verification.

use crate::error::MessengerError;
use crate::session::Session;
use cloudmsg_core::{
    check_account, reconcile_identity, AccountState, AccountStatus, IdentityCheck,
    PermissionStatus,
};
use cloudmsg_types::{DiscoveredUser, ErrorKind};
use std::sync::Arc;

/// Verifies the signed-in account and owns the last-known identity.
pub struct AccountGateway {
    session: Arc<Session>,
}

impl AccountGateway {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Check account availability and permission, then detect identity changes.
    ///
    /// On first run the fetched identity is recorded. When a different
    /// identity than the recorded one is signed in, this fails with
    /// `AccountChanged` and leaves the change token and subscription id
    /// alone; call [`Messenger::reset_account`](crate::Messenger::reset_account)
    /// to start over with the new account.
    pub async fn verify(&self) -> Result<DiscoveredUser, MessengerError> {
        let remote = &self.session.remote;
        let account_status = remote.account_status().await?;
        let permission_status = remote.permission_status().await?;

        if let Err(kind) = check_account(account_status, permission_status) {
            tracing::info!(
                "Account check failed: {:?} (account {:?}, permission {:?})",
                kind,
                account_status,
                permission_status
            );
            self.session
                .set_account(
                    AccountState {
                        account_status,
                        permission_status,
                        identity: None,
                    },
                    false,
                )
                .await;
            return Err(kind.into());
        }

        let identity = remote.fetch_current_identity().await?;
        let user = if permission_status == PermissionStatus::Granted {
            match remote.fetch_identity(&identity).await {
                Ok(user) => user,
                Err(e) => {
                    tracing::debug!("Could not look up own name: {}", e);
                    DiscoveredUser::anonymous(identity.clone())
                }
            }
        } else {
            DiscoveredUser::anonymous(identity.clone())
        };

        let state = AccountState {
            account_status,
            permission_status,
            identity: Some(user.clone()),
        };
        let last_known = self.session.store.last_known_identity().await?;

        match reconcile_identity(&identity, last_known.as_ref()) {
            IdentityCheck::FirstRun => {
                self.session.store.set_last_known_identity(&identity).await?;
                self.session.set_account(state, false).await;
                tracing::info!("Verified account {} (first run)", identity);
                Ok(user)
            }
            IdentityCheck::Unchanged => {
                self.session.set_account(state, false).await;
                tracing::debug!("Verified account {}", identity);
                Ok(user)
            }
            IdentityCheck::Changed { previous } => {
                self.session.set_account(state, true).await;
                tracing::warn!("Account changed from {} to {}", previous, identity);
                Err(ErrorKind::AccountChanged.into())
            }
        }
    }

    /// Accept the identity found by the last `verify` as the new last-known one.
    ///
    /// Only meaningful after `verify` reported `AccountChanged`.
    pub async fn reset_identity(&self) -> Result<(), MessengerError> {
        let state = self.session.account_state().await;
        let identity = state
            .identity_ref()
            .filter(|_| state.account_status == AccountStatus::Available)
            .ok_or_else(|| MessengerError::from(ErrorKind::AccountProblem))?;

        self.session.store.set_last_known_identity(identity).await?;
        self.session.clear_stale().await;
        tracing::info!("Last-known identity reset to {}", identity);
        Ok(())
    }

    /// Snapshot of the account as last verified.
    pub async fn state(&self) -> AccountState {
        self.session.account_state().await
    }

    /// True if `verify` found a different identity than the recorded one and
    /// the reset has not happened yet.
    pub async fn needs_reset(&self) -> bool {
        self.session.is_stale().await
    }
}
