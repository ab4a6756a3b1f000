//! Shared state behind the messenger components.

use crate::config::MessengerConfig;
use crate::error::MessengerError;
use crate::remote::RemoteRecordStore;
use crate::store::StateStore;
use cloudmsg_core::{AccountState, PermissionStatus};
use cloudmsg_types::{DiscoveredUser, ErrorKind, IdentityRef};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct SessionAccount {
    state: AccountState,
    /// Set when the signed-in identity differs from the persisted one.
    stale: bool,
}

/// Collaborators and the verified account, shared by every component.
pub(crate) struct Session {
    pub(crate) config: MessengerConfig,
    pub(crate) remote: Arc<dyn RemoteRecordStore>,
    pub(crate) store: StateStore,
    account: RwLock<SessionAccount>,
}

impl Session {
    pub(crate) fn new(
        config: MessengerConfig,
        remote: Arc<dyn RemoteRecordStore>,
        store: StateStore,
    ) -> Self {
        Self {
            config,
            remote,
            store,
            account: RwLock::new(SessionAccount::default()),
        }
    }

    pub(crate) async fn account_state(&self) -> AccountState {
        self.account.read().await.state.clone()
    }

    /// Replace the verified account state.
    pub(crate) async fn set_account(&self, state: AccountState, stale: bool) {
        let mut account = self.account.write().await;
        account.state = state;
        account.stale = stale;
    }

    pub(crate) async fn set_permission(&self, status: PermissionStatus) {
        self.account.write().await.state.permission_status = status;
    }

    /// Replace the identity's public name, if it is still the active identity.
    pub(crate) async fn set_identity_user(&self, user: DiscoveredUser) {
        let mut account = self.account.write().await;
        if account.state.identity_ref() == Some(&user.identity) {
            account.state.identity = Some(user);
        }
    }

    pub(crate) async fn is_stale(&self) -> bool {
        self.account.read().await.stale
    }

    pub(crate) async fn clear_stale(&self) {
        self.account.write().await.stale = false;
    }

    /// The verified identity, for operations that need an available account.
    pub(crate) async fn active_identity(&self) -> Result<IdentityRef, MessengerError> {
        let account = self.account.read().await;
        if account.stale {
            return Err(ErrorKind::AccountChanged.into());
        }
        match (&account.state.identity, account.state.is_available()) {
            (Some(user), true) => Ok(user.identity.clone()),
            _ => Err(ErrorKind::AccountProblem.into()),
        }
    }

    /// The verified identity, for operations that also need discoverability.
    pub(crate) async fn ready_identity(&self) -> Result<IdentityRef, MessengerError> {
        let identity = self.active_identity().await?;
        if self.account.read().await.state.permission_status != PermissionStatus::Granted {
            return Err(ErrorKind::MissingDiscoveryPermission.into());
        }
        Ok(identity)
    }

    /// Re-check before committing persisted state.
    ///
    /// Both the session's identity and the persisted last-known identity must
    /// still be `expected`.
    pub(crate) async fn ensure_identity_unchanged(
        &self,
        expected: &IdentityRef,
    ) -> Result<(), MessengerError> {
        let active = self.active_identity().await.ok();
        let persisted = self.store.last_known_identity().await?;
        if active.as_ref() == Some(expected) && persisted.as_ref() == Some(expected) {
            return Ok(());
        }
        tracing::warn!(
            "Identity changed during operation (started as {}), discarding update",
            expected
        );
        Err(ErrorKind::AccountChanged.into())
    }
}
