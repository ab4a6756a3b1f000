//! Push subscription registration.

use crate::error::MessengerError;
use crate::remote::{Predicate, SubscriptionSpec, SubscriptionTrigger};
use crate::session::Session;
use cloudmsg_core::StoreKey;
use cloudmsg_types::{field, RemoteErrorCode, SubscriptionId, MESSAGE_RECORD_TYPE};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Registers the incoming-message subscription once per installation.
pub struct SubscriptionManager {
    session: Arc<Session>,
    /// Serializes registration so concurrent callers make one remote call.
    registering: Mutex<()>,
}

impl SubscriptionManager {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            registering: Mutex::new(()),
        }
    }

    /// Make sure the incoming-message subscription exists.
    ///
    /// Returns the persisted id without a remote call when there is one. An
    /// "already exists" answer from the store counts as success.
    pub async fn ensure_subscribed(&self) -> Result<SubscriptionId, MessengerError> {
        let identity = self.session.ready_identity().await?;
        let _guard = self.registering.lock().await;

        if let Some(id) = self.session.store.subscription_id().await? {
            tracing::debug!("Already subscribed as {}", id);
            return Ok(id);
        }

        let spec = SubscriptionSpec {
            id: SubscriptionId::incoming_messages(),
            record_type: MESSAGE_RECORD_TYPE.to_string(),
            predicate: Predicate::reference_equals(field::RECEIVER, identity.clone()),
            trigger: SubscriptionTrigger::RecordCreated,
            silent: true,
            notification_fields: vec![
                field::SENDER.to_string(),
                field::SENDER_FIRST_NAME.to_string(),
            ],
        };

        let id = match self.session.remote.create_subscription(&spec).await {
            Ok(id) => {
                tracing::info!("Created subscription {} for {}", id, identity);
                id
            }
            Err(e) if e.is(RemoteErrorCode::AlreadyExists) => {
                tracing::info!("Subscription {} already registered", spec.id);
                spec.id
            }
            Err(e) => return Err(e.into()),
        };

        self.session.ensure_identity_unchanged(&identity).await?;
        self.session.store.set_subscription_id(&id).await?;
        Ok(id)
    }

    /// The persisted subscription id, if any.
    pub async fn subscription_id(&self) -> Result<Option<SubscriptionId>, MessengerError> {
        Ok(self.session.store.subscription_id().await?)
    }

    /// Forget the persisted subscription id.
    pub async fn reset(&self) -> Result<(), MessengerError> {
        let _guard = self.registering.lock().await;
        self.session.store.remove(StoreKey::SubscriptionId).await?;
        tracing::info!("Subscription id cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockOp, MockRecordStore};
    use crate::store::{MemoryStore, StateStore};
    use crate::{AccountGateway, MessengerConfig};
    use cloudmsg_core::PermissionStatus;
    use cloudmsg_types::{DiscoveredUser, ErrorKind, IdentityRef, RemoteError};

    async fn manager(remote: &MockRecordStore) -> SubscriptionManager {
        let session = Arc::new(Session::new(
            MessengerConfig::default(),
            Arc::new(remote.clone()),
            StateStore::new(Arc::new(MemoryStore::new())),
        ));
        AccountGateway::new(session.clone()).verify().await.unwrap();
        SubscriptionManager::new(session)
    }

    fn alice() -> MockRecordStore {
        MockRecordStore::signed_in(DiscoveredUser::anonymous(IdentityRef::new("alice")))
    }

    #[tokio::test]
    async fn registers_silent_subscription_for_own_messages() {
        let remote = alice();
        let manager = manager(&remote).await;

        let id = manager.ensure_subscribed().await.unwrap();

        assert_eq!(id, SubscriptionId::incoming_messages());
        let specs = remote.subscriptions();
        assert_eq!(specs.len(), 1);
        assert!(specs[0].silent);
        assert_eq!(
            specs[0].predicate,
            Predicate::reference_equals(field::RECEIVER, IdentityRef::new("alice"))
        );
        assert_eq!(specs[0].notification_fields, vec!["sender", "senderFirstName"]);
    }

    #[tokio::test]
    async fn second_call_makes_no_remote_call() {
        let remote = alice();
        let manager = manager(&remote).await;

        manager.ensure_subscribed().await.unwrap();
        manager.ensure_subscribed().await.unwrap();

        assert_eq!(remote.calls(MockOp::CreateSubscription), 1);
    }

    #[tokio::test]
    async fn already_exists_is_success() {
        let remote = alice();
        let manager = manager(&remote).await;
        remote.fail_next(
            MockOp::CreateSubscription,
            RemoteError::new(RemoteErrorCode::AlreadyExists, "duplicate"),
        );

        let id = manager.ensure_subscribed().await.unwrap();

        assert_eq!(id, SubscriptionId::incoming_messages());
        assert_eq!(manager.subscription_id().await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn failure_persists_nothing() {
        let remote = alice();
        let manager = manager(&remote).await;
        remote.fail_next(
            MockOp::CreateSubscription,
            RemoteError::new(RemoteErrorCode::NetworkUnavailable, "offline"),
        );

        let err = manager.ensure_subscribed().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(manager.subscription_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn requires_discoverability() {
        let remote = alice();
        remote.set_permission_status(PermissionStatus::Initial);
        let manager = manager(&remote).await;

        let err = manager.ensure_subscribed().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingDiscoveryPermission);
        assert_eq!(remote.calls(MockOp::CreateSubscription), 0);
    }

    #[tokio::test]
    async fn reset_forgets_id() {
        let remote = alice();
        let manager = manager(&remote).await;
        manager.ensure_subscribed().await.unwrap();

        manager.reset().await.unwrap();

        assert_eq!(manager.subscription_id().await.unwrap(), None);
    }
}
