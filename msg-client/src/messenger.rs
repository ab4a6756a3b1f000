//! The messenger context object.

use crate::account::AccountGateway;
use crate::config::MessengerConfig;
use crate::discovery::{AddressBook, DiscoveryService};
use crate::error::MessengerError;
use crate::notification::NotificationTranslator;
use crate::remote::RemoteRecordStore;
use crate::repository::MessageRepository;
use crate::session::Session;
use crate::store::{KeyValueStore, StateStore};
use crate::subscription::SubscriptionManager;
use cloudmsg_core::StoreKey;
use cloudmsg_types::{ChangeToken, IdentityRef, SubscriptionId};
use std::sync::Arc;

/// What is currently persisted, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedState {
    /// Identity recorded by the last successful verify.
    pub last_known_identity: Option<IdentityRef>,
    /// Registered subscription.
    pub subscription_id: Option<SubscriptionId>,
    /// Committed change token, if it belongs to the current subscription.
    pub change_token: Option<ChangeToken>,
    /// True if the token key holds a value for another subscription (or an
    /// undecodable one).
    pub change_token_ignored: bool,
}

/// Entry point: owns the collaborators and hands out the components.
///
/// One instance per installation. Components share state through the
/// messenger, so take them from the same instance.
pub struct Messenger {
    session: Arc<Session>,
    account: AccountGateway,
    discovery: DiscoveryService,
    subscriptions: SubscriptionManager,
    messages: MessageRepository,
    notifications: NotificationTranslator,
}

impl Messenger {
    /// Wire up a messenger.
    pub fn new(
        config: MessengerConfig,
        remote: Arc<dyn RemoteRecordStore>,
        store: Arc<dyn KeyValueStore>,
        address_book: Arc<dyn AddressBook>,
    ) -> Self {
        tracing::debug!("Messenger for container {}", config.remote.container);
        let session = Arc::new(Session::new(config, remote, StateStore::new(store)));
        Self {
            account: AccountGateway::new(session.clone()),
            discovery: DiscoveryService::new(session.clone(), address_book),
            subscriptions: SubscriptionManager::new(session.clone()),
            messages: MessageRepository::new(session.clone()),
            notifications: NotificationTranslator::new(session.clone()),
            session,
        }
    }

    /// Account verification.
    pub fn account(&self) -> &AccountGateway {
        &self.account
    }

    /// Consent and contact discovery.
    pub fn discovery(&self) -> &DiscoveryService {
        &self.discovery
    }

    /// Push subscription.
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Message records.
    pub fn messages(&self) -> &MessageRepository {
        &self.messages
    }

    /// Push translation.
    pub fn notifications(&self) -> &NotificationTranslator {
        &self.notifications
    }

    /// Active configuration.
    pub fn config(&self) -> &MessengerConfig {
        &self.session.config
    }

    /// Start over after `verify` reported `AccountChanged`.
    ///
    /// Clears the subscription id and change token, then records the newly
    /// signed-in identity. Run `verify` again afterwards.
    pub async fn reset_account(&self) -> Result<(), MessengerError> {
        self.subscriptions.reset().await?;
        self.messages.reset_token().await?;
        self.account.reset_identity().await?;
        tracing::info!("Account state reset");
        Ok(())
    }

    /// Read every persisted value.
    pub async fn persisted_state(&self) -> Result<PersistedState, MessengerError> {
        let store = &self.session.store;
        let change_token = store.change_token().await?;
        let change_token_ignored =
            change_token.is_none() && store.contains(StoreKey::ChangeToken).await?;
        Ok(PersistedState {
            last_known_identity: store.last_known_identity().await?,
            subscription_id: store.subscription_id().await?,
            change_token,
            change_token_ignored,
        })
    }
}
