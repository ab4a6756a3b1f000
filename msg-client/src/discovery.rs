//! Discoverability consent and contact discovery.

use crate::error::MessengerError;
use crate::session::Session;
use cloudmsg_core::PromptDecision;
use cloudmsg_types::{Contact, DiscoveredUser, ErrorKind};
use std::collections::HashSet;
use std::sync::Arc;

/// Local source of contacts offered to discovery.
pub trait AddressBook: Send + Sync {
    /// All contacts. An address book that cannot be read yields none.
    fn contacts(&self) -> Vec<Contact>;
}

/// Address book with a fixed contact list.
#[derive(Debug, Clone, Default)]
pub struct StaticAddressBook {
    contacts: Vec<Contact>,
}

impl StaticAddressBook {
    /// Wrap a contact list.
    pub fn new(contacts: Vec<Contact>) -> Self {
        Self { contacts }
    }
}

impl AddressBook for StaticAddressBook {
    fn contacts(&self) -> Vec<Contact> {
        self.contacts.clone()
    }
}

/// Requests discoverability consent and resolves contacts to identities.
pub struct DiscoveryService {
    session: Arc<Session>,
    address_book: Arc<dyn AddressBook>,
}

impl DiscoveryService {
    pub(crate) fn new(session: Arc<Session>, address_book: Arc<dyn AddressBook>) -> Self {
        Self {
            session,
            address_book,
        }
    }

    /// Obtain discoverability consent if needed, then look up the current user.
    ///
    /// An undecided answer to the consent request is re-requested once.
    pub async fn prompt_and_discover(&self) -> Result<DiscoveredUser, MessengerError> {
        let identity = self.session.active_identity().await?;
        let remote = &self.session.remote;

        let mut status = self.session.account_state().await.permission_status;
        let mut requests = 0;
        loop {
            match status.prompt_decision(requests) {
                PromptDecision::Proceed => break,
                PromptDecision::Refuse => {
                    self.session.set_permission(status).await;
                    tracing::info!("Discoverability not granted ({:?})", status);
                    return Err(ErrorKind::MissingDiscoveryPermission.into());
                }
                PromptDecision::Request => {
                    requests += 1;
                    status = remote.request_permission().await?;
                    tracing::debug!("Permission request {} answered {:?}", requests, status);
                }
            }
        }
        self.session.set_permission(status).await;

        let user = remote.fetch_identity(&identity).await?;
        self.session.set_identity_user(user.clone()).await;
        tracing::info!("Discovered current user {}", user.identity);
        Ok(user)
    }

    /// Resolve the address book to discoverable users.
    ///
    /// Keeps the directory's order and drops repeated identities. Fails with
    /// `MissingDiscoveryPermission` without a remote call if consent was never
    /// granted.
    pub async fn discover_all_friends(&self) -> Result<Vec<DiscoveredUser>, MessengerError> {
        self.session.ready_identity().await?;

        let contacts = self.address_book.contacts();
        if contacts.is_empty() {
            tracing::debug!("Address book is empty, nothing to discover");
            return Ok(Vec::new());
        }

        let found = self.session.remote.fetch_identities(&contacts).await?;
        let mut seen = HashSet::new();
        let friends: Vec<DiscoveredUser> = found
            .into_iter()
            .filter(|user| seen.insert(user.identity.clone()))
            .collect();

        tracing::info!(
            "Discovered {} of {} contacts",
            friends.len(),
            contacts.len()
        );
        Ok(friends)
    }
}
