//! Local key-value persistence.
//!
//! The messenger persists three values (see [`StoreKey`]). Each component
//! reads and writes only its own key through [`StateStore`], which applies the
//! versioned codec on top of a raw [`KeyValueStore`].

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use cloudmsg_core::persisted::{self, PersistedValue};
use cloudmsg_core::{
    CodecError, PersistedIdentity, PersistedSubscription, PersistedToken, StoreKey,
};
use cloudmsg_types::{ChangeToken, IdentityRef, SubscriptionId};
use std::sync::Arc;
use thiserror::Error;

/// Storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be read or written.
    #[error("storage I/O failed for {key}: {source}")]
    Io {
        /// Key being accessed.
        key: &'static str,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A value could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Raw byte storage keyed by [`StoreKey`].
///
/// `set` must be atomic: a reader sees either the old or the new value.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` if the key was never written.
    async fn get(&self, key: StoreKey) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace a value.
    async fn set(&self, key: StoreKey, value: Vec<u8>) -> Result<(), StoreError>;

    /// Delete a value. Removing a missing key is not an error.
    async fn remove(&self, key: StoreKey) -> Result<(), StoreError>;
}

/// Typed access to the persisted keys.
#[derive(Clone)]
pub(crate) struct StateStore {
    inner: Arc<dyn KeyValueStore>,
}

impl StateStore {
    pub(crate) fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    /// Read and decode; a value that fails to decode is treated as absent.
    async fn load<T: PersistedValue>(&self) -> Result<Option<T>, StoreError> {
        let Some(bytes) = self.inner.get(T::KEY).await? else {
            return Ok(None);
        };
        match persisted::decode::<T>(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!("Ignoring undecodable {}: {}", T::KEY.as_str(), e);
                Ok(None)
            }
        }
    }

    async fn save<T: PersistedValue>(&self, value: &T) -> Result<(), StoreError> {
        let bytes = persisted::encode(value)?;
        self.inner.set(T::KEY, bytes).await
    }

    pub(crate) async fn last_known_identity(&self) -> Result<Option<IdentityRef>, StoreError> {
        Ok(self.load::<PersistedIdentity>().await?.map(|p| p.id))
    }

    pub(crate) async fn set_last_known_identity(
        &self,
        id: &IdentityRef,
    ) -> Result<(), StoreError> {
        self.save(&PersistedIdentity { id: id.clone() }).await
    }

    pub(crate) async fn subscription_id(&self) -> Result<Option<SubscriptionId>, StoreError> {
        Ok(self.load::<PersistedSubscription>().await?.map(|p| p.id))
    }

    pub(crate) async fn set_subscription_id(&self, id: &SubscriptionId) -> Result<(), StoreError> {
        self.save(&PersistedSubscription { id: id.clone() }).await
    }

    /// The committed token, if it was committed under the current subscription.
    pub(crate) async fn change_token(&self) -> Result<Option<ChangeToken>, StoreError> {
        let Some(persisted) = self.load::<PersistedToken>().await? else {
            return Ok(None);
        };
        let scope = self.subscription_id().await?;
        match persisted.token_for(scope.as_ref()) {
            Some(token) => Ok(Some(token.clone())),
            None => {
                tracing::debug!("Stored change token belongs to another subscription, ignoring");
                Ok(None)
            }
        }
    }

    pub(crate) async fn set_change_token(
        &self,
        subscription: Option<SubscriptionId>,
        token: ChangeToken,
    ) -> Result<(), StoreError> {
        self.save(&PersistedToken {
            subscription,
            token,
        })
        .await
    }

    pub(crate) async fn remove(&self, key: StoreKey) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }

    /// True if `key` holds any bytes, decodable or not.
    pub(crate) async fn contains(&self, key: StoreKey) -> Result<bool, StoreError> {
        Ok(self.inner.get(key).await?.is_some())
    }
}
