//! Versioned encoding of the persisted keys.
//!
//! Each key holds a MessagePack map `{v, data}` written with named fields.
//! Unknown fields written by a newer build are ignored on read, and fields a
//! newer build added are `#[serde(default)]`, so installs can move between
//! versions in either direction. A value that still fails to decode is
//! reported as a [`CodecError`] and treated as absent by the caller.

use cloudmsg_types::{ChangeToken, IdentityRef, SubscriptionId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema version written by this build.
pub const SCHEMA_VERSION: u16 = 1;

/// The three keys the messenger persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Identity seen on the last successful verify. Owned by the account gateway.
    LastKnownIdentity,
    /// Registered subscription. Owned by the subscription manager.
    SubscriptionId,
    /// Last committed change token. Owned by the message repository.
    ChangeToken,
}

impl StoreKey {
    /// All keys.
    pub const ALL: [StoreKey; 3] = [
        StoreKey::LastKnownIdentity,
        StoreKey::SubscriptionId,
        StoreKey::ChangeToken,
    ];

    /// Key name in the key-value store.
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKey::LastKnownIdentity => "lastKnownIdentity",
            StoreKey::SubscriptionId => "subscriptionId",
            StoreKey::ChangeToken => "changeToken",
        }
    }
}

/// Codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// MessagePack serialization failed.
    #[error("encoding failed: {0}")]
    Encode(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed.
    #[error("decoding failed: {0}")]
    Decode(#[source] rmp_serde::decode::Error),

    /// The stored version is not a valid schema version.
    #[error("unsupported schema version: {0}")]
    UnsupportedVersion(u16),
}

/// A value stored under one [`StoreKey`].
pub trait PersistedValue: Serialize + DeserializeOwned {
    /// The key this value lives under.
    const KEY: StoreKey;
}

/// Payload of [`StoreKey::LastKnownIdentity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedIdentity {
    /// Identity reference.
    pub id: IdentityRef,
}

impl PersistedValue for PersistedIdentity {
    const KEY: StoreKey = StoreKey::LastKnownIdentity;
}

/// Payload of [`StoreKey::SubscriptionId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSubscription {
    /// Subscription id.
    pub id: SubscriptionId,
}

impl PersistedValue for PersistedSubscription {
    const KEY: StoreKey = StoreKey::SubscriptionId;
}

/// Payload of [`StoreKey::ChangeToken`].
///
/// The token is scoped to the subscription it was fetched under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedToken {
    /// Subscription in effect when the token was committed.
    #[serde(default)]
    pub subscription: Option<SubscriptionId>,
    /// The token itself.
    pub token: ChangeToken,
}

impl PersistedToken {
    /// The token if it belongs to `scope`, otherwise `None`.
    pub fn token_for(&self, scope: Option<&SubscriptionId>) -> Option<&ChangeToken> {
        (self.subscription.as_ref() == scope).then_some(&self.token)
    }
}

impl PersistedValue for PersistedToken {
    const KEY: StoreKey = StoreKey::ChangeToken;
}

#[derive(Serialize)]
struct VersionedRef<'a, T> {
    v: u16,
    data: &'a T,
}

#[derive(Deserialize)]
struct Versioned<T> {
    data: T,
}

#[derive(Deserialize)]
struct Header {
    v: u16,
}

/// Encode a value with the current schema version.
pub fn encode<T: PersistedValue>(value: &T) -> Result<Vec<u8>, CodecError> {
    encode_versioned(SCHEMA_VERSION, value)
}

fn encode_versioned<T: Serialize>(version: u16, value: &T) -> Result<Vec<u8>, CodecError> {
    rmp_serde::to_vec_named(&VersionedRef {
        v: version,
        data: value,
    })
    .map_err(CodecError::Encode)
}

/// Decode a value written by any schema version.
pub fn decode<T: PersistedValue>(bytes: &[u8]) -> Result<T, CodecError> {
    let header: Header = rmp_serde::from_slice(bytes).map_err(CodecError::Decode)?;
    if header.v == 0 {
        return Err(CodecError::UnsupportedVersion(header.v));
    }
    let versioned: Versioned<T> = rmp_serde::from_slice(bytes).map_err(CodecError::Decode)?;
    Ok(versioned.data)
}
