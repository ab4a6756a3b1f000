//! Identifier and cursor types for cloudmsg.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::INCOMING_MESSAGES_SUBSCRIPTION;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// The identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True if the identifier is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id! {
    /// Name of a record in the remote store.
    ///
    /// Stable and unique; doubles as the idempotency key for downstream consumers.
    RecordId
}

string_id! {
    /// Reference to a user account within the remote service.
    IdentityRef
}

string_id! {
    /// Reference to a binary asset (an image).
    ///
    /// Before upload this is a local path; after upload it names the remote asset.
    AssetRef
}

string_id! {
    /// Server-side subscription identifier.
    SubscriptionId
}

impl RecordId {
    /// Generate a fresh client-side record name (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl SubscriptionId {
    /// The one subscription every installation registers.
    pub fn incoming_messages() -> Self {
        Self::new(INCOMING_MESSAGES_SUBSCRIPTION)
    }
}

/// Opaque cursor into the remote message stream.
///
/// Only the remote store interprets the bytes. Displayed as URL-safe base64.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeToken(Vec<u8>);

impl ChangeToken {
    /// Create a token from raw bytes handed out by the remote store.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw token bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parse the base64 form produced by `Display`.
    pub fn from_base64(encoded: &str) -> Option<Self> {
        URL_SAFE_NO_PAD.decode(encoded).ok().map(Self)
    }
}

impl fmt::Display for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", URL_SAFE_NO_PAD.encode(&self.0))
    }
}

impl fmt::Debug for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_string();
        let shown = encoded.get(..12).unwrap_or(&encoded);
        write!(f, "ChangeToken({})", shown)
    }
}
