//! # cloudmsg-types
//!
//! Value types shared by every cloudmsg crate:
//! - [`RecordId`], [`IdentityRef`], [`AssetRef`], [`SubscriptionId`], [`ChangeToken`] - identifiers and cursors
//! - [`Record`], [`MessageFields`] - the remote record schema, validated once at the boundary
//! - [`Message`], [`OutgoingMessage`], [`DiscoveredUser`] - what applications see
//! - [`PushNotification`] - inbound push payloads
//! - [`ErrorKind`], [`RemoteError`] - the stable error taxonomy and the low-level errors it is built from

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod message;
mod notification;
mod record;

pub use error::{ErrorKind, RemoteError, RemoteErrorCode};
pub use ids::{AssetRef, ChangeToken, IdentityRef, RecordId, SubscriptionId};
pub use message::{Contact, DiscoveredUser, Message, OutgoingMessage, ValidationError};
pub use notification::{NotificationError, PushNotification};
pub use record::{
    field, FieldValue, MessageFields, Record, RecordFields, SchemaError,
    INCOMING_MESSAGES_SUBSCRIPTION, MESSAGE_RECORD_TYPE,
};
