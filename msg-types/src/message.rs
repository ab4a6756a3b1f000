//! Application-facing message and identity types.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{AssetRef, IdentityRef, MessageFields, RecordId};

/// Local validation failures for outgoing messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Neither text nor an image was supplied.
    #[error("a message needs text or an image")]
    Empty,

    /// The receiver identity is empty.
    #[error("a message needs a receiver")]
    MissingReceiver,
}

/// A message received through the remote store.
///
/// Starts life as a stub (identifiers and sender name) built from a query or
/// a push notification. [`Message::hydrate`] fills in text and image. The id
/// is the idempotency key: the same message may be delivered more than once.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: RecordId,
    sender: IdentityRef,
    receiver: IdentityRef,
    sender_first_name: Option<String>,
    sender_last_name: Option<String>,
    text: Option<String>,
    image: Option<AssetRef>,
    hydrated: bool,
}

impl Message {
    /// Build a stub from validated record fields.
    ///
    /// `default_receiver` is used when the source omitted the receiver, which
    /// push payloads do since the subscription already scopes them to us.
    /// Text and image are dropped even if the source carried them; only
    /// [`Message::hydrate`] fills them in.
    pub fn stub(id: RecordId, fields: MessageFields, default_receiver: &IdentityRef) -> Self {
        Self {
            id,
            sender: fields.sender,
            receiver: fields.receiver.unwrap_or_else(|| default_receiver.clone()),
            sender_first_name: fields.sender_first_name,
            sender_last_name: None,
            text: None,
            image: None,
            hydrated: false,
        }
    }

    /// Return a hydrated copy carrying the full record's text and image.
    ///
    /// The full record is authoritative for every field it carries; the sender
    /// last name (which records never carry) is kept.
    pub fn hydrate(&self, fields: MessageFields) -> Self {
        Self {
            id: self.id.clone(),
            sender: fields.sender,
            receiver: fields.receiver.unwrap_or_else(|| self.receiver.clone()),
            sender_first_name: fields
                .sender_first_name
                .or_else(|| self.sender_first_name.clone()),
            sender_last_name: self.sender_last_name.clone(),
            text: fields.text,
            image: fields.image,
            hydrated: true,
        }
    }

    /// Fill in sender names that are still unknown.
    pub fn with_sender_name(mut self, first: Option<String>, last: Option<String>) -> Self {
        if self.sender_first_name.is_none() {
            self.sender_first_name = first;
        }
        if self.sender_last_name.is_none() {
            self.sender_last_name = last;
        }
        self
    }

    /// Replace the text after hydration (late correction).
    pub fn correct_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Remote record id.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Sending identity.
    pub fn sender(&self) -> &IdentityRef {
        &self.sender
    }

    /// Receiving identity.
    pub fn receiver(&self) -> &IdentityRef {
        &self.receiver
    }

    /// Sender first name, if known.
    pub fn sender_first_name(&self) -> Option<&str> {
        self.sender_first_name.as_deref()
    }

    /// Sender last name, if known.
    pub fn sender_last_name(&self) -> Option<&str> {
        self.sender_last_name.as_deref()
    }

    /// Message body, if loaded.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Image reference, if loaded.
    pub fn image(&self) -> Option<&AssetRef> {
        self.image.as_ref()
    }

    /// True once the full record has been fetched.
    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("sender_first_name", &self.sender_first_name)
            .field("sender_last_name", &self.sender_last_name)
            .field(
                "text",
                &self
                    .text
                    .as_ref()
                    .map(|t| format!("[{} chars REDACTED]", t.chars().count())),
            )
            .field("image", &self.image)
            .field("hydrated", &self.hydrated)
            .finish()
    }
}

/// A validated send request.
///
/// The only way to build one is [`OutgoingMessage::new`], so an empty message
/// never reaches the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    text: Option<String>,
    image: Option<AssetRef>,
    receiver: IdentityRef,
}

impl OutgoingMessage {
    /// Validate and build a send request.
    ///
    /// Empty strings count as absent.
    pub fn new(
        text: Option<String>,
        image: Option<AssetRef>,
        receiver: IdentityRef,
    ) -> Result<Self, ValidationError> {
        let text = text.filter(|t| !t.is_empty());
        let image = image.filter(|i| !i.is_empty());
        if text.is_none() && image.is_none() {
            return Err(ValidationError::Empty);
        }
        if receiver.is_empty() {
            return Err(ValidationError::MissingReceiver);
        }
        Ok(Self {
            text,
            image,
            receiver,
        })
    }

    /// Message body.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Local image reference to upload.
    pub fn image(&self) -> Option<&AssetRef> {
        self.image.as_ref()
    }

    /// Destination identity.
    pub fn receiver(&self) -> &IdentityRef {
        &self.receiver
    }
}

/// A user found through discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredUser {
    /// Remote identity.
    pub identity: IdentityRef,
    /// First name, when the user shares it.
    pub first_name: Option<String>,
    /// Last name, when the user shares it.
    pub last_name: Option<String>,
}

impl DiscoveredUser {
    /// A user known only by identity.
    pub fn anonymous(identity: IdentityRef) -> Self {
        Self {
            identity,
            first_name: None,
            last_name: None,
        }
    }

    /// "First Last", falling back to the identity.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(name), None) | (None, Some(name)) => name.clone(),
            (None, None) => self.identity.to_string(),
        }
    }
}

/// An address-book entry offered to discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Name as shown in the address book.
    pub display_name: String,
    /// Email address, if any.
    pub email: Option<String>,
    /// Phone number, if any.
    pub phone: Option<String>,
}

impl Contact {
    /// Contact reachable by email.
    pub fn with_email(display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            email: Some(email.into()),
            phone: None,
        }
    }
}
