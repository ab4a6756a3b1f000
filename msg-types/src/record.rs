//! Remote record schema.
//!
//! Records cross the collaborator boundary as a loosely typed [`RecordFields`]
//! map. Inside the core they are [`MessageFields`], validated exactly once by
//! [`MessageFields::from_record`]. Field names are part of the wire contract
//! and must not change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::{AssetRef, IdentityRef, RecordId};

/// Record type name for messages.
pub const MESSAGE_RECORD_TYPE: &str = "Message";

/// Logical id of the new-message subscription.
pub const INCOMING_MESSAGES_SUBSCRIPTION: &str = "IncomingMessages";

/// Wire names of the message record fields.
pub mod field {
    /// Message body (string).
    pub const TEXT: &str = "text";
    /// Attached image (asset).
    pub const IMAGE: &str = "image";
    /// Sending identity (reference).
    pub const SENDER: &str = "sender";
    /// Sender's first name, denormalized for cheap stub display (string).
    pub const SENDER_FIRST_NAME: &str = "senderFirstName";
    /// Receiving identity (reference).
    pub const RECEIVER: &str = "receiver";

    /// Fields cheap enough to carry in stubs and push payloads.
    pub const STUB_FIELDS: &[&str] = &[SENDER, SENDER_FIRST_NAME, RECEIVER];
}

/// A single typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldValue {
    /// A string scalar.
    String(String),
    /// A reference to an identity.
    Reference(IdentityRef),
    /// A binary asset.
    Asset(AssetRef),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            FieldValue::String(_) => "string",
            FieldValue::Reference(_) => "reference",
            FieldValue::Asset(_) => "asset",
        }
    }
}

/// Field map as exchanged with the remote store.
pub type RecordFields = BTreeMap<String, FieldValue>;

/// A record as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Record name.
    pub id: RecordId,
    /// Record type name.
    pub record_type: String,
    /// Field values.
    #[serde(default)]
    pub fields: RecordFields,
}

/// Schema violations found while validating a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The record is not a message record.
    #[error("unexpected record type: {0}")]
    WrongRecordType(String),

    /// A required field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A known field holds the wrong kind of value.
    #[error("field {field} should be a {expected}, found a {found}")]
    WrongType {
        /// Field name.
        field: &'static str,
        /// Expected value kind.
        expected: &'static str,
        /// Actual value kind.
        found: &'static str,
    },
}

/// The fixed field set of a `Message` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFields {
    /// Sending identity. Always present.
    pub sender: IdentityRef,
    /// Receiving identity. Absent when the source omitted it (push payloads).
    pub receiver: Option<IdentityRef>,
    /// Denormalized sender first name.
    pub sender_first_name: Option<String>,
    /// Message body.
    pub text: Option<String>,
    /// Attached image.
    pub image: Option<AssetRef>,
}

impl MessageFields {
    /// Validate a full record: its type and its fields.
    pub fn from_record(record: &Record) -> Result<Self, SchemaError> {
        if record.record_type != MESSAGE_RECORD_TYPE {
            return Err(SchemaError::WrongRecordType(record.record_type.clone()));
        }
        Self::from_fields(&record.fields)
    }

    /// Validate a field map. Unknown fields are ignored.
    pub fn from_fields(fields: &RecordFields) -> Result<Self, SchemaError> {
        let sender = reference(fields, field::SENDER)?
            .ok_or(SchemaError::MissingField(field::SENDER))?;
        Ok(Self {
            sender,
            receiver: reference(fields, field::RECEIVER)?,
            sender_first_name: string(fields, field::SENDER_FIRST_NAME)?,
            text: string(fields, field::TEXT)?,
            image: asset(fields, field::IMAGE)?,
        })
    }

    /// Convert back to the wire representation, omitting absent fields.
    pub fn to_fields(&self) -> RecordFields {
        let mut fields = RecordFields::new();
        fields.insert(field::SENDER.into(), FieldValue::Reference(self.sender.clone()));
        if let Some(receiver) = &self.receiver {
            fields.insert(field::RECEIVER.into(), FieldValue::Reference(receiver.clone()));
        }
        if let Some(name) = &self.sender_first_name {
            fields.insert(field::SENDER_FIRST_NAME.into(), FieldValue::String(name.clone()));
        }
        if let Some(text) = &self.text {
            fields.insert(field::TEXT.into(), FieldValue::String(text.clone()));
        }
        if let Some(image) = &self.image {
            fields.insert(field::IMAGE.into(), FieldValue::Asset(image.clone()));
        }
        fields
    }
}

fn wrong_type(field: &'static str, expected: &'static str, value: &FieldValue) -> SchemaError {
    SchemaError::WrongType {
        field,
        expected,
        found: value.kind(),
    }
}

fn reference(
    fields: &RecordFields,
    name: &'static str,
) -> Result<Option<IdentityRef>, SchemaError> {
    match fields.get(name) {
        None => Ok(None),
        Some(FieldValue::Reference(id)) => Ok(Some(id.clone())),
        Some(other) => Err(wrong_type(name, "reference", other)),
    }
}

fn string(fields: &RecordFields, name: &'static str) -> Result<Option<String>, SchemaError> {
    match fields.get(name) {
        None => Ok(None),
        Some(FieldValue::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(wrong_type(name, "string", other)),
    }
}

fn asset(fields: &RecordFields, name: &'static str) -> Result<Option<AssetRef>, SchemaError> {
    match fields.get(name) {
        None => Ok(None),
        Some(FieldValue::Asset(a)) => Ok(Some(a.clone())),
        Some(other) => Err(wrong_type(name, "asset", other)),
    }
}
