//! Push notification payloads.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{RecordFields, RecordId};

/// Errors parsing a raw push payload.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The payload is not valid JSON of the expected shape.
    #[error("malformed push payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A push event referencing a newly created record.
///
/// `fields` carries whatever the subscription asked the service to inline
/// (for messages: `sender` and `senderFirstName`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    /// Type of the record that triggered the push.
    pub record_type: String,
    /// Name of that record.
    pub record_id: RecordId,
    /// Inline field values.
    #[serde(default)]
    pub fields: RecordFields,
}

impl PushNotification {
    /// Parse a JSON payload as delivered by the push gateway.
    pub fn from_json(payload: &[u8]) -> Result<Self, NotificationError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Serialize to the JSON payload format.
    pub fn to_json(&self) -> Result<Vec<u8>, NotificationError> {
        Ok(serde_json::to_vec(self)?)
    }
}
