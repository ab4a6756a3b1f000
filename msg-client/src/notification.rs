//! Push notification translation.

use crate::error::MessengerError;
use crate::session::Session;
use cloudmsg_types::{ErrorKind, Message, MessageFields, PushNotification, MESSAGE_RECORD_TYPE};
use std::sync::Arc;

/// Turns push payloads into message stubs without a remote call.
pub struct NotificationTranslator {
    session: Arc<Session>,
}

impl NotificationTranslator {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Build a stub from the fields inlined in a push notification.
    ///
    /// Only `Message` notifications are accepted. A payload without a
    /// receiver is addressed to the active identity.
    pub async fn translate(
        &self,
        notification: &PushNotification,
    ) -> Result<Message, MessengerError> {
        if notification.record_type != MESSAGE_RECORD_TYPE {
            tracing::warn!(
                "Ignoring push for record type {:?}",
                notification.record_type
            );
            return Err(ErrorKind::Unexpected.into());
        }

        let fields = MessageFields::from_fields(&notification.fields)?;
        let receiver = match &fields.receiver {
            Some(receiver) => receiver.clone(),
            None => self.session.active_identity().await?,
        };

        tracing::debug!("Translated push for message {}", notification.record_id);
        Ok(Message::stub(
            notification.record_id.clone(),
            fields,
            &receiver,
        ))
    }

    /// Parse a raw JSON payload and translate it.
    pub async fn translate_json(&self, payload: &[u8]) -> Result<Message, MessengerError> {
        let notification = PushNotification::from_json(payload)?;
        self.translate(&notification).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRecordStore;
    use crate::store::{MemoryStore, StateStore};
    use crate::{AccountGateway, MessengerConfig};
    use cloudmsg_types::{
        field, AssetRef, DiscoveredUser, FieldValue, IdentityRef, RecordFields, RecordId,
    };

    async fn translator(verify: bool) -> (NotificationTranslator, MockRecordStore) {
        let remote = MockRecordStore::signed_in(DiscoveredUser::anonymous(IdentityRef::new("alice")));
        let session = Arc::new(Session::new(
            MessengerConfig::default(),
            Arc::new(remote.clone()),
            StateStore::new(Arc::new(MemoryStore::new())),
        ));
        if verify {
            AccountGateway::new(session.clone()).verify().await.unwrap();
        }
        remote.reset_calls();
        (NotificationTranslator::new(session), remote)
    }

    fn push(record_type: &str, fields: RecordFields) -> PushNotification {
        PushNotification {
            record_type: record_type.into(),
            record_id: RecordId::new("r-7"),
            fields,
        }
    }

    fn sender_fields() -> RecordFields {
        let mut fields = RecordFields::new();
        fields.insert(
            field::SENDER.into(),
            FieldValue::Reference(IdentityRef::new("bob")),
        );
        fields.insert(field::SENDER_FIRST_NAME.into(), FieldValue::String("Bob".into()));
        fields
    }

    #[tokio::test]
    async fn message_push_becomes_stub_for_active_identity() {
        let (translator, remote) = translator(true).await;

        let stub = translator
            .translate(&push(MESSAGE_RECORD_TYPE, sender_fields()))
            .await
            .unwrap();

        assert_eq!(stub.id(), &RecordId::new("r-7"));
        assert_eq!(stub.sender(), &IdentityRef::new("bob"));
        assert_eq!(stub.sender_first_name(), Some("Bob"));
        assert_eq!(stub.receiver(), &IdentityRef::new("alice"));
        assert!(stub.text().is_none());
        assert_eq!(remote.total_calls(), 0);
    }

    #[tokio::test]
    async fn inlined_body_fields_stay_out_of_the_stub() {
        let (translator, _) = translator(true).await;
        let mut fields = sender_fields();
        fields.insert(field::TEXT.into(), FieldValue::String("hi".into()));
        fields.insert(
            field::IMAGE.into(),
            FieldValue::Asset(AssetRef::new("asset-1")),
        );

        let stub = translator
            .translate(&push(MESSAGE_RECORD_TYPE, fields))
            .await
            .unwrap();

        assert!(stub.text().is_none());
        assert!(stub.image().is_none());
        assert!(!stub.is_hydrated());
        assert_eq!(stub.sender_first_name(), Some("Bob"));
    }

    #[tokio::test]
    async fn other_record_type_is_unexpected() {
        let (translator, _) = translator(true).await;

        let err = translator
            .translate(&push("Contact", sender_fields()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }

    #[tokio::test]
    async fn missing_sender_is_unexpected() {
        let (translator, _) = translator(true).await;

        let err = translator
            .translate(&push(MESSAGE_RECORD_TYPE, RecordFields::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, MessengerError::Schema(_)));
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }

    #[tokio::test]
    async fn explicit_receiver_needs_no_session() {
        let (translator, _) = translator(false).await;
        let mut fields = sender_fields();
        fields.insert(
            field::RECEIVER.into(),
            FieldValue::Reference(IdentityRef::new("alice")),
        );

        let stub = translator
            .translate(&push(MESSAGE_RECORD_TYPE, fields))
            .await
            .unwrap();
        assert_eq!(stub.receiver(), &IdentityRef::new("alice"));
    }

    #[tokio::test]
    async fn raw_json_payload() {
        let (translator, _) = translator(true).await;
        let payload = br#"{"recordType":"Message","recordId":"r-9","fields":{"sender":{"reference":"bob"}}}"#;

        let stub = translator.translate_json(payload).await.unwrap();
        assert_eq!(stub.id(), &RecordId::new("r-9"));

        let err = translator.translate_json(b"{not json").await.unwrap_err();
        assert!(matches!(err, MessengerError::Payload(_)));
    }
}
