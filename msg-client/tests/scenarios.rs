//! End-to-end messenger scenarios against the mock remote store.
//!
//! | Scenario | What it covers |
//! |----------|----------------|
//! | first_run_* | verify → consent → subscribe → fetch |
//! | fetch_* | ordered batches, empty re-fetch, commit-after-success |
//! | send_* | validation before any network call, delivery to the receiver |
//! | concurrent_* | serialized subscription registration, concurrent commits |
//! | account_* | identity change detection and reset |
//! | push_* | notification translation and hydration |

use async_trait::async_trait;
use cloudmsg_client::remote::{QueryPage, RecordQuery, SubscriptionSpec};
use cloudmsg_client::{
    FileStore, MemoryStore, Messenger, MessengerConfig, MessengerError, MockOp, MockRecordStore,
    RemoteRecordStore, StaticAddressBook,
};
use cloudmsg_core::{AccountStatus, PermissionStatus};
use cloudmsg_types::{
    field, AssetRef, Contact, DiscoveredUser, ErrorKind, FieldValue, IdentityRef,
    OutgoingMessage, PushNotification, Record, RecordFields, RecordId, RemoteError,
    RemoteErrorCode, SubscriptionId, MESSAGE_RECORD_TYPE,
};
use std::sync::Arc;
use tokio::sync::Notify;

fn user(id: &str, first: &str, last: &str) -> DiscoveredUser {
    DiscoveredUser {
        identity: IdentityRef::new(id),
        first_name: Some(first.into()),
        last_name: Some(last.into()),
    }
}

fn alice() -> DiscoveredUser {
    user("alice", "Alice", "Liddell")
}

fn bob() -> DiscoveredUser {
    user("bob", "Bob", "Byrne")
}

fn carol() -> DiscoveredUser {
    user("carol", "Carol", "Crane")
}

fn messenger_with(remote: &MockRecordStore, contacts: Vec<Contact>) -> Messenger {
    let mut config = MessengerConfig::default();
    config.send.base_backoff_ms = 0;
    config.send.max_backoff_ms = 0;
    Messenger::new(
        config,
        Arc::new(remote.clone()),
        Arc::new(MemoryStore::new()),
        Arc::new(StaticAddressBook::new(contacts)),
    )
}

fn messenger(remote: &MockRecordStore) -> Messenger {
    messenger_with(remote, Vec::new())
}

/// A message from `sender` to `receiver`, stored as if another device sent it.
fn message_record(id: &str, sender: &DiscoveredUser, receiver: &str, text: &str) -> Record {
    let mut fields = RecordFields::new();
    fields.insert(
        field::SENDER.into(),
        FieldValue::Reference(sender.identity.clone()),
    );
    if let Some(first) = &sender.first_name {
        fields.insert(field::SENDER_FIRST_NAME.into(), FieldValue::String(first.clone()));
    }
    fields.insert(
        field::RECEIVER.into(),
        FieldValue::Reference(IdentityRef::new(receiver)),
    );
    fields.insert(field::TEXT.into(), FieldValue::String(text.into()));
    Record {
        id: RecordId::new(id),
        record_type: MESSAGE_RECORD_TYPE.into(),
        fields,
    }
}

/// An image-only message from `sender` to `receiver`.
fn image_record(id: &str, sender: &DiscoveredUser, receiver: &str, image: &str) -> Record {
    let mut record = message_record(id, sender, receiver, "");
    record.fields.remove(field::TEXT);
    record
        .fields
        .insert(field::IMAGE.into(), FieldValue::Asset(AssetRef::new(image)));
    record
}

/// Passes every call to the mock, but holds `create_subscription` after the
/// subscription was registered until `release` is notified.
#[derive(Clone)]
struct HeldSubscription {
    inner: MockRecordStore,
    created: Arc<Notify>,
    release: Arc<Notify>,
}

impl HeldSubscription {
    fn new(inner: MockRecordStore) -> Self {
        Self {
            inner,
            created: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl RemoteRecordStore for HeldSubscription {
    async fn account_status(&self) -> Result<AccountStatus, RemoteError> {
        self.inner.account_status().await
    }

    async fn permission_status(&self) -> Result<PermissionStatus, RemoteError> {
        self.inner.permission_status().await
    }

    async fn request_permission(&self) -> Result<PermissionStatus, RemoteError> {
        self.inner.request_permission().await
    }

    async fn fetch_current_identity(&self) -> Result<IdentityRef, RemoteError> {
        self.inner.fetch_current_identity().await
    }

    async fn fetch_identity(&self, identity: &IdentityRef) -> Result<DiscoveredUser, RemoteError> {
        self.inner.fetch_identity(identity).await
    }

    async fn fetch_identities(
        &self,
        contacts: &[Contact],
    ) -> Result<Vec<DiscoveredUser>, RemoteError> {
        self.inner.fetch_identities(contacts).await
    }

    async fn create_record(&self, record: Record) -> Result<Record, RemoteError> {
        self.inner.create_record(record).await
    }

    async fn query_records(&self, query: &RecordQuery) -> Result<QueryPage, RemoteError> {
        self.inner.query_records(query).await
    }

    async fn fetch_record(&self, id: &RecordId) -> Result<Record, RemoteError> {
        self.inner.fetch_record(id).await
    }

    async fn create_subscription(
        &self,
        spec: &SubscriptionSpec,
    ) -> Result<SubscriptionId, RemoteError> {
        let result = self.inner.create_subscription(spec).await;
        self.created.notify_one();
        self.release.notified().await;
        result
    }

    async fn upload_asset(&self, local: &AssetRef) -> Result<AssetRef, RemoteError> {
        self.inner.upload_asset(local).await
    }

    async fn delete_asset(&self, asset: &AssetRef) -> Result<(), RemoteError> {
        self.inner.delete_asset(asset).await
    }
}

// ===========================================
// First Run
// ===========================================

#[tokio::test]
async fn first_run_full_flow() {
    let remote = MockRecordStore::signed_in(alice());
    remote.set_permission_status(PermissionStatus::Initial);
    remote.add_directory_user(bob(), &["bob@example.com"]);
    remote.insert_record(message_record("r1", &bob(), "alice", "welcome"));
    let messenger = messenger_with(&remote, vec![Contact::with_email("Bob", "bob@example.com")]);

    let me = messenger.account().verify().await.unwrap();
    assert_eq!(me.identity, IdentityRef::new("alice"));

    let me = messenger.discovery().prompt_and_discover().await.unwrap();
    assert_eq!(me.display_name(), "Alice Liddell");

    let friends = messenger.discovery().discover_all_friends().await.unwrap();
    assert_eq!(friends, vec![bob()]);

    let id = messenger.subscriptions().ensure_subscribed().await.unwrap();
    assert_eq!(id, SubscriptionId::incoming_messages());

    let batch = messenger.messages().fetch_new_since_last().await.unwrap();
    assert_eq!(batch.len(), 1);
    let full = messenger
        .messages()
        .fetch_details(&batch.messages()[0])
        .await
        .unwrap();
    assert_eq!(full.text(), Some("welcome"));
    assert_eq!(full.sender_last_name(), Some("Byrne"));
    messenger.messages().commit(&batch).await.unwrap();

    let state = messenger.persisted_state().await.unwrap();
    assert_eq!(state.last_known_identity, Some(IdentityRef::new("alice")));
    assert_eq!(state.subscription_id, Some(SubscriptionId::incoming_messages()));
    assert_eq!(state.change_token.as_ref(), Some(batch.token()));
}

#[tokio::test]
async fn first_run_without_account() {
    let remote = MockRecordStore::new();
    let messenger = messenger(&remote);

    let err = messenger.account().verify().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountProblem);

    let err = messenger
        .subscriptions()
        .ensure_subscribed()
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountProblem);
    assert_eq!(remote.calls(MockOp::CreateSubscription), 0);
}

// ===========================================
// Fetch
// ===========================================

#[tokio::test]
async fn fetch_two_records_then_nothing() {
    let remote = MockRecordStore::signed_in(alice());
    remote.insert_record(message_record("R1", &carol(), "alice", "hi"));
    remote.insert_record(image_record("R2", &bob(), "alice", "imgRef"));
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();

    let batch = messenger.messages().fetch_new(None).await.unwrap();
    let ids: Vec<&str> = batch.messages().iter().map(|m| m.id().as_str()).collect();
    assert_eq!(ids, vec!["R1", "R2"]);

    let (r1, r2) = (&batch.messages()[0], &batch.messages()[1]);
    assert_eq!(r1.sender(), &IdentityRef::new("carol"));
    assert_eq!(r2.sender(), &IdentityRef::new("bob"));
    assert_eq!(r2.sender_first_name(), Some("Bob"));
    for stub in batch.messages() {
        assert!(stub.text().is_none());
        assert!(stub.image().is_none());
        assert!(!stub.is_hydrated());
    }

    let first = messenger.messages().fetch_details(r1).await.unwrap();
    assert_eq!(first.text(), Some("hi"));
    assert!(first.image().is_none());
    let second = messenger.messages().fetch_details(r2).await.unwrap();
    assert!(second.text().is_none());
    assert_eq!(second.image(), Some(&AssetRef::new("imgRef")));

    let again = messenger
        .messages()
        .fetch_new(Some(batch.token().clone()))
        .await
        .unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn fetch_only_sees_own_messages() {
    let remote = MockRecordStore::signed_in(alice());
    remote.insert_record(message_record("to-alice", &bob(), "alice", "hi alice"));
    remote.insert_record(message_record("to-carol", &bob(), "carol", "hi carol"));
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();

    let batch = messenger.messages().fetch_new(None).await.unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch.messages()[0].id(), &RecordId::new("to-alice"));
}

#[tokio::test]
async fn fetch_commit_then_new_arrivals_only() {
    let remote = MockRecordStore::signed_in(alice());
    remote.insert_record(message_record("old", &bob(), "alice", "old"));
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();
    messenger.subscriptions().ensure_subscribed().await.unwrap();

    let first = messenger.messages().fetch_new_since_last().await.unwrap();
    messenger.messages().commit(&first).await.unwrap();
    remote.insert_record(message_record("new", &bob(), "alice", "new"));

    let second = messenger.messages().fetch_new_since_last().await.unwrap();

    assert_eq!(second.len(), 1);
    assert_eq!(second.messages()[0].id(), &RecordId::new("new"));
}

#[tokio::test]
async fn fetch_failure_keeps_committed_token() {
    let remote = MockRecordStore::signed_in(alice());
    remote.insert_record(message_record("r1", &bob(), "alice", "x"));
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();
    let batch = messenger.messages().fetch_new_since_last().await.unwrap();
    messenger.messages().commit(&batch).await.unwrap();

    remote.fail_next(
        MockOp::QueryRecords,
        RemoteError::new(RemoteErrorCode::NetworkUnavailable, "offline"),
    );
    let err = messenger.messages().fetch_new_since_last().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(
        messenger.messages().last_token().await.unwrap().as_ref(),
        Some(batch.token())
    );
}

#[tokio::test]
async fn token_from_old_subscription_is_ignored() {
    let remote = MockRecordStore::signed_in(alice());
    remote.insert_record(message_record("r1", &bob(), "alice", "x"));
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();

    // Committed before any subscription existed.
    let batch = messenger.messages().fetch_new_since_last().await.unwrap();
    messenger.messages().commit(&batch).await.unwrap();
    messenger.subscriptions().ensure_subscribed().await.unwrap();

    let state = messenger.persisted_state().await.unwrap();
    assert_eq!(state.change_token, None);
    assert!(state.change_token_ignored);

    let again = messenger.messages().fetch_new_since_last().await.unwrap();
    assert_eq!(again.len(), 1);
}

// ===========================================
// Send
// ===========================================

#[tokio::test]
async fn send_empty_message_fails_before_network() {
    let remote = MockRecordStore::signed_in(alice());
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();
    remote.reset_calls();

    let result = OutgoingMessage::new(Some(String::new()), None, IdentityRef::new("bob"))
        .map_err(MessengerError::from);

    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unexpected);
    assert!(matches!(err, MessengerError::Invalid(_)));
    assert_eq!(remote.total_calls(), 0);
}

#[tokio::test]
async fn send_reaches_receiver() {
    let remote = MockRecordStore::signed_in(alice());
    remote.add_directory_user(bob(), &[]);
    let sender = messenger(&remote);
    sender.account().verify().await.unwrap();

    let outgoing = OutgoingMessage::new(
        Some("lunch?".into()),
        Some(AssetRef::new("/tmp/menu.jpg")),
        IdentityRef::new("bob"),
    )
    .unwrap();
    let sent = sender.messages().send(&outgoing).await.unwrap();

    remote.sign_in_as(IdentityRef::new("bob"));
    let receiver = messenger(&remote);
    receiver.account().verify().await.unwrap();
    let batch = receiver.messages().fetch_new_since_last().await.unwrap();

    assert_eq!(batch.len(), 1);
    let stub = &batch.messages()[0];
    assert_eq!(stub.id(), sent.id());
    assert_eq!(stub.sender_first_name(), Some("Alice"));

    let full = receiver.messages().fetch_details(stub).await.unwrap();
    assert_eq!(full.text(), Some("lunch?"));
    assert_eq!(full.image(), sent.image());
    assert_eq!(full.sender_last_name(), Some("Liddell"));
}

#[tokio::test]
async fn send_retry_never_duplicates() {
    let remote = MockRecordStore::signed_in(alice());
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();
    remote.fail_next(
        MockOp::CreateRecord,
        RemoteError::new(RemoteErrorCode::Timeout, "timed out"),
    );
    remote.fail_next(
        MockOp::CreateRecord,
        RemoteError::new(RemoteErrorCode::ZoneBusy, "busy"),
    );

    let outgoing = OutgoingMessage::new(Some("hi".into()), None, IdentityRef::new("bob")).unwrap();
    messenger.messages().send(&outgoing).await.unwrap();

    assert_eq!(remote.calls(MockOp::CreateRecord), 3);
    assert_eq!(remote.records().len(), 1);
}

// ===========================================
// Concurrency
// ===========================================

#[tokio::test]
async fn concurrent_ensure_subscribed_registers_once() {
    let remote = MockRecordStore::signed_in(alice());
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();

    let (a, b) = tokio::join!(
        messenger.subscriptions().ensure_subscribed(),
        messenger.subscriptions().ensure_subscribed()
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(remote.calls(MockOp::CreateSubscription), 1);
    assert_eq!(remote.subscriptions().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ensure_subscribed_across_tasks() {
    let remote = MockRecordStore::signed_in(alice());
    let messenger = Arc::new(messenger(&remote));
    messenger.account().verify().await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let messenger = messenger.clone();
            tokio::spawn(async move { messenger.subscriptions().ensure_subscribed().await })
        })
        .collect();
    for handle in handles {
        assert_eq!(
            handle.await.unwrap().unwrap(),
            SubscriptionId::incoming_messages()
        );
    }

    assert_eq!(remote.calls(MockOp::CreateSubscription), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_commits_of_one_batch_all_succeed() {
    let dir = tempfile::TempDir::new().unwrap();
    let remote = MockRecordStore::signed_in(alice());
    remote.insert_record(message_record("r1", &bob(), "alice", "x"));
    let messenger = Arc::new(Messenger::new(
        MessengerConfig::default(),
        Arc::new(remote.clone()),
        Arc::new(FileStore::new(dir.path())),
        Arc::new(StaticAddressBook::default()),
    ));
    messenger.account().verify().await.unwrap();
    messenger.subscriptions().ensure_subscribed().await.unwrap();
    let batch = Arc::new(messenger.messages().fetch_new_since_last().await.unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let messenger = messenger.clone();
            let batch = batch.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    messenger.messages().commit(&batch).await?;
                }
                Ok::<_, MessengerError>(())
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(
        messenger.messages().last_token().await.unwrap().as_ref(),
        Some(batch.token())
    );
}

// ===========================================
// Account Change
// ===========================================

#[tokio::test]
async fn account_change_leaves_state_untouched() {
    let remote = MockRecordStore::signed_in(alice());
    remote.insert_record(message_record("r1", &bob(), "alice", "x"));
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();
    messenger.subscriptions().ensure_subscribed().await.unwrap();
    let batch = messenger.messages().fetch_new_since_last().await.unwrap();
    messenger.messages().commit(&batch).await.unwrap();
    let before = messenger.persisted_state().await.unwrap();

    remote.add_directory_user(bob(), &[]);
    remote.sign_in_as(IdentityRef::new("bob"));
    let err = messenger.account().verify().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AccountChanged);
    assert_eq!(messenger.persisted_state().await.unwrap(), before);
}

#[tokio::test]
async fn account_change_blocks_in_flight_commit() {
    let remote = MockRecordStore::signed_in(alice());
    remote.insert_record(message_record("r1", &bob(), "alice", "x"));
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();
    let batch = messenger.messages().fetch_new_since_last().await.unwrap();

    remote.add_directory_user(bob(), &[]);
    remote.sign_in_as(IdentityRef::new("bob"));
    assert!(messenger.account().verify().await.is_err());

    let err = messenger.messages().commit(&batch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountChanged);
    assert_eq!(messenger.messages().last_token().await.unwrap(), None);

    let err = messenger.messages().fetch_new(None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountChanged);
}

#[tokio::test]
async fn account_change_during_subscribe_discards_id() {
    let remote = MockRecordStore::signed_in(alice());
    remote.add_directory_user(bob(), &[]);
    let held = HeldSubscription::new(remote.clone());
    let messenger = Messenger::new(
        MessengerConfig::default(),
        Arc::new(held.clone()),
        Arc::new(MemoryStore::new()),
        Arc::new(StaticAddressBook::default()),
    );
    messenger.account().verify().await.unwrap();

    let switch_accounts = async {
        held.created.notified().await;
        remote.sign_in_as(IdentityRef::new("bob"));
        let verified = messenger.account().verify().await;
        held.release.notify_one();
        verified
    };
    let (subscribed, verified) = tokio::join!(
        messenger.subscriptions().ensure_subscribed(),
        switch_accounts
    );

    assert_eq!(verified.unwrap_err().kind(), ErrorKind::AccountChanged);
    assert_eq!(subscribed.unwrap_err().kind(), ErrorKind::AccountChanged);
    assert_eq!(messenger.subscriptions().subscription_id().await.unwrap(), None);
    assert_eq!(
        messenger.persisted_state().await.unwrap().last_known_identity,
        Some(IdentityRef::new("alice"))
    );
}

#[tokio::test]
async fn account_reset_then_fresh_start() {
    let remote = MockRecordStore::signed_in(alice());
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();
    messenger.subscriptions().ensure_subscribed().await.unwrap();

    remote.add_directory_user(bob(), &[]);
    remote.sign_in_as(IdentityRef::new("bob"));
    remote.insert_record(message_record("for-bob", &alice(), "bob", "hey"));
    assert!(messenger.account().verify().await.is_err());

    messenger.reset_account().await.unwrap();
    messenger.account().verify().await.unwrap();
    messenger.subscriptions().ensure_subscribed().await.unwrap();
    let batch = messenger.messages().fetch_new_since_last().await.unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(remote.subscriptions().len(), 2);
}

// ===========================================
// Push
// ===========================================

#[tokio::test]
async fn push_translate_then_hydrate() {
    let remote = MockRecordStore::signed_in(alice());
    remote.add_directory_user(bob(), &[]);
    remote.insert_record(message_record("r-push", &bob(), "alice", "ping"));
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();
    remote.reset_calls();

    let payload = br#"{
        "recordType": "Message",
        "recordId": "r-push",
        "fields": {
            "sender": {"reference": "bob"},
            "senderFirstName": {"string": "Bob"}
        }
    }"#;
    let stub = messenger
        .notifications()
        .translate_json(payload)
        .await
        .unwrap();
    assert_eq!(remote.total_calls(), 0);
    assert_eq!(stub.receiver(), &IdentityRef::new("alice"));

    let full = messenger.messages().fetch_details(&stub).await.unwrap();
    assert_eq!(full.text(), Some("ping"));
}

#[tokio::test]
async fn push_for_other_record_type_is_unexpected() {
    let remote = MockRecordStore::signed_in(alice());
    let messenger = messenger(&remote);
    messenger.account().verify().await.unwrap();

    let note = PushNotification {
        record_type: "Contact".into(),
        record_id: RecordId::new("c1"),
        fields: RecordFields::new(),
    };
    let err = messenger.notifications().translate(&note).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unexpected);
}

// ===========================================
// Persistence
// ===========================================

#[tokio::test]
async fn file_store_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let remote = MockRecordStore::signed_in(alice());
    remote.insert_record(message_record("r1", &bob(), "alice", "x"));

    {
        let messenger = Messenger::new(
            MessengerConfig::default(),
            Arc::new(remote.clone()),
            Arc::new(FileStore::new(dir.path())),
            Arc::new(StaticAddressBook::default()),
        );
        messenger.account().verify().await.unwrap();
        messenger.subscriptions().ensure_subscribed().await.unwrap();
        let batch = messenger.messages().fetch_new_since_last().await.unwrap();
        messenger.messages().commit(&batch).await.unwrap();
    }

    let restarted = Messenger::new(
        MessengerConfig::default(),
        Arc::new(remote.clone()),
        Arc::new(FileStore::new(dir.path())),
        Arc::new(StaticAddressBook::default()),
    );
    restarted.account().verify().await.unwrap();
    remote.reset_calls();
    restarted.subscriptions().ensure_subscribed().await.unwrap();
    let batch = restarted.messages().fetch_new_since_last().await.unwrap();

    assert_eq!(remote.calls(MockOp::CreateSubscription), 0);
    assert!(batch.is_empty());
}
