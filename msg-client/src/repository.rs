//! Message records: incremental fetch, hydration, and send.
//!
//! Delivery is at least once. [`MessageRepository::fetch_new`] hands out a
//! batch together with the token that would acknowledge it, and the token is
//! only persisted by an explicit [`MessageRepository::commit`] after the
//! caller has processed the batch. A crash in between re-delivers the batch;
//! callers de-duplicate by [`Message::id`].

use crate::error::MessengerError;
use crate::remote::{Predicate, RecordQuery};
use crate::session::Session;
use cloudmsg_core::{classify, outcome_unknown, StoreKey};
use cloudmsg_types::{
    field, AssetRef, ChangeToken, IdentityRef, Message, MessageFields, OutgoingMessage, Record,
    RecordId, RemoteError, RemoteErrorCode, SubscriptionId, MESSAGE_RECORD_TYPE,
};
use std::sync::Arc;

/// Messages fetched by one [`MessageRepository::fetch_new`] call.
#[derive(Debug, Clone)]
pub struct MessageBatch {
    messages: Vec<Message>,
    token: ChangeToken,
    identity: IdentityRef,
    subscription: Option<SubscriptionId>,
    skipped: usize,
}

impl MessageBatch {
    /// Message stubs in creation order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Take the stubs out of the batch.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Token acknowledging everything in this batch.
    pub fn token(&self) -> &ChangeToken {
        &self.token
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if nothing new arrived.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Records left out because they did not match the message schema.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Reads and writes message records and owns the change token.
pub struct MessageRepository {
    session: Arc<Session>,
}

impl MessageRepository {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Fetch message stubs addressed to the current identity created after `since`.
    ///
    /// `None` fetches everything. Stubs carry sender, sender first name, and
    /// receiver only; use [`MessageRepository::fetch_details`] for the body.
    /// Records that do not match the message schema are skipped.
    pub async fn fetch_new(
        &self,
        since: Option<ChangeToken>,
    ) -> Result<MessageBatch, MessengerError> {
        let identity = self.session.active_identity().await?;
        let subscription = self.session.store.subscription_id().await?;

        let mut query = RecordQuery {
            record_type: MESSAGE_RECORD_TYPE.to_string(),
            predicate: Predicate::reference_equals(field::RECEIVER, identity.clone()),
            since,
            desired_fields: Some(field::STUB_FIELDS.iter().map(|f| f.to_string()).collect()),
            limit: self.session.config.fetch.batch_limit,
        };
        let mut messages = Vec::new();
        let mut skipped = 0usize;

        let token = loop {
            let page = match self.session.remote.query_records(&query).await {
                Ok(page) => page,
                Err(e) if e.is(RemoteErrorCode::ChangeTokenExpired) && query.since.is_some() => {
                    tracing::warn!("Change token expired, fetching from the beginning");
                    query.since = None;
                    messages.clear();
                    skipped = 0;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            for record in page.records {
                match MessageFields::from_record(&record) {
                    Ok(fields) => messages.push(Message::stub(record.id, fields, &identity)),
                    Err(e) => {
                        skipped += 1;
                        tracing::warn!("Skipping record {}: {}", record.id, e);
                    }
                }
            }

            if !page.more_coming {
                break page.token;
            }
            query.since = Some(page.token);
        };

        tracing::debug!(
            "Fetched {} new messages for {} ({} skipped)",
            messages.len(),
            identity,
            skipped
        );
        Ok(MessageBatch {
            messages,
            token,
            identity,
            subscription,
            skipped,
        })
    }

    /// [`MessageRepository::fetch_new`] from the last committed token.
    pub async fn fetch_new_since_last(&self) -> Result<MessageBatch, MessengerError> {
        let since = self.session.store.change_token().await?;
        self.fetch_new(since).await
    }

    /// The last committed token, if it belongs to the current subscription.
    pub async fn last_token(&self) -> Result<Option<ChangeToken>, MessengerError> {
        Ok(self.session.store.change_token().await?)
    }

    /// Acknowledge a processed batch by persisting its token.
    ///
    /// Fails with `AccountChanged`, persisting nothing, if the identity the
    /// batch was fetched for is no longer the active one. A batch fetched
    /// under a different subscription is not committed.
    pub async fn commit(&self, batch: &MessageBatch) -> Result<(), MessengerError> {
        self.session.ensure_identity_unchanged(&batch.identity).await?;

        let current = self.session.store.subscription_id().await?;
        if current != batch.subscription {
            tracing::warn!(
                "Subscription changed since fetch ({:?} -> {:?}), not committing",
                batch.subscription,
                current
            );
            return Ok(());
        }

        self.session
            .store
            .set_change_token(batch.subscription.clone(), batch.token.clone())
            .await?;
        tracing::debug!("Committed change token after {} messages", batch.len());
        Ok(())
    }

    /// Forget the committed token.
    pub async fn reset_token(&self) -> Result<(), MessengerError> {
        self.session.store.remove(StoreKey::ChangeToken).await?;
        tracing::info!("Change token cleared");
        Ok(())
    }

    /// Fetch the full record behind a stub.
    ///
    /// Fails with [`MessengerError::RecordNotFound`] if the record was deleted.
    /// The sender's last name is looked up when the stub lacks it; a failed
    /// lookup leaves it empty.
    pub async fn fetch_details(&self, message: &Message) -> Result<Message, MessengerError> {
        self.session.active_identity().await?;
        let remote = &self.session.remote;

        let record = match remote.fetch_record(message.id()).await {
            Ok(record) => record,
            Err(e) if e.is(RemoteErrorCode::UnknownItem) => {
                tracing::info!("Message {} no longer exists", message.id());
                return Err(MessengerError::RecordNotFound(message.id().clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let mut hydrated = message.hydrate(MessageFields::from_record(&record)?);

        if hydrated.sender_last_name().is_none() {
            match remote.fetch_identity(hydrated.sender()).await {
                Ok(user) => hydrated = hydrated.with_sender_name(user.first_name, user.last_name),
                Err(e) => tracing::debug!("Sender lookup for {} failed: {}", hydrated.sender(), e),
            }
        }
        Ok(hydrated)
    }

    /// Send a message as the current identity.
    ///
    /// An attached image is uploaded first. Transient failures are retried
    /// with the same record id, so a retry can never create a duplicate. If
    /// the last attempt may have reached the server, the record is looked up
    /// before giving up. The uploaded image is deleted only when the record
    /// is known not to exist.
    pub async fn send(&self, outgoing: &OutgoingMessage) -> Result<Message, MessengerError> {
        let identity = self.session.active_identity().await?;
        let me = self.session.account_state().await.identity;
        let remote = &self.session.remote;

        let image = match outgoing.image() {
            Some(local) => Some(remote.upload_asset(local).await?),
            None => None,
        };

        let fields = MessageFields {
            sender: identity.clone(),
            receiver: Some(outgoing.receiver().clone()),
            sender_first_name: me.as_ref().and_then(|u| u.first_name.clone()),
            text: outgoing.text().map(str::to_string),
            image: image.clone(),
        };
        let record = Record {
            id: RecordId::generate(),
            record_type: MESSAGE_RECORD_TYPE.to_string(),
            fields: fields.to_fields(),
        };

        if let Err(e) = self.create_with_retry(&record).await {
            match self.record_exists_after(&record.id, &e).await {
                Some(true) => {
                    tracing::info!("Message {} was saved despite {:?}", record.id, e.code);
                }
                Some(false) => {
                    if let Some(asset) = &image {
                        self.roll_back_asset(asset).await;
                    }
                    return Err(e.into());
                }
                None => {
                    tracing::warn!(
                        "Could not confirm whether message {} was saved, keeping its image",
                        record.id
                    );
                    return Err(e.into());
                }
            }
        }

        tracing::info!("Sent message {} to {}", record.id, outgoing.receiver());
        let last_name = me.and_then(|u| u.last_name);
        Ok(Message::stub(record.id.clone(), fields.clone(), &identity)
            .hydrate(fields)
            .with_sender_name(None, last_name))
    }

    async fn create_with_retry(&self, record: &Record) -> Result<(), RemoteError> {
        let policy = self.session.config.retry_policy();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.session.remote.create_record(record.clone()).await {
                Ok(_) => return Ok(()),
                // An earlier attempt reached the server before its reply was lost.
                Err(e) if attempt > 1 && e.is(RemoteErrorCode::AlreadyExists) => {
                    tracing::debug!("Record {} already saved by an earlier attempt", record.id);
                    return Ok(());
                }
                Err(e) => {
                    let kind = classify(&e);
                    if !policy.should_retry(kind, attempt) {
                        return Err(e);
                    }
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        "Send attempt {}/{} failed ({:?}), retrying in {:?}",
                        attempt,
                        policy.attempts,
                        kind,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Whether a record whose creation failed with `error` exists anyway.
    ///
    /// `None` when that cannot be determined.
    async fn record_exists_after(&self, id: &RecordId, error: &RemoteError) -> Option<bool> {
        if !outcome_unknown(error.code) {
            return Some(false);
        }
        match self.session.remote.fetch_record(id).await {
            Ok(_) => Some(true),
            Err(e) if e.is(RemoteErrorCode::UnknownItem) => Some(false),
            Err(e) => {
                tracing::debug!("Lookup of unconfirmed record {} failed: {}", id, e);
                None
            }
        }
    }

    async fn roll_back_asset(&self, asset: &AssetRef) {
        match self.session.remote.delete_asset(asset).await {
            Ok(()) => tracing::info!("Rolled back uploaded asset {}", asset),
            Err(e) => tracing::warn!("Failed to roll back asset {}: {}", asset, e),
        }
    }
}
