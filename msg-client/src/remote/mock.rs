//! Mock remote store for testing.
//!
//! An in-memory cloud: accounts, an identity directory, records with
//! creation-order change tokens, subscriptions and assets. Failures can be
//! queued per operation and every call is counted, so tests can assert that
//! an operation did (or did not) reach the network. The state serializes to
//! JSON, which is how the CLI keeps a simulated cloud between runs.

use super::{QueryPage, RecordQuery, RemoteRecordStore, SubscriptionSpec};
use async_trait::async_trait;
use cloudmsg_core::{AccountStatus, PermissionStatus};
use cloudmsg_types::{
    AssetRef, ChangeToken, Contact, DiscoveredUser, IdentityRef, Record, RecordId, RemoteError,
    RemoteErrorCode, SubscriptionId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Operations of [`RemoteRecordStore`], for failure injection and call counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    /// `account_status`
    AccountStatus,
    /// `permission_status`
    PermissionStatus,
    /// `request_permission`
    RequestPermission,
    /// `fetch_current_identity`
    CurrentIdentity,
    /// `fetch_identity`
    FetchIdentity,
    /// `fetch_identities`
    FetchIdentities,
    /// `create_record`
    CreateRecord,
    /// `query_records`
    QueryRecords,
    /// `fetch_record`
    FetchRecord,
    /// `create_subscription`
    CreateSubscription,
    /// `upload_asset`
    UploadAsset,
    /// `delete_asset`
    DeleteAsset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DirectoryEntry {
    user: DiscoveredUser,
    handles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    seq: u64,
    record: Record,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MockCloud {
    account_status: AccountStatus,
    permission_status: PermissionStatus,
    #[serde(default)]
    permission_answers: VecDeque<PermissionStatus>,
    current_identity: Option<IdentityRef>,
    #[serde(default)]
    directory: Vec<DirectoryEntry>,
    #[serde(default)]
    records: Vec<StoredRecord>,
    #[serde(default)]
    last_seq: u64,
    /// Keyed by `"{identity}/{subscription id}"`.
    #[serde(default)]
    subscriptions: BTreeMap<String, SubscriptionSpec>,
    /// Remote asset id -> uploaded local path.
    #[serde(default)]
    assets: BTreeMap<String, String>,
    /// `None` entries let one call through.
    #[serde(skip)]
    failures: HashMap<MockOp, VecDeque<Option<RemoteError>>>,
    /// Errors returned after the write was applied.
    #[serde(skip)]
    lost_replies: HashMap<MockOp, VecDeque<RemoteError>>,
    #[serde(skip)]
    calls: HashMap<MockOp, usize>,
}

impl MockCloud {
    fn signed_in(&self) -> Result<IdentityRef, RemoteError> {
        match (&self.account_status, &self.current_identity) {
            (AccountStatus::Available, Some(identity)) => Ok(identity.clone()),
            _ => Err(RemoteError::new(
                RemoteErrorCode::NotAuthenticated,
                "no account signed in",
            )),
        }
    }

    fn discoverable(&self) -> Result<(), RemoteError> {
        if self.permission_status == PermissionStatus::Granted {
            Ok(())
        } else {
            Err(RemoteError::new(
                RemoteErrorCode::PermissionFailure,
                "user discoverability not granted",
            ))
        }
    }

    /// Hand back `value`, unless a lost reply is queued for `op`.
    fn reply<T>(&mut self, op: MockOp, value: T) -> Result<T, RemoteError> {
        match self.lost_replies.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }

    fn directory_user(&self, identity: &IdentityRef) -> Option<&DiscoveredUser> {
        self.directory
            .iter()
            .map(|entry| &entry.user)
            .find(|user| &user.identity == identity)
    }
}

/// Mock remote store.
///
/// Clones share state.
#[derive(Debug, Default, Clone)]
pub struct MockRecordStore {
    inner: Arc<Mutex<MockCloud>>,
}

fn token_for_seq(seq: u64) -> ChangeToken {
    ChangeToken::from_bytes(seq.to_be_bytes().to_vec())
}

fn seq_for_token(token: &ChangeToken) -> Option<u64> {
    let bytes: [u8; 8] = token.as_bytes().try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

impl MockRecordStore {
    /// Create an empty cloud with no account signed in.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cloud with `user` signed in, discoverable and in the directory.
    pub fn signed_in(user: DiscoveredUser) -> Self {
        let store = Self::new();
        store.add_directory_user(user.clone(), &[]);
        store.sign_in_as(user.identity);
        store.set_permission_status(PermissionStatus::Granted);
        store
    }

    fn cloud(&self) -> MutexGuard<'_, MockCloud> {
        self.inner.lock().unwrap()
    }

    /// Count the call, then pop a queued failure for `op` if there is one.
    fn begin(&self, op: MockOp) -> Result<MutexGuard<'_, MockCloud>, RemoteError> {
        let mut cloud = self.cloud();
        *cloud.calls.entry(op).or_insert(0) += 1;
        if let Some(error) = cloud
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
            .flatten()
        {
            return Err(error);
        }
        Ok(cloud)
    }

    /// Sign `identity` in with an available account.
    pub fn sign_in_as(&self, identity: IdentityRef) {
        let mut cloud = self.cloud();
        cloud.account_status = AccountStatus::Available;
        cloud.current_identity = Some(identity);
    }

    /// Set the account status.
    pub fn set_account_status(&self, status: AccountStatus) {
        self.cloud().account_status = status;
    }

    /// Set the discoverability permission.
    pub fn set_permission_status(&self, status: PermissionStatus) {
        self.cloud().permission_status = status;
    }

    /// Queue the answer to the next consent request (default: granted).
    pub fn queue_permission_answer(&self, answer: PermissionStatus) {
        self.cloud().permission_answers.push_back(answer);
    }

    /// Add a discoverable user reachable through the given email/phone handles.
    pub fn add_directory_user(&self, user: DiscoveredUser, handles: &[&str]) {
        let mut cloud = self.cloud();
        cloud
            .directory
            .retain(|entry| entry.user.identity != user.identity);
        cloud.directory.push(DirectoryEntry {
            user,
            handles: handles.iter().map(|h| h.to_string()).collect(),
        });
    }

    /// Store a record as if another client created it. Bypasses failure injection.
    pub fn insert_record(&self, record: Record) {
        let mut cloud = self.cloud();
        cloud.last_seq += 1;
        let seq = cloud.last_seq;
        cloud.records.push(StoredRecord { seq, record });
    }

    /// Delete a record server-side.
    pub fn delete_record(&self, id: &RecordId) -> bool {
        let mut cloud = self.cloud();
        let before = cloud.records.len();
        cloud.records.retain(|stored| &stored.record.id != id);
        cloud.records.len() != before
    }

    /// All stored records in creation order.
    pub fn records(&self) -> Vec<Record> {
        self.cloud()
            .records
            .iter()
            .map(|stored| stored.record.clone())
            .collect()
    }

    /// All registered subscriptions.
    pub fn subscriptions(&self) -> Vec<SubscriptionSpec> {
        self.cloud().subscriptions.values().cloned().collect()
    }

    /// All uploaded assets.
    pub fn assets(&self) -> Vec<AssetRef> {
        self.cloud().assets.keys().map(AssetRef::new).collect()
    }

    /// Cause the next call of `op` to fail with `error`. Failures queue up.
    pub fn fail_next(&self, op: MockOp, error: RemoteError) {
        self.cloud()
            .failures
            .entry(op)
            .or_default()
            .push_back(Some(error));
    }

    /// Let the next call of `op` through, so that failures queued after it
    /// hit later calls.
    pub fn succeed_next(&self, op: MockOp) {
        self.cloud().failures.entry(op).or_default().push_back(None);
    }

    /// Let the next successful call of `op` take effect, then fail it with
    /// `error` as if the reply never arrived.
    pub fn lose_next_reply(&self, op: MockOp, error: RemoteError) {
        self.cloud()
            .lost_replies
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Number of calls made to `op`.
    pub fn calls(&self, op: MockOp) -> usize {
        self.cloud().calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of calls made to any operation.
    pub fn total_calls(&self) -> usize {
        self.cloud().calls.values().sum()
    }

    /// Forget call counts.
    pub fn reset_calls(&self) {
        self.cloud().calls.clear();
    }

    /// Serialize the simulated cloud (without injected failures or counters).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&*self.cloud())
    }

    /// Restore a simulated cloud saved with [`MockRecordStore::to_json`].
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let cloud: MockCloud = serde_json::from_str(json)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(cloud)),
        })
    }
}

#[async_trait]
impl RemoteRecordStore for MockRecordStore {
    async fn account_status(&self) -> Result<AccountStatus, RemoteError> {
        tokio::task::yield_now().await;
        let cloud = self.begin(MockOp::AccountStatus)?;
        Ok(cloud.account_status)
    }

    async fn permission_status(&self) -> Result<PermissionStatus, RemoteError> {
        tokio::task::yield_now().await;
        let cloud = self.begin(MockOp::PermissionStatus)?;
        Ok(cloud.permission_status)
    }

    async fn request_permission(&self) -> Result<PermissionStatus, RemoteError> {
        tokio::task::yield_now().await;
        let mut cloud = self.begin(MockOp::RequestPermission)?;
        cloud.signed_in()?;
        // The system prompt is shown once; a denial sticks.
        if cloud.permission_status == PermissionStatus::Denied {
            return Ok(PermissionStatus::Denied);
        }
        let answer = cloud
            .permission_answers
            .pop_front()
            .unwrap_or(PermissionStatus::Granted);
        cloud.permission_status = answer;
        Ok(answer)
    }

    async fn fetch_current_identity(&self) -> Result<IdentityRef, RemoteError> {
        tokio::task::yield_now().await;
        let cloud = self.begin(MockOp::CurrentIdentity)?;
        cloud.signed_in()
    }

    async fn fetch_identity(&self, identity: &IdentityRef) -> Result<DiscoveredUser, RemoteError> {
        tokio::task::yield_now().await;
        let cloud = self.begin(MockOp::FetchIdentity)?;
        cloud.signed_in()?;
        cloud.discoverable()?;
        cloud.directory_user(identity).cloned().ok_or_else(|| {
            RemoteError::new(RemoteErrorCode::UnknownItem, format!("no user {}", identity))
        })
    }

    async fn fetch_identities(
        &self,
        contacts: &[Contact],
    ) -> Result<Vec<DiscoveredUser>, RemoteError> {
        tokio::task::yield_now().await;
        let cloud = self.begin(MockOp::FetchIdentities)?;
        cloud.signed_in()?;
        cloud.discoverable()?;
        let found = contacts
            .iter()
            .filter_map(|contact| {
                cloud.directory.iter().find(|entry| {
                    entry.handles.iter().any(|handle| {
                        contact.email.as_deref() == Some(handle.as_str())
                            || contact.phone.as_deref() == Some(handle.as_str())
                    })
                })
            })
            .map(|entry| entry.user.clone())
            .collect();
        Ok(found)
    }

    async fn create_record(&self, record: Record) -> Result<Record, RemoteError> {
        tokio::task::yield_now().await;
        let mut cloud = self.begin(MockOp::CreateRecord)?;
        cloud.signed_in()?;
        if cloud.records.iter().any(|stored| stored.record.id == record.id) {
            return Err(RemoteError::new(
                RemoteErrorCode::AlreadyExists,
                format!("record {} exists", record.id),
            ));
        }
        cloud.last_seq += 1;
        let seq = cloud.last_seq;
        cloud.records.push(StoredRecord {
            seq,
            record: record.clone(),
        });
        cloud.reply(MockOp::CreateRecord, record)
    }

    async fn query_records(&self, query: &RecordQuery) -> Result<QueryPage, RemoteError> {
        tokio::task::yield_now().await;
        let cloud = self.begin(MockOp::QueryRecords)?;
        cloud.signed_in()?;

        let since = match &query.since {
            None => 0,
            Some(token) => seq_for_token(token).ok_or_else(|| {
                RemoteError::new(RemoteErrorCode::ChangeTokenExpired, "unrecognised token")
            })?,
        };

        let limit = query.limit.max(1) as usize;
        let mut matching = cloud.records.iter().filter(|stored| {
            stored.seq > since
                && stored.record.record_type == query.record_type
                && query.predicate.matches(&stored.record.fields)
        });

        let page: Vec<&StoredRecord> = matching.by_ref().take(limit).collect();
        let more_coming = matching.next().is_some();
        let token_seq = match page.last() {
            Some(last) if more_coming => last.seq,
            _ => cloud.last_seq.max(since),
        };

        let records = page
            .into_iter()
            .map(|stored| {
                let mut record = stored.record.clone();
                if let Some(desired) = &query.desired_fields {
                    record.fields.retain(|name, _| desired.contains(name));
                }
                record
            })
            .collect();

        Ok(QueryPage {
            records,
            token: token_for_seq(token_seq),
            more_coming,
        })
    }

    async fn fetch_record(&self, id: &RecordId) -> Result<Record, RemoteError> {
        tokio::task::yield_now().await;
        let cloud = self.begin(MockOp::FetchRecord)?;
        cloud.signed_in()?;
        cloud
            .records
            .iter()
            .find(|stored| &stored.record.id == id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| {
                RemoteError::new(RemoteErrorCode::UnknownItem, format!("no record {}", id))
            })
    }

    async fn create_subscription(
        &self,
        spec: &SubscriptionSpec,
    ) -> Result<SubscriptionId, RemoteError> {
        tokio::task::yield_now().await;
        let mut cloud = self.begin(MockOp::CreateSubscription)?;
        let identity = cloud.signed_in()?;
        let key = format!("{}/{}", identity, spec.id);
        if cloud.subscriptions.contains_key(&key) {
            return Err(RemoteError::new(
                RemoteErrorCode::AlreadyExists,
                format!("subscription {} exists", spec.id),
            ));
        }
        cloud.subscriptions.insert(key, spec.clone());
        cloud.reply(MockOp::CreateSubscription, spec.id.clone())
    }

    async fn upload_asset(&self, local: &AssetRef) -> Result<AssetRef, RemoteError> {
        tokio::task::yield_now().await;
        let mut cloud = self.begin(MockOp::UploadAsset)?;
        cloud.signed_in()?;
        if local.is_empty() {
            return Err(RemoteError::new(
                RemoteErrorCode::AssetFileNotFound,
                "empty asset path",
            ));
        }
        let id = format!("asset-{}", uuid::Uuid::new_v4());
        cloud.assets.insert(id.clone(), local.to_string());
        Ok(AssetRef::new(id))
    }

    async fn delete_asset(&self, asset: &AssetRef) -> Result<(), RemoteError> {
        tokio::task::yield_now().await;
        let mut cloud = self.begin(MockOp::DeleteAsset)?;
        cloud.signed_in()?;
        cloud
            .assets
            .remove(asset.as_str())
            .map(|_| ())
            .ok_or_else(|| {
                RemoteError::new(RemoteErrorCode::UnknownItem, format!("no asset {}", asset))
            })
    }
}
