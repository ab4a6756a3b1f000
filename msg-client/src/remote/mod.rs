//! Remote record store abstraction.
//!
//! The messenger talks to the cloud service only through
//! [`RemoteRecordStore`]. Production code plugs in a real service client;
//! tests and the CLI use [`MockRecordStore`].
//!
//! Implementations report failures as [`RemoteError`]. They own timeout
//! policy and must report timeouts as [`RemoteErrorCode::Timeout`](cloudmsg_types::RemoteErrorCode::Timeout).

mod mock;

pub use mock::{MockOp, MockRecordStore};

use async_trait::async_trait;
use cloudmsg_core::{AccountStatus, PermissionStatus};
use cloudmsg_types::{
    AssetRef, ChangeToken, Contact, DiscoveredUser, FieldValue, IdentityRef, Record,
    RecordFields, RecordId, RemoteError, SubscriptionId,
};
use serde::{Deserialize, Serialize};

/// Record filter understood by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// `fields[field] == Reference(identity)`.
    ReferenceEquals {
        /// Field name.
        field: String,
        /// Identity the reference must point at.
        identity: IdentityRef,
    },
}

impl Predicate {
    /// Reference-equality predicate.
    pub fn reference_equals(field: &str, identity: IdentityRef) -> Self {
        Predicate::ReferenceEquals {
            field: field.to_string(),
            identity,
        }
    }

    /// Evaluate against a field map.
    pub fn matches(&self, fields: &RecordFields) -> bool {
        match self {
            Predicate::ReferenceEquals { field, identity } => {
                matches!(fields.get(field), Some(FieldValue::Reference(r)) if r == identity)
            }
        }
    }
}

/// An incremental query for records created after a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// Record type to query.
    pub record_type: String,
    /// Filter.
    pub predicate: Predicate,
    /// Only records created after this token; `None` means from the beginning.
    pub since: Option<ChangeToken>,
    /// Fields to return; `None` returns every field.
    pub desired_fields: Option<Vec<String>>,
    /// Page size.
    pub limit: u32,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPage {
    /// Matching records in creation order.
    pub records: Vec<Record>,
    /// Token covering everything up to the last record of this page.
    pub token: ChangeToken,
    /// More matching records exist after `token`.
    pub more_coming: bool,
}

/// When a subscription fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionTrigger {
    /// On creation of a matching record.
    RecordCreated,
}

/// A push subscription registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSpec {
    /// Logical subscription id.
    pub id: SubscriptionId,
    /// Record type watched.
    pub record_type: String,
    /// Filter on the watched records.
    pub predicate: Predicate,
    /// Event that fires the push.
    pub trigger: SubscriptionTrigger,
    /// Silent (content-available) push, no user-visible alert.
    pub silent: bool,
    /// Fields inlined into the push payload.
    pub notification_fields: Vec<String>,
}

/// Operations the messenger needs from the cloud service.
#[async_trait]
pub trait RemoteRecordStore: Send + Sync {
    /// Availability of the signed-in account.
    async fn account_status(&self) -> Result<AccountStatus, RemoteError>;

    /// Current discoverability permission.
    async fn permission_status(&self) -> Result<PermissionStatus, RemoteError>;

    /// Ask the user for discoverability consent.
    async fn request_permission(&self) -> Result<PermissionStatus, RemoteError>;

    /// Identity of the signed-in account.
    async fn fetch_current_identity(&self) -> Result<IdentityRef, RemoteError>;

    /// Look up the public name of one identity.
    async fn fetch_identity(&self, identity: &IdentityRef) -> Result<DiscoveredUser, RemoteError>;

    /// Resolve address-book contacts to identities.
    async fn fetch_identities(
        &self,
        contacts: &[Contact],
    ) -> Result<Vec<DiscoveredUser>, RemoteError>;

    /// Save a new record. Fails with `AlreadyExists` if the id is taken.
    async fn create_record(&self, record: Record) -> Result<Record, RemoteError>;

    /// Run an incremental query.
    async fn query_records(&self, query: &RecordQuery) -> Result<QueryPage, RemoteError>;

    /// Fetch one full record. Fails with `UnknownItem` if it does not exist.
    async fn fetch_record(&self, id: &RecordId) -> Result<Record, RemoteError>;

    /// Register a subscription. Fails with `AlreadyExists` if registered.
    async fn create_subscription(
        &self,
        spec: &SubscriptionSpec,
    ) -> Result<SubscriptionId, RemoteError>;

    /// Upload a local file and return the remote asset reference.
    async fn upload_asset(&self, local: &AssetRef) -> Result<AssetRef, RemoteError>;

    /// Delete an uploaded asset.
    async fn delete_asset(&self, asset: &AssetRef) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_predicate_matches_only_that_identity() {
        let predicate = Predicate::reference_equals("receiver", IdentityRef::new("bob"));

        let mut fields = RecordFields::new();
        fields.insert("receiver".into(), FieldValue::Reference(IdentityRef::new("bob")));
        assert!(predicate.matches(&fields));

        fields.insert("receiver".into(), FieldValue::Reference(IdentityRef::new("carol")));
        assert!(!predicate.matches(&fields));

        fields.insert("receiver".into(), FieldValue::String("bob".into()));
        assert!(!predicate.matches(&fields));
    }
}
