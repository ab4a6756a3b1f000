//! # cloudmsg-client
//!
//! Client-side messaging manager for a cloud record store.
//!
//! Applications build one [`Messenger`] from a [`RemoteRecordStore`], a
//! [`KeyValueStore`] for the three persisted values, and an [`AddressBook`],
//! then drive the flow through its components:
//!
//! - [`AccountGateway`]: verify the account and detect identity changes
//! - [`DiscoveryService`]: discoverability consent and contact discovery
//! - [`SubscriptionManager`]: one push subscription per installation
//! - [`MessageRepository`]: incremental fetch, hydration, and send
//! - [`NotificationTranslator`]: push payload to message stub
//!
//! Every failure is a [`MessengerError`] with exactly one
//! [`ErrorKind`](cloudmsg_types::ErrorKind).
//!
//! ## Example
//!
//! ```ignore
//! use cloudmsg_client::{Messenger, MessengerConfig, MemoryStore, StaticAddressBook};
//!
//! let messenger = Messenger::new(
//!     MessengerConfig::default(),
//!     remote,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(StaticAddressBook::default()),
//! );
//!
//! messenger.account().verify().await?;
//! messenger.subscriptions().ensure_subscribed().await?;
//!
//! let batch = messenger.messages().fetch_new_since_last().await?;
//! for stub in batch.messages() {
//!     let message = messenger.messages().fetch_details(stub).await?;
//!     // hand the message to the application
//! }
//! messenger.messages().commit(&batch).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod account;
pub mod config;
mod discovery;
mod error;
mod messenger;
mod notification;
pub mod remote;
mod repository;
mod session;
pub mod store;
mod subscription;

pub use account::AccountGateway;
pub use config::{ConfigError, MessengerConfig};
pub use discovery::{AddressBook, DiscoveryService, StaticAddressBook};
pub use error::MessengerError;
pub use messenger::{Messenger, PersistedState};
pub use notification::NotificationTranslator;
pub use remote::{MockOp, MockRecordStore, RemoteRecordStore};
pub use repository::{MessageBatch, MessageRepository};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use subscription::SubscriptionManager;
