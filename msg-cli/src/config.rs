//! Files kept in the data directory.
//!
//! - `cloudmsg.toml`: optional messenger configuration
//! - `cloud.json`: the simulated cloud (accounts, records, subscriptions)
//! - `contacts.json`: the local address book
//! - `state/`: the messenger's persisted values

use anyhow::{Context, Result};
use cloudmsg_client::{FileStore, Messenger, MessengerConfig, MockRecordStore, StaticAddressBook};
use cloudmsg_types::Contact;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CONFIG_FILE: &str = "cloudmsg.toml";
const CLOUD_FILE: &str = "cloud.json";
const CONTACTS_FILE: &str = "contacts.json";
const STATE_DIR: &str = "state";

/// The data directory and everything loaded from it.
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    /// Use `path` as the data directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Messenger configuration, or the defaults if there is no config file.
    pub fn messenger_config(&self) -> Result<MessengerConfig> {
        let path = self.path.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(MessengerConfig::default());
        }
        MessengerConfig::from_file(&path).context("Invalid messenger configuration")
    }

    /// Load the simulated cloud, or an empty one.
    pub async fn load_cloud(&self) -> Result<MockRecordStore> {
        let path = self.path.join(CLOUD_FILE);
        if !path.exists() {
            return Ok(MockRecordStore::new());
        }
        let contents = tokio::fs::read_to_string(&path)
            .await
            .context("Failed to read simulated cloud")?;
        MockRecordStore::from_json(&contents).context("Invalid simulated cloud")
    }

    /// Save the simulated cloud.
    pub async fn save_cloud(&self, cloud: &MockRecordStore) -> Result<()> {
        let contents = cloud.to_json().context("Failed to serialize simulated cloud")?;
        tokio::fs::write(self.path.join(CLOUD_FILE), contents)
            .await
            .context("Failed to save simulated cloud")
    }

    /// Load the address book, or an empty one.
    pub async fn load_contacts(&self) -> Result<Vec<Contact>> {
        let path = self.path.join(CONTACTS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = tokio::fs::read_to_string(&path)
            .await
            .context("Failed to read address book")?;
        serde_json::from_str(&contents).context("Invalid address book")
    }

    /// Save the address book.
    pub async fn save_contacts(&self, contacts: &[Contact]) -> Result<()> {
        let contents = serde_json::to_string_pretty(contacts)?;
        tokio::fs::write(self.path.join(CONTACTS_FILE), contents)
            .await
            .context("Failed to save address book")
    }

    /// Build a messenger over the simulated cloud and the on-disk state.
    pub async fn open(&self) -> Result<(Messenger, MockRecordStore)> {
        let config = self.messenger_config()?;
        let cloud = self.load_cloud().await?;
        let contacts = self.load_contacts().await?;
        tracing::debug!(
            "Opened simulated cloud ({} records, {} contacts)",
            cloud.records().len(),
            contacts.len()
        );
        let messenger = Messenger::new(
            config,
            Arc::new(cloud.clone()),
            Arc::new(FileStore::new(self.path.join(STATE_DIR))),
            Arc::new(StaticAddressBook::new(contacts)),
        );
        Ok((messenger, cloud))
    }
}
