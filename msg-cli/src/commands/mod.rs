//! CLI command implementations.

pub mod account;
pub mod details;
pub mod discover;
pub mod fetch;
pub mod reset;
pub mod send;
pub mod status;
pub mod subscribe;
pub mod translate;

use anyhow::anyhow;
use cloudmsg_client::{Messenger, MessengerError};
use cloudmsg_types::{DiscoveredUser, Message};

/// Turn a messenger error into a user-facing error with its stable code.
pub(crate) fn report(err: MessengerError) -> anyhow::Error {
    match err.retry_after() {
        Some(wait) => anyhow!(
            "{} [code {}, retry after {}s]",
            err,
            err.code(),
            wait.as_secs()
        ),
        None => anyhow!("{} [code {}]", err, err.code()),
    }
}

/// Verify the account; every command that talks to the cloud starts here.
pub(crate) async fn verified(messenger: &Messenger) -> anyhow::Result<DiscoveredUser> {
    messenger.account().verify().await.map_err(report)
}

/// One-line summary of a message, without its text.
pub(crate) fn summary(message: &Message) -> String {
    let from = match (message.sender_first_name(), message.sender_last_name()) {
        (Some(first), Some(last)) => format!("{} {}", first, last),
        (Some(name), None) | (None, Some(name)) => name.to_string(),
        (None, None) => message.sender().to_string(),
    };
    format!("{}  from {} ({})", message.id(), from, message.sender())
}
