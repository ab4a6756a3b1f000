//! Fetch new messages.

use anyhow::Result;

use super::{report, summary, verified};
use crate::config::DataDir;

/// Run the fetch command. With `commit`, the change token advances past
/// the printed messages.
pub async fn run(data: &DataDir, commit: bool) -> Result<()> {
    let (messenger, _) = data.open().await?;
    verified(&messenger).await?;

    let batch = messenger
        .messages()
        .fetch_new_since_last()
        .await
        .map_err(report)?;

    if batch.is_empty() {
        println!("No new messages.");
    } else {
        println!("{} new message(s):", batch.len());
        for message in batch.messages() {
            println!("  {}", summary(message));
        }
    }

    if commit {
        messenger.messages().commit(&batch).await.map_err(report)?;
        tracing::debug!("Committed {} message(s)", batch.len());
    }
    Ok(())
}
