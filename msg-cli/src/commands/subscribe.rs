//! Register the incoming-message subscription.

use anyhow::Result;

use super::{report, verified};
use crate::config::DataDir;

/// Run the subscribe command.
pub async fn run(data: &DataDir) -> Result<()> {
    let (messenger, cloud) = data.open().await?;
    verified(&messenger).await?;

    let id = messenger
        .subscriptions()
        .ensure_subscribed()
        .await
        .map_err(report)?;
    data.save_cloud(&cloud).await?;

    println!("Subscribed: {}", id);
    Ok(())
}
