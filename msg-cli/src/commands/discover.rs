//! Discoverability consent and friend discovery.

use anyhow::Result;

use super::{report, verified};
use crate::config::DataDir;

/// Run the discover command.
pub async fn prompt(data: &DataDir) -> Result<()> {
    let (messenger, cloud) = data.open().await?;
    verified(&messenger).await?;

    let result = messenger.discovery().prompt_and_discover().await;
    // The consent answer is part of the simulated cloud.
    data.save_cloud(&cloud).await?;
    let me = result.map_err(report)?;

    println!("Discoverable as {} ({})", me.display_name(), me.identity);
    Ok(())
}

/// Run the friends command.
pub async fn friends(data: &DataDir) -> Result<()> {
    let (messenger, _) = data.open().await?;
    verified(&messenger).await?;

    let friends = messenger
        .discovery()
        .discover_all_friends()
        .await
        .map_err(report)?;

    if friends.is_empty() {
        println!("No contacts use the service yet.");
        return Ok(());
    }
    println!("Friends:");
    for friend in friends {
        println!("  {}  {}", friend.identity, friend.display_name());
    }
    Ok(())
}
