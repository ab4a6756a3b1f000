//! Send a message.

use anyhow::Result;
use cloudmsg_client::MessengerError;
use cloudmsg_types::{AssetRef, IdentityRef, OutgoingMessage};
use std::path::PathBuf;

use super::{report, verified};
use crate::config::DataDir;

/// Run the send command.
pub async fn run(
    data: &DataDir,
    to: &str,
    text: Option<String>,
    image: Option<PathBuf>,
) -> Result<()> {
    // Validate before touching the cloud.
    let image = image.map(|path| AssetRef::new(path.to_string_lossy()));
    let outgoing = OutgoingMessage::new(text, image, IdentityRef::new(to))
        .map_err(|e| report(MessengerError::from(e)))?;

    let (messenger, cloud) = data.open().await?;
    verified(&messenger).await?;

    tracing::info!("Sending message to {}", to);
    let result = messenger.messages().send(&outgoing).await;
    data.save_cloud(&cloud).await?;
    let sent = result.map_err(report)?;

    println!("Sent {} to {}", sent.id(), sent.receiver());
    Ok(())
}
