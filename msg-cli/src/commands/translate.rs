//! Translate a push notification payload.

use anyhow::Result;

use super::{report, summary, verified};
use crate::config::DataDir;

/// Run the translate command.
pub async fn run(data: &DataDir, payload: &[u8]) -> Result<()> {
    let (messenger, _) = data.open().await?;
    verified(&messenger).await?;

    let stub = messenger
        .notifications()
        .translate_json(payload)
        .await
        .map_err(report)?;

    println!("{}", summary(&stub));
    println!("  To: {}", stub.receiver());
    Ok(())
}
