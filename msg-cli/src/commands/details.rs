//! Show one message in full.

use anyhow::{bail, Result};
use cloudmsg_types::Message;

use super::{report, summary, verified};
use crate::config::DataDir;

/// Run the details command.
pub async fn run(data: &DataDir, record_id: &str) -> Result<()> {
    let (messenger, _) = data.open().await?;
    verified(&messenger).await?;

    // Look the stub up among everything addressed to us.
    let all = messenger.messages().fetch_new(None).await.map_err(report)?;
    let Some(stub) = all
        .messages()
        .iter()
        .find(|m| m.id().as_str() == record_id)
    else {
        bail!("No message {} addressed to you", record_id);
    };

    let message = messenger
        .messages()
        .fetch_details(stub)
        .await
        .map_err(report)?;
    print_message(&message);
    Ok(())
}

fn print_message(message: &Message) {
    println!("{}", summary(message));
    println!("  To:    {}", message.receiver());
    if let Some(text) = message.text() {
        println!("  Text:  {}", text);
    }
    if let Some(image) = message.image() {
        println!("  Image: {}", image);
    }
}
