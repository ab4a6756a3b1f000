//! Show account and persisted state.

use anyhow::Result;
use cloudmsg_client::RemoteRecordStore;

use super::report;
use crate::config::DataDir;

/// Run the status command.
pub async fn run(data: &DataDir) -> Result<()> {
    let (messenger, cloud) = data.open().await?;

    println!("=== cloudmsg status ===");
    println!();
    println!("Data dir:  {}", data.path().display());
    println!("Container: {}", messenger.config().remote.container);
    println!();

    println!("Cloud:");
    match cloud.fetch_current_identity().await {
        Ok(identity) => println!("  Signed in: {}", identity),
        Err(_) => println!("  Signed in: NOBODY"),
    }
    if let Ok(status) = cloud.account_status().await {
        println!("  Account:   {:?}", status);
    }
    if let Ok(permission) = cloud.permission_status().await {
        println!("  Permission: {:?}", permission);
    }
    println!("  Records:   {}", cloud.records().len());
    println!();

    let state = messenger.persisted_state().await.map_err(report)?;
    println!("Persisted:");
    println!(
        "  Last-known identity: {}",
        display_or_none(state.last_known_identity.as_ref())
    );
    println!(
        "  Subscription:        {}",
        display_or_none(state.subscription_id.as_ref())
    );
    let token = match (&state.change_token, state.change_token_ignored) {
        (Some(token), _) => token.to_string(),
        (None, true) => "(stale, ignored)".to_string(),
        (None, false) => "-".to_string(),
    };
    println!("  Change token:        {}", token);
    Ok(())
}

fn display_or_none<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
