//! Start over after an account change.

use anyhow::Result;
use cloudmsg_types::ErrorKind;

use super::report;
use crate::config::DataDir;

/// Run the reset command.
pub async fn run(data: &DataDir) -> Result<()> {
    let (messenger, _) = data.open().await?;

    match messenger.account().verify().await {
        Ok(me) => {
            println!("Account {} is unchanged, nothing to reset.", me.identity);
            return Ok(());
        }
        Err(e) if e.kind() == ErrorKind::AccountChanged => {
            tracing::info!("Signed-in account changed, resetting local state");
        }
        Err(e) => return Err(report(e)),
    }

    messenger.reset_account().await.map_err(report)?;
    let me = messenger.account().verify().await.map_err(report)?;
    println!("Reset to {} ({})", me.display_name(), me.identity);
    println!("Run 'cloudmsg subscribe' to register for the new account.");
    Ok(())
}
