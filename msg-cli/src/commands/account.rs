//! Simulated accounts and account verification.

use anyhow::Result;
use cloudmsg_core::{AccountStatus, PermissionStatus};
use cloudmsg_types::{Contact, DiscoveredUser, IdentityRef};

use super::verified;
use crate::config::DataDir;

/// Build a user from command-line parts.
pub fn user(id: &str, first: Option<String>, last: Option<String>) -> DiscoveredUser {
    DiscoveredUser {
        identity: IdentityRef::new(id),
        first_name: first,
        last_name: last,
    }
}

/// Sign `user` in to the simulated cloud.
pub async fn sign_in(
    data: &DataDir,
    user: DiscoveredUser,
    email: Option<String>,
    status: AccountStatus,
    permission: PermissionStatus,
) -> Result<()> {
    let cloud = data.load_cloud().await?;
    let handles: Vec<&str> = email.as_deref().into_iter().collect();
    cloud.add_directory_user(user.clone(), &handles);
    cloud.sign_in_as(user.identity.clone());
    cloud.set_account_status(status);
    cloud.set_permission_status(permission);
    data.save_cloud(&cloud).await?;

    println!("Signed in as {} ({})", user.display_name(), user.identity);
    println!("  Account:    {:?}", status);
    println!("  Permission: {:?}", permission);
    Ok(())
}

/// Add a discoverable user to the cloud and to the local address book.
pub async fn add_contact(data: &DataDir, user: DiscoveredUser, email: &str) -> Result<()> {
    let cloud = data.load_cloud().await?;
    cloud.add_directory_user(user.clone(), &[email]);
    data.save_cloud(&cloud).await?;

    let mut contacts = data.load_contacts().await?;
    contacts.retain(|c| c.email.as_deref() != Some(email));
    contacts.push(Contact::with_email(user.display_name(), email));
    data.save_contacts(&contacts).await?;

    println!("Added contact {} <{}>", user.display_name(), email);
    Ok(())
}

/// Run the verify command.
pub async fn verify(data: &DataDir) -> Result<()> {
    let (messenger, _) = data.open().await?;
    let me = verified(&messenger).await?;
    let state = messenger.account().state().await;

    println!("Verified {} ({})", me.display_name(), me.identity);
    println!("  Permission: {:?}", state.permission_status);
    Ok(())
}
