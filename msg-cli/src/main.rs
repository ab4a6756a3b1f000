//! # cloudmsg
//!
//! CLI for driving the cloudmsg messenger against a simulated cloud.
//!
//! The cloud lives in `cloud.json` in the data directory, so several
//! invocations (and several data directories) can share it.
//!
//! ## Example
//!
//! ```bash
//! # Sign in as Alice and add Bob as a contact
//! cloudmsg account --id alice --first Alice --last Liddell
//! cloudmsg contact --id bob --first Bob --last Byrne --email bob@example.com
//!
//! # First run
//! cloudmsg verify
//! cloudmsg discover
//! cloudmsg friends
//! cloudmsg subscribe
//!
//! # Messages
//! cloudmsg send --to bob --text "lunch?"
//! cloudmsg fetch
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cloudmsg_core::{AccountStatus, PermissionStatus};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{account, details, discover, fetch, reset, send, status, subscribe, translate};
use config::DataDir;

/// CLI for driving the cloudmsg messenger against a simulated cloud.
#[derive(Parser, Debug)]
#[command(name = "cloudmsg")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the simulated cloud and messenger state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log debug output (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in to the simulated cloud
    Account {
        /// Identity reference
        #[arg(long)]
        id: String,
        /// First name
        #[arg(long)]
        first: Option<String>,
        /// Last name
        #[arg(long)]
        last: Option<String>,
        /// Email others can discover this account by
        #[arg(long)]
        email: Option<String>,
        /// Account availability
        #[arg(long, value_enum, default_value = "available")]
        status: AccountArg,
        /// Discoverability permission
        #[arg(long, value_enum, default_value = "initial")]
        permission: PermissionArg,
    },

    /// Add a discoverable user to the cloud and to the address book
    Contact {
        /// Identity reference
        #[arg(long)]
        id: String,
        /// First name
        #[arg(long)]
        first: Option<String>,
        /// Last name
        #[arg(long)]
        last: Option<String>,
        /// Email to find the contact by
        #[arg(long)]
        email: String,
    },

    /// Verify the signed-in account
    Verify,

    /// Ask for discoverability and look up the current user
    Discover,

    /// List address-book contacts that use the service
    Friends,

    /// Register the incoming-message subscription
    Subscribe,

    /// Send a message
    Send {
        /// Receiver identity
        #[arg(long)]
        to: String,
        /// Message text
        #[arg(long)]
        text: Option<String>,
        /// Image file to attach
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Fetch new messages since the last commit
    Fetch {
        /// Do not commit the change token
        #[arg(long)]
        no_commit: bool,
    },

    /// Show the full contents of one message
    Details {
        /// Record id
        record_id: String,
    },

    /// Translate a push notification payload
    Translate {
        /// JSON payload file
        payload: PathBuf,
    },

    /// Start over after an account change
    Reset,

    /// Show account and persisted state
    Status,
}

/// Account availability as given on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum AccountArg {
    Available,
    Restricted,
    NoAccount,
    Unknown,
}

impl From<AccountArg> for AccountStatus {
    fn from(arg: AccountArg) -> Self {
        match arg {
            AccountArg::Available => AccountStatus::Available,
            AccountArg::Restricted => AccountStatus::Restricted,
            AccountArg::NoAccount => AccountStatus::NoAccount,
            AccountArg::Unknown => AccountStatus::Unknown,
        }
    }
}

/// Discoverability permission as given on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum PermissionArg {
    Initial,
    Granted,
    Denied,
    Errored,
}

impl From<PermissionArg> for PermissionStatus {
    fn from(arg: PermissionArg) -> Self {
        match arg {
            PermissionArg::Initial => PermissionStatus::Initial,
            PermissionArg::Granted => PermissionStatus::Granted,
            PermissionArg::Denied => PermissionStatus::Denied,
            PermissionArg::Errored => PermissionStatus::Errored,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    tracing::debug!("Using data dir {}", data_dir.display());
    let data = DataDir::new(data_dir);

    match cli.command {
        Commands::Account {
            id,
            first,
            last,
            email,
            status,
            permission,
        } => {
            let user = account::user(&id, first, last);
            account::sign_in(&data, user, email, status.into(), permission.into()).await?;
        }
        Commands::Contact {
            id,
            first,
            last,
            email,
        } => {
            account::add_contact(&data, account::user(&id, first, last), &email).await?;
        }
        Commands::Verify => {
            account::verify(&data).await?;
        }
        Commands::Discover => {
            discover::prompt(&data).await?;
        }
        Commands::Friends => {
            discover::friends(&data).await?;
        }
        Commands::Subscribe => {
            subscribe::run(&data).await?;
        }
        Commands::Send { to, text, image } => {
            send::run(&data, &to, text, image).await?;
        }
        Commands::Fetch { no_commit } => {
            fetch::run(&data, !no_commit).await?;
        }
        Commands::Details { record_id } => {
            details::run(&data, &record_id).await?;
        }
        Commands::Translate { payload } => {
            let bytes = tokio::fs::read(&payload)
                .await
                .context("Failed to read payload file")?;
            translate::run(&data, &bytes).await?;
        }
        Commands::Reset => {
            reset::run(&data).await?;
        }
        Commands::Status => {
            status::run(&data).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for cloudmsg.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "cloudmsg", "cloudmsg")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
