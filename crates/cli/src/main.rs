//! CloudMart CLI - Database migrations and store management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! cm-cli migrate
//!
//! # Create an admin account
//! cm-cli user create -u alice -p 'correct horse battery' -r Admin
//!
//! # Provision tables, containers, queues and shares
//! cm-cli storage init
//!
//! # Load catalog products from YAML
//! cm-cli seed products data/products.yaml
//!
//! # Pop one message from a queue
//! cm-cli queue receive order-notifications
//!
//! # Fetch a stored proof of payment
//! cm-cli share download contracts 20261001_120000_proof.pdf --dir payments
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cloudmart_core::Role;

mod commands;

#[derive(Parser)]
#[command(name = "cm-cli")]
#[command(author, version, about = "CloudMart CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage cloud storage resources
    Storage {
        #[command(subcommand)]
        action: StorageAction,
    },
    /// Seed storage with data from YAML files
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Inspect storage queues
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Work with file shares
    Share {
        #[command(subcommand)]
        action: ShareAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user account
    Create {
        /// Login name
        #[arg(short, long)]
        username: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`Customer` or `Admin`)
        #[arg(short, long, default_value = "Customer")]
        role: Role,
    },
}

#[derive(Subcommand)]
enum StorageAction {
    /// Create every table, container, queue and share the storefront uses
    Init,
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Create catalog products from a YAML list
    Products {
        /// Path to the YAML file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Receive and delete one message
    Receive {
        /// Queue name
        queue: String,
    },
}

#[derive(Subcommand)]
enum ShareAction {
    /// Download a file from a share
    Download {
        /// Share name
        share: String,

        /// File name within the directory
        file: String,

        /// Directory inside the share (default: share root)
        #[arg(short, long, default_value = "")]
        dir: String,

        /// Output path (default: the file name in the current directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                username,
                password,
                role,
            } => {
                commands::user::create_user(&username, &password, role).await?;
            }
        },
        Commands::Storage { action } => match action {
            StorageAction::Init => commands::storage::init().await?,
        },
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
        },
        Commands::Queue { action } => match action {
            QueueAction::Receive { queue } => commands::storage::receive(&queue).await?,
        },
        Commands::Share { action } => match action {
            ShareAction::Download {
                share,
                file,
                dir,
                out,
            } => commands::storage::download(&share, &file, &dir, out).await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_user_create_parses_role() {
        let cli = Cli::try_parse_from([
            "cm-cli", "user", "create", "-u", "alice", "-p", "password1", "-r", "admin",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::User {
                action: UserAction::Create {
                    role: Role::Admin,
                    ..
                }
            })
        ));
    }

    #[test]
    fn test_share_download_defaults_to_root() {
        let cli = Cli::try_parse_from(["cm-cli", "share", "download", "contracts", "a.pdf"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Share {
                action: ShareAction::Download { ref dir, out: None, .. }
            }) if dir.is_empty()
        ));
    }
}
