//! Pic Profile Maker CLI - Database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! pm-cli migrate
//!
//! # Create an account
//! pm-cli user create -e someone@example.com -n "Some One" -p "long enough"
//!
//! # Disable or re-enable an account
//! pm-cli user deactivate -e someone@example.com
//! pm-cli user activate -e someone@example.com
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `user create` - Create an account
//! - `user activate` / `user deactivate` - Toggle the active flag

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pm-cli")]
#[command(author, version, about = "Pic Profile Maker CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account
    Create {
        /// Account email address (also the login name)
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Initial password (8 to 50 characters)
        #[arg(short, long)]
        password: String,
    },
    /// Allow an account to request pictures again
    Activate {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Stop an account from requesting pictures
    Deactivate {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                password,
            } => {
                commands::user::create(&email, &name, &password).await?;
            }
            UserAction::Activate { email } => commands::user::set_active(&email, true).await?,
            UserAction::Deactivate { email } => commands::user::set_active(&email, false).await?,
        },
    }
    Ok(())
}
