mod commands;
mod config;
mod fs_vault;
mod watcher;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "folder-links", version, about = "Links to folders in a markdown vault")]
struct Cli {
    /// Vault directory
    #[arg(long, env = "FOLDER_LINKS_VAULT", default_value = ".")]
    vault: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every folder link and whether its folder exists
    Check {
        /// Exit with an error if any link is unresolved
        #[arg(long)]
        strict: bool,
    },

    /// Create the folder a link points to, or show it if it exists
    Create { link: String },

    /// Move a folder and update the links pointing into it
    Rename {
        old: String,
        new: String,
        /// Update links without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Keep running and report folder links as they resolve or break
    Watch,

    /// Show or change settings
    Settings {
        #[arg(long)]
        show_in_outgoing_links: Option<bool>,
        #[arg(long)]
        always_update: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let vault = cli.vault.as_path();

    match cli.command {
        Commands::Check { strict } => commands::check(vault, strict),
        Commands::Create { link } => commands::create(vault, &link),
        Commands::Rename { old, new, yes } => commands::rename(vault, &old, &new, yes),
        Commands::Watch => commands::watch(vault).await,
        Commands::Settings {
            show_in_outgoing_links,
            always_update,
        } => commands::settings(vault, show_in_outgoing_links, always_update),
    }
}
