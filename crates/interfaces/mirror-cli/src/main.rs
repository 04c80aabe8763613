mod commands;
mod logging;

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(author, version, about = "Mirror sync CLI for a federated patch distribution network")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactively add a repo or patch from an upstream origin.
    Add,
    /// Poll every mirrored repo for upstream changes and converge the tree.
    Update {
        #[arg(long, default_value = ".")]
        mirror: Utf8PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let script_dir = Utf8PathBuf::from_path_buf(std::env::current_dir()?)
        .expect("current directory must be valid UTF-8");

    match cli.command {
        Commands::Add => {
            let subscriber = tracing_subscriber::fmt().with_max_level(Level::INFO).finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
            commands::cmd_add(script_dir).await
        }
        Commands::Update { mirror } => {
            // Update runs additionally write a rotating daily log (spec §7).
            let _guard = logging::init(&script_dir.join("logs"));
            commands::cmd_update(mirror, script_dir).await
        }
    }
}
