use clap::Parser;

mod commands;

use commands::{execute_command, Commands};

/// Spotify playlist sorter
#[derive(Parser)]
#[command(
    name = "spotify-sorter",
    about = "Sort Spotify tracks into playlists from the command line",
    long_about = None
)]
struct Cli {
    /// Saved session to operate as (defaults to the only saved user)
    #[arg(long, global = true)]
    username: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Cli::parse();

    if let Err(e) = execute_command(args.command, args.username).await {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }

    Ok(())
}
