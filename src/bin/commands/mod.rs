pub mod list;
pub mod login;
pub mod utils;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in to Spotify and save a session
    ///
    /// This command walks the OAuth authorization-code flow: it prints the
    /// authorization URL, waits for you to paste the redirect URL (or just
    /// the code) back in, exchanges it for tokens, and saves the session
    /// under your Spotify user ID.
    ///
    /// Usage examples:
    /// # Credentials from the environment
    /// SPOTIFY_CLIENT_ID=... SPOTIFY_CLIENT_SECRET=... spotify-sorter login
    ///
    /// # Credentials on the command line
    /// spotify-sorter login --client-id abc123 --client-secret def456
    Login {
        /// Spotify application client ID (defaults to $SPOTIFY_CLIENT_ID)
        #[arg(long)]
        client_id: Option<String>,

        /// Spotify application client secret (defaults to $SPOTIFY_CLIENT_SECRET)
        #[arg(long)]
        client_secret: Option<String>,

        /// OAuth redirect URI registered for the application
        /// (defaults to $SPOTIFY_REDIRECT_URI, then http://127.0.0.1:8888/callback)
        #[arg(long)]
        redirect_uri: Option<String>,
    },

    /// Show the signed-in user
    Whoami,

    /// List your playlists
    ///
    /// Liked Songs is listed first as the pseudo-playlist `liked`,
    /// followed by every playlist on the account.
    ///
    /// Usage examples:
    /// # All playlists
    /// spotify-sorter playlists
    ///
    /// # First ten
    /// spotify-sorter playlists --limit 10
    Playlists {
        /// Maximum number of playlists to show (0 for no limit)
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// List tracks in a playlist
    ///
    /// Usage examples:
    /// # First 50 tracks of a playlist
    /// spotify-sorter tracks 37i9dQZF1DXcBWIGoYBM5M --limit 50
    ///
    /// # All Liked Songs
    /// spotify-sorter tracks liked
    Tracks {
        /// Playlist ID, or `liked` for Liked Songs
        playlist_id: String,

        /// Maximum number of tracks to show (0 for no limit)
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// Remove the saved session
    Logout,
}

/// Execute the appropriate command handler based on the parsed command
pub async fn execute_command(
    command: Commands,
    username: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Login {
            client_id,
            client_secret,
            redirect_uri,
        } => login::handle_login(client_id, client_secret, redirect_uri).await,

        Commands::Whoami => {
            let client = utils::build_client(username.as_deref())?;
            list::handle_whoami(&client).await
        }

        Commands::Playlists { limit } => {
            let client = utils::build_client(username.as_deref())?;
            list::handle_playlists(&client, limit).await
        }

        Commands::Tracks { playlist_id, limit } => {
            let client = utils::build_client(username.as_deref())?;
            list::handle_tracks(&client, &playlist_id, limit).await
        }

        Commands::Logout => login::handle_logout(username.as_deref()),
    }
}
