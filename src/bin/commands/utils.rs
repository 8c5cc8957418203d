use spotify_sorter::{
    AuthConfig, AuthManager, OAuthTokenProvider, SessionPersistence, SpotifyClientImpl,
};
use std::env;
use std::sync::Arc;

/// Fallback redirect URI when neither the flag nor the environment sets one.
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// OAuth application credentials, taken from flags first and the
/// environment second.
pub fn get_app_credentials(
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
) -> Result<AuthConfig, Box<dyn std::error::Error>> {
    let client_id = match client_id {
        Some(id) => id,
        None => env::var("SPOTIFY_CLIENT_ID")
            .map_err(|_| "SPOTIFY_CLIENT_ID environment variable not set")?,
    };
    let client_secret = match client_secret {
        Some(secret) => secret,
        None => env::var("SPOTIFY_CLIENT_SECRET")
            .map_err(|_| "SPOTIFY_CLIENT_SECRET environment variable not set")?,
    };
    let redirect_uri = redirect_uri
        .or_else(|| env::var("SPOTIFY_REDIRECT_URI").ok())
        .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

    Ok(AuthConfig::new(client_id, client_secret, redirect_uri))
}

/// Pick which saved user to operate as: the `--username` flag when given,
/// otherwise the single saved session.
pub fn resolve_username(flag: Option<&str>) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(username) = flag {
        return Ok(username.to_string());
    }

    let users = SessionPersistence::list_saved_users()?;
    match users.as_slice() {
        [] => Err("no saved session; run `spotify-sorter login` first".into()),
        [single] => Ok(single.clone()),
        many => Err(format!(
            "multiple saved sessions ({}); pick one with --username",
            many.join(", ")
        )
        .into()),
    }
}

/// Builds an API client from the saved session for a user.
///
/// Token refresh needs the application credentials, so SPOTIFY_CLIENT_ID
/// and SPOTIFY_CLIENT_SECRET must be set for every command, not just
/// login.
pub fn build_client(
    username: Option<&str>,
) -> Result<SpotifyClientImpl, Box<dyn std::error::Error>> {
    let username = resolve_username(username)?;
    let session = SessionPersistence::load_session(&username)?;

    let auth = AuthManager::new(
        Box::new(http_client::native::NativeClient::new()),
        get_app_credentials(None, None, None)?,
    );
    let provider = Arc::new(OAuthTokenProvider::new(auth, session));

    Ok(SpotifyClientImpl::new(
        Box::new(http_client::native::NativeClient::new()),
        provider,
    ))
}
