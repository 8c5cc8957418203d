use std::io::{self, BufRead, Write};
use std::sync::Arc;

use spotify_sorter::{
    AuthManager, OAuthTokenProvider, SessionPersistence, SpotifyClient, SpotifyClientImpl,
    SpotifySession,
};

use super::utils;

/// Walk the authorization-code flow end to end and save the session.
pub async fn handle_login(
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = utils::get_app_credentials(client_id, client_secret, redirect_uri)?;
    let auth = AuthManager::new(Box::new(http_client::native::NativeClient::new()), config);

    // State ties the callback to this login attempt.
    let state = format!(
        "{:08x}{:x}",
        std::process::id(),
        chrono::Utc::now().timestamp_millis()
    );

    println!("🔗 Open this URL in your browser and authorize the app:");
    println!();
    println!("   {}", auth.authorize_url(&state));
    println!();
    println!("📋 Paste the URL you were redirected to (or just the code):");
    print!("> ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    let code = extract_code(input.trim(), &state)?;

    println!("🔄 Exchanging authorization code for tokens...");
    let grant = auth.exchange_code(&code).await?;

    // Session files are keyed by user ID, which only the API can tell us.
    // Run one request through a provisional session to learn it.
    let provisional = SpotifySession::from_grant(String::new(), grant.clone());
    let provider = Arc::new(OAuthTokenProvider::new(auth.clone(), provisional));
    let client = SpotifyClientImpl::new(
        Box::new(http_client::native::NativeClient::new()),
        provider,
    );
    let me = client.get_current_user().await?;

    let session = SpotifySession::from_grant(me.id.clone(), grant);
    SessionPersistence::save_session(&session)?;

    match me.display_name {
        Some(name) => println!("✅ Signed in as {name} ({})", me.id),
        None => println!("✅ Signed in as {}", me.id),
    }
    Ok(())
}

/// Remove the saved session for the resolved user.
pub fn handle_logout(username: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let username = utils::resolve_username(username)?;
    SessionPersistence::remove_session(&username)?;
    println!("👋 Removed saved session for {username}");
    Ok(())
}

/// Accepts either the raw authorization code or the full redirect URL,
/// checking the state parameter when a URL is given.
fn extract_code(input: &str, expected_state: &str) -> Result<String, Box<dyn std::error::Error>> {
    if !input.contains("://") {
        return Ok(input.to_string());
    }

    let url: http_types::Url = input.parse()?;
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => return Err(format!("authorization was denied: {value}").into()),
            _ => {}
        }
    }

    if let Some(state) = state {
        if state != expected_state {
            return Err("state in redirect URL does not match this login attempt".into());
        }
    }

    code.ok_or_else(|| "redirect URL carries no authorization code".into())
}
