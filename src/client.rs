use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use http_client::{HttpClient, Request};
use http_types::{Method, Url};

use crate::iterator::{PlaylistTracksIterator, UserPlaylistsIterator};
use crate::r#trait::{SpotifyClient, TokenProvider};
use crate::types::{
    ArtistInfo, ChangeAction, ClientEvent, ClientEventReceiver, ClientEventWatcher, Playlist,
    PlaylistPage, RequestInfo, RetryConfig, SharedEventBroadcaster, TrackPage, UserProfile,
    LIKED_TRACKS_ID,
};
use crate::{api, headers, retry, Result, SorterError};

const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Web API client over an injected HTTP transport.
///
/// All network access goes through the [`HttpClient`] passed at
/// construction, and all tokens come from the injected [`TokenProvider`],
/// so both seams can be replaced in tests. Requests that come back 401 are
/// retried exactly once after a token refresh; 429 responses are retried
/// with exponential backoff according to the [`RetryConfig`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use spotify_sorter::{
///     AuthConfig, AuthManager, OAuthTokenProvider, Result, SessionPersistence, SpotifyClient,
///     SpotifyClientImpl,
/// };
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<()> {
///     let session = SessionPersistence::load_session("wizzler")?;
///     let auth = AuthManager::new(
///         Box::new(http_client::native::NativeClient::new()),
///         AuthConfig::new(
///             "client-id".to_string(),
///             "client-secret".to_string(),
///             "http://localhost:8888/callback".to_string(),
///         ),
///     );
///     let provider = Arc::new(OAuthTokenProvider::new(auth, session));
///
///     let client = SpotifyClientImpl::new(
///         Box::new(http_client::native::NativeClient::new()),
///         provider,
///     );
///     let me = client.get_current_user().await?;
///     println!("Signed in as {}", me.id);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct SpotifyClientImpl {
    client: Arc<dyn HttpClient + Send + Sync>,
    token_provider: Arc<dyn TokenProvider>,
    api_base_url: String,
    retry_config: RetryConfig,
    broadcaster: Arc<SharedEventBroadcaster>,
}

impl SpotifyClientImpl {
    pub fn new(
        client: Box<dyn HttpClient + Send + Sync>,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            client: Arc::from(client),
            token_provider,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            retry_config: RetryConfig::default(),
            broadcaster: Arc::new(SharedEventBroadcaster::new()),
        }
    }

    /// Builds a second client that publishes into this client's event
    /// stream, sharing the token provider as well.
    pub fn with_shared_broadcaster(&self, client: Box<dyn HttpClient + Send + Sync>) -> Self {
        Self {
            client: Arc::from(client),
            token_provider: Arc::clone(&self.token_provider),
            api_base_url: self.api_base_url.clone(),
            retry_config: self.retry_config.clone(),
            broadcaster: Arc::clone(&self.broadcaster),
        }
    }

    /// Overrides the API base URL, mainly for tests.
    pub fn with_api_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base_url = base_url.into();
        self
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Subscribes to the live event stream.
    pub fn subscribe(&self) -> ClientEventReceiver {
        self.broadcaster.subscribe()
    }

    /// The most recent event, if any has been broadcast.
    pub fn latest_event(&self) -> Option<ClientEvent> {
        self.broadcaster.latest_event()
    }

    /// A watcher that yields each new latest event.
    pub fn latest_event_watcher(&self) -> ClientEventWatcher {
        self.broadcaster.latest_event_watcher()
    }

    /// Iterator over all of the user's playlists.
    pub fn user_playlists(&self) -> UserPlaylistsIterator<SpotifyClientImpl> {
        UserPlaylistsIterator::new(self.clone())
    }

    /// Iterator over a playlist's tracks, in playlist order.
    pub fn playlist_tracks(&self, playlist_id: &str) -> PlaylistTracksIterator<SpotifyClientImpl> {
        PlaylistTracksIterator::new(self.clone(), playlist_id.to_string())
    }

    async fn api_request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String> {
        let url = format!("{}/{}", self.api_base_url, path);
        let request_info = RequestInfo::from_url_and_method(&url, &method.to_string());
        let operation_name = request_info.short_description();

        let retry_result = retry::retry_with_backoff(
            self.retry_config.clone(),
            &operation_name,
            || self.send_with_auth(method, &url, &body, &request_info),
            |delay, _op| {
                self.broadcaster.broadcast_event(ClientEvent::RateLimited {
                    delay_seconds: delay,
                    request: Some(request_info.clone()),
                });
            },
        )
        .await?;

        Ok(retry_result.result)
    }

    /// One request attempt, allowing a single token refresh when the
    /// service rejects the credentials.
    async fn send_with_auth(
        &self,
        method: Method,
        url: &str,
        body: &Option<serde_json::Value>,
        request_info: &RequestInfo,
    ) -> Result<String> {
        match self.send_once(method, url, body, request_info).await {
            Err(SorterError::Auth(msg)) => {
                log::debug!("Access token rejected ({msg}), refreshing");
                let grant = self.token_provider.refresh().await?;
                self.broadcaster.broadcast_event(ClientEvent::TokenRefreshed {
                    expires_at: grant.expires_at,
                });
                self.send_once(method, url, body, request_info).await
            }
            other => other,
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: &Option<serde_json::Value>,
        request_info: &RequestInfo,
    ) -> Result<String> {
        let access_token = self
            .token_provider
            .access_token()
            .ok_or_else(|| SorterError::Auth("no access token available".to_string()))?;

        let mut request = Request::new(method, url.parse::<Url>().unwrap());
        headers::add_bearer_auth(&mut request, &access_token);
        if let Some(json) = body {
            headers::add_json_body_headers(&mut request);
            request.set_body(json.to_string());
        }

        self.broadcaster.broadcast_event(ClientEvent::RequestStarted {
            request: request_info.clone(),
        });
        let start = Instant::now();

        let mut response = self
            .client
            .send(request)
            .await
            .map_err(|e| SorterError::Http(e.to_string()))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let status: u16 = response.status().into();

        self.broadcaster.broadcast_event(ClientEvent::RequestCompleted {
            request: request_info.clone(),
            status_code: status,
            duration_ms,
        });

        let body_text = response
            .body_string()
            .await
            .map_err(|e| SorterError::Http(e.to_string()))?;

        match status {
            200..=299 => Ok(body_text),
            401 => Err(SorterError::Auth(
                api::parse_api_error_message(&body_text)
                    .unwrap_or_else(|| "access token rejected".to_string()),
            )),
            429 => {
                let retry_after = response
                    .header("retry-after")
                    .and_then(|h| h.get(0))
                    .and_then(|v| v.as_str().parse::<u64>().ok())
                    .unwrap_or(60);
                Err(SorterError::RateLimit { retry_after })
            }
            _ => Err(SorterError::Api {
                status,
                message: api::parse_api_error_message(&body_text)
                    .unwrap_or_else(|| "request failed".to_string()),
            }),
        }
    }

    async fn attempt_mutation(
        &self,
        playlist_id: &str,
        track_id: &str,
        action: ChangeAction,
    ) -> Result<()> {
        let start = Instant::now();
        let result = match action {
            ChangeAction::Add => self.add_request(playlist_id, track_id).await,
            ChangeAction::Remove => self.remove_request(playlist_id, track_id).await,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        self.broadcaster.broadcast_event(ClientEvent::MutationAttempted {
            playlist_id: playlist_id.to_string(),
            track_id: track_id.to_string(),
            action,
            success: result.is_ok(),
            error_message: result.as_ref().err().map(|e| e.to_string()),
            duration_ms,
        });

        result
    }

    async fn add_request(&self, playlist_id: &str, track_id: &str) -> Result<()> {
        if playlist_id == LIKED_TRACKS_ID {
            let body = serde_json::json!({ "ids": [track_id] });
            self.api_request(Method::Put, "me/tracks", Some(body)).await?;
        } else {
            let path = format!("playlists/{}/tracks", urlencoding::encode(playlist_id));
            let body = serde_json::json!({ "uris": [format!("spotify:track:{track_id}")] });
            self.api_request(Method::Post, &path, Some(body)).await?;
        }
        Ok(())
    }

    async fn remove_request(&self, playlist_id: &str, track_id: &str) -> Result<()> {
        if playlist_id == LIKED_TRACKS_ID {
            let body = serde_json::json!({ "ids": [track_id] });
            self.api_request(Method::Delete, "me/tracks", Some(body)).await?;
        } else {
            let path = format!("playlists/{}/tracks", urlencoding::encode(playlist_id));
            let body =
                serde_json::json!({ "tracks": [{ "uri": format!("spotify:track:{track_id}") }] });
            self.api_request(Method::Delete, &path, Some(body)).await?;
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl SpotifyClient for SpotifyClientImpl {
    async fn get_current_user(&self) -> Result<UserProfile> {
        let body = self.api_request(Method::Get, "me", None).await?;
        api::parse_user_profile(&body)
    }

    async fn get_user_playlists_page(&self, limit: u32, offset: u32) -> Result<PlaylistPage> {
        let path = format!("me/playlists?limit={limit}&offset={offset}");
        let body = self.api_request(Method::Get, &path, None).await?;
        api::parse_playlist_page(&body, offset)
    }

    async fn get_playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<TrackPage> {
        let path = if playlist_id == LIKED_TRACKS_ID {
            format!("me/tracks?limit={limit}&offset={offset}")
        } else {
            format!(
                "playlists/{}/tracks?limit={limit}&offset={offset}",
                urlencoding::encode(playlist_id)
            )
        };
        let body = self.api_request(Method::Get, &path, None).await?;
        api::parse_track_page(&body, offset)
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<Playlist> {
        let path = format!("users/{}/playlists", urlencoding::encode(user_id));
        let body = serde_json::json!({
            "name": name,
            "description": description,
            "public": public,
        });
        let response = self.api_request(Method::Post, &path, Some(body)).await?;
        api::parse_playlist(&response)
    }

    async fn add_track_to_playlist(&self, playlist_id: &str, track_id: &str) -> Result<()> {
        self.attempt_mutation(playlist_id, track_id, ChangeAction::Add)
            .await
    }

    async fn remove_track_from_playlist(&self, playlist_id: &str, track_id: &str) -> Result<()> {
        self.attempt_mutation(playlist_id, track_id, ChangeAction::Remove)
            .await
    }

    async fn get_artist(&self, artist_id: &str) -> Result<ArtistInfo> {
        let path = format!("artists/{}", urlencoding::encode(artist_id));
        let body = self.api_request(Method::Get, &path, None).await?;
        api::parse_artist(&body)
    }
}
