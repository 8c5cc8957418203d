#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use http_client::HttpClient;
use http_types::{Request, Response, StatusCode};

use spotify_sorter::{
    ArtistInfo, ChangeAction, Playlist, PlaylistPage, Result, SorterError, SpotifyClient,
    TokenGrant, TokenProvider, Track, TrackArtist, TrackPage, UserProfile,
};

pub fn make_track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        name: format!("Track {id}"),
        artists: vec![TrackArtist {
            id: Some(format!("artist-{id}")),
            name: format!("Artist {id}"),
        }],
        album: Some("Test Album".to_string()),
        artwork_url: None,
        duration_ms: Some(180_000),
        is_local: false,
    }
}

pub fn make_local_track(id: &str) -> Track {
    let mut track = make_track(id);
    track.is_local = true;
    track
}

/// Tracks `prefix0` through `prefix{count-1}`.
pub fn make_tracks(prefix: &str, count: usize) -> Vec<Track> {
    (0..count).map(|i| make_track(&format!("{prefix}{i}"))).collect()
}

pub fn make_playlist(id: &str, name: &str) -> Playlist {
    Playlist {
        id: id.to_string(),
        name: name.to_string(),
        artwork_url: None,
        track_count: 0,
    }
}

pub fn make_artist(id: &str, genres: &[&str]) -> ArtistInfo {
    ArtistInfo {
        id: id.to_string(),
        name: format!("Artist {id}"),
        genres: genres.iter().map(|g| g.to_string()).collect(),
    }
}

#[derive(Debug, Default)]
struct ScriptedInner {
    user: Option<UserProfile>,
    playlists: Vec<Playlist>,
    tracks: HashMap<String, Vec<Track>>,
    artists: HashMap<String, ArtistInfo>,
    page_fetches: HashMap<String, u32>,
    playlist_page_fetches: u32,
    artist_fetches: u32,
    mutations: Vec<(String, String, ChangeAction)>,
    fail_page_fetches: HashSet<String>,
    fail_mutations: HashSet<(String, String)>,
    created: u32,
}

/// In-memory [`SpotifyClient`] backed by scripted data.
///
/// Serves tracks in pages that honor limit and offset, counts page
/// fetches per playlist, records committed mutations, and can be told to
/// fail page fetches or individual mutations.
#[derive(Clone, Debug, Default)]
pub struct ScriptedClient {
    inner: Arc<Mutex<ScriptedInner>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, user_id: &str) -> Self {
        self.inner.lock().unwrap().user = Some(UserProfile {
            id: user_id.to_string(),
            display_name: Some(format!("User {user_id}")),
        });
        self
    }

    pub fn set_tracks(&self, playlist_id: &str, tracks: Vec<Track>) {
        self.inner
            .lock()
            .unwrap()
            .tracks
            .insert(playlist_id.to_string(), tracks);
    }

    pub fn set_playlists(&self, playlists: Vec<Playlist>) {
        self.inner.lock().unwrap().playlists = playlists;
    }

    pub fn set_artist(&self, artist: ArtistInfo) {
        self.inner
            .lock()
            .unwrap()
            .artists
            .insert(artist.id.clone(), artist);
    }

    /// Make every page fetch for this playlist fail until cleared.
    pub fn fail_page_fetches_for(&self, playlist_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_page_fetches
            .insert(playlist_id.to_string());
    }

    pub fn clear_page_failure(&self, playlist_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_page_fetches
            .remove(playlist_id);
    }

    /// Make one (playlist, track) mutation fail.
    pub fn fail_mutation(&self, playlist_id: &str, track_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_mutations
            .insert((playlist_id.to_string(), track_id.to_string()));
    }

    /// How many track pages have been requested for this playlist.
    pub fn page_fetches(&self, playlist_id: &str) -> u32 {
        *self
            .inner
            .lock()
            .unwrap()
            .page_fetches
            .get(playlist_id)
            .unwrap_or(&0)
    }

    pub fn artist_fetches(&self) -> u32 {
        self.inner.lock().unwrap().artist_fetches
    }

    /// Committed mutations in the order the fake saw them.
    pub fn mutations(&self) -> Vec<(String, String, ChangeAction)> {
        self.inner.lock().unwrap().mutations.clone()
    }

    fn record_mutation(&self, playlist_id: &str, track_id: &str, action: ChangeAction) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .fail_mutations
            .contains(&(playlist_id.to_string(), track_id.to_string()))
        {
            return Err(SorterError::Api {
                status: 500,
                message: format!("scripted mutation failure for {track_id}"),
            });
        }

        inner
            .mutations
            .push((playlist_id.to_string(), track_id.to_string(), action));

        // Keep the scripted library consistent with committed mutations.
        let tracks = inner.tracks.entry(playlist_id.to_string()).or_default();
        match action {
            ChangeAction::Add => tracks.push(make_track(track_id)),
            ChangeAction::Remove => tracks.retain(|t| t.id != track_id),
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl SpotifyClient for ScriptedClient {
    async fn get_current_user(&self) -> Result<UserProfile> {
        self.inner
            .lock()
            .unwrap()
            .user
            .clone()
            .ok_or_else(|| SorterError::Auth("no scripted user".to_string()))
    }

    async fn get_user_playlists_page(&self, limit: u32, offset: u32) -> Result<PlaylistPage> {
        let inner = &mut *self.inner.lock().unwrap();
        inner.playlist_page_fetches += 1;

        let all = &inner.playlists;
        let start = (offset as usize).min(all.len());
        let end = (start + limit as usize).min(all.len());
        Ok(PlaylistPage {
            playlists: all[start..end].to_vec(),
            total: all.len() as u32,
            next_offset: (end < all.len()).then_some(end as u32),
        })
    }

    async fn get_playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<TrackPage> {
        // Yield first so concurrent fetches genuinely interleave instead
        // of completing within a single poll.
        tokio::task::yield_now().await;

        let inner = &mut *self.inner.lock().unwrap();
        *inner
            .page_fetches
            .entry(playlist_id.to_string())
            .or_insert(0) += 1;

        if inner.fail_page_fetches.contains(playlist_id) {
            return Err(SorterError::Http(format!(
                "scripted page failure for {playlist_id}"
            )));
        }

        let all = inner.tracks.get(playlist_id).cloned().unwrap_or_default();
        let start = (offset as usize).min(all.len());
        let end = (start + limit as usize).min(all.len());
        Ok(TrackPage {
            tracks: all[start..end].to_vec(),
            total: all.len() as u32,
            next_offset: (end < all.len()).then_some(end as u32),
        })
    }

    async fn create_playlist(
        &self,
        _user_id: &str,
        name: &str,
        _description: &str,
        _public: bool,
    ) -> Result<Playlist> {
        let inner = &mut *self.inner.lock().unwrap();
        inner.created += 1;
        let id = format!("created-{}", inner.created);
        let playlist = make_playlist(&id, name);
        inner.playlists.push(playlist.clone());
        inner.tracks.insert(id, Vec::new());
        Ok(playlist)
    }

    async fn add_track_to_playlist(&self, playlist_id: &str, track_id: &str) -> Result<()> {
        self.record_mutation(playlist_id, track_id, ChangeAction::Add)
    }

    async fn remove_track_from_playlist(&self, playlist_id: &str, track_id: &str) -> Result<()> {
        self.record_mutation(playlist_id, track_id, ChangeAction::Remove)
    }

    async fn get_artist(&self, artist_id: &str) -> Result<ArtistInfo> {
        let inner = &mut *self.inner.lock().unwrap();
        inner.artist_fetches += 1;
        inner.artists.get(artist_id).cloned().ok_or_else(|| SorterError::Api {
            status: 404,
            message: format!("unknown artist {artist_id}"),
        })
    }
}

/// One canned HTTP response for [`ReplayHttpClient`].
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl ScriptedResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
        }
    }

    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            status: 429,
            body: r#"{"error":{"status":429,"message":"rate limited"}}"#.to_string(),
            headers: vec![("retry-after".to_string(), retry_after.to_string())],
        }
    }
}

/// What a [`ReplayHttpClient`] observed about one request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
    pub authorization: Option<String>,
}

/// [`HttpClient`] that replays a fixed queue of responses and records the
/// requests it saw, for exercising the real wire client without a network.
#[derive(Debug, Clone, Default)]
pub struct ReplayHttpClient {
    responses: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ReplayHttpClient {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(&self, response: ScriptedResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining_responses(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for ReplayHttpClient {
    async fn send(&self, req: Request) -> std::result::Result<Response, http_types::Error> {
        let responses = Arc::clone(&self.responses);
        let requests = Arc::clone(&self.requests);

        let mut req = req;
        let body = req.body_string().await.unwrap_or_default();
        requests.lock().unwrap().push(RecordedRequest {
            method: req.method().to_string(),
            url: req.url().to_string(),
            body,
            authorization: req
                .header("authorization")
                .map(|values| values.last().as_str().to_string()),
        });

        let scripted = responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("ReplayHttpClient ran out of scripted responses");

        let mut response = Response::new(StatusCode::try_from(scripted.status).unwrap());
        for (name, value) in &scripted.headers {
            response.insert_header(name.as_str(), value.as_str());
        }
        response.set_body(scripted.body);
        Ok(response)
    }
}

/// [`TokenProvider`] that hands out a scripted token and counts refreshes.
#[derive(Debug, Clone, Default)]
pub struct FakeTokenProvider {
    token: Arc<Mutex<Option<String>>>,
    refreshes: Arc<Mutex<u32>>,
}

impl FakeTokenProvider {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token.to_string()))),
            refreshes: Arc::new(Mutex::new(0)),
        }
    }

    pub fn refreshes(&self) -> u32 {
        *self.refreshes.lock().unwrap()
    }
}

#[async_trait(?Send)]
impl TokenProvider for FakeTokenProvider {
    fn access_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    async fn refresh(&self) -> Result<TokenGrant> {
        let count = {
            let mut refreshes = self.refreshes.lock().unwrap();
            *refreshes += 1;
            *refreshes
        };
        let token = format!("refreshed-token-{count}");
        *self.token.lock().unwrap() = Some(token.clone());
        Ok(TokenGrant {
            access_token: token,
            refresh_token: None,
            token_type: "Bearer".to_string(),
            scope: None,
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(3600),
        })
    }
}
