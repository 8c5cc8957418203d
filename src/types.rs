//! Core data types for playlist sorting operations.
//!
//! This module contains all the core data structures used throughout the crate,
//! including track and playlist metadata, pending membership changes, error types,
//! session state, configuration, and event handling.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch};

/// Pseudo playlist ID addressing the user's Liked Songs library.
///
/// Every client operation accepts this ID wherever a playlist ID is expected
/// and routes to the saved-tracks endpoints instead of the playlist endpoints,
/// so callers never special-case the library.
pub const LIKED_TRACKS_ID: &str = "liked";

// ================================================================================================
// TRACK AND PLAYLIST METADATA
// ================================================================================================

/// A single artist credit on a track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TrackArtist {
    /// The artist ID (absent for local-file credits)
    pub id: Option<String>,
    /// The artist display name
    pub name: String,
}

/// Represents a track in a playlist or in the user's library.
///
/// Local-file entries (`is_local`) have no playable catalog entry. They stay
/// in the track sequence so positions remain stable, and navigation skips
/// over them one at a time.
///
/// # Examples
///
/// ```rust
/// use spotify_sorter::{Track, TrackArtist};
///
/// let track = Track {
///     id: "4uLU6hMCjMI75M1A2tKUQC".to_string(),
///     name: "Never Gonna Give You Up".to_string(),
///     artists: vec![TrackArtist {
///         id: Some("0gxyHStUsqpMadRV0Di1Qt".to_string()),
///         name: "Rick Astley".to_string(),
///     }],
///     album: Some("Whenever You Need Somebody".to_string()),
///     artwork_url: None,
///     duration_ms: Some(213_000),
///     is_local: false,
/// };
///
/// println!("{} [{}]", track, track.duration_formatted());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Track {
    /// The track ID
    ///
    /// For local files without a catalog ID this falls back to the track URI,
    /// which is still unique within the sequence.
    pub id: String,
    /// The track name/title
    pub name: String,
    /// Artist credits, primary artist first
    pub artists: Vec<TrackArtist>,
    /// The album name (if available)
    pub album: Option<String>,
    /// Album artwork URL (if available)
    pub artwork_url: Option<String>,
    /// Duration in milliseconds (if known)
    pub duration_ms: Option<u64>,
    /// Whether this is a local file rather than a catalog track
    pub is_local: bool,
}

impl Track {
    /// All artist names joined with `", "`.
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// ID of the primary artist, if it has one.
    pub fn primary_artist_id(&self) -> Option<&str> {
        self.artists.first().and_then(|a| a.id.as_deref())
    }

    /// Duration formatted as `M:SS`, or `0:00` when unknown.
    pub fn duration_formatted(&self) -> String {
        match self.duration_ms {
            Some(ms) => {
                let total_seconds = ms / 1000;
                format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
            }
            None => "0:00".to_string(),
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist_names(), self.name)
    }
}

/// Represents a playlist owned by or followed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Playlist {
    /// The playlist ID, or [`LIKED_TRACKS_ID`] for the liked-songs pseudo entry
    pub id: String,
    /// The playlist display name
    pub name: String,
    /// Cover artwork URL (if available)
    pub artwork_url: Option<String>,
    /// Number of tracks reported by the service
    ///
    /// Zero for the liked-songs pseudo entry until a page has been fetched.
    pub track_count: u32,
}

impl Playlist {
    /// The liked-songs pseudo playlist.
    pub fn liked_tracks() -> Self {
        Playlist {
            id: LIKED_TRACKS_ID.to_string(),
            name: "Liked Songs".to_string(),
            artwork_url: None,
            track_count: 0,
        }
    }

    /// Whether this entry addresses the liked-songs library.
    pub fn is_liked_tracks(&self) -> bool {
        self.id == LIKED_TRACKS_ID
    }
}

/// The signed-in user's profile.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UserProfile {
    /// The user ID, used as the owner for created playlists
    pub id: String,
    /// Display name (absent for accounts that never set one)
    pub display_name: Option<String>,
}

/// Artist metadata used for the genre display.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ArtistInfo {
    /// The artist ID
    pub id: String,
    /// The artist name
    pub name: String,
    /// Genre tags, possibly empty
    pub genres: Vec<String>,
}

/// One page of tracks from a playlist or the liked-songs library.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPage {
    /// Tracks on this page, in playlist order
    pub tracks: Vec<Track>,
    /// Total number of tracks in the playlist
    pub total: u32,
    /// Offset of the next page, or `None` on the last page
    pub next_offset: Option<u32>,
}

impl TrackPage {
    /// Whether another page follows this one.
    pub fn has_next(&self) -> bool {
        self.next_offset.is_some()
    }
}

/// One page of the user's playlists.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistPage {
    /// Playlists on this page
    pub playlists: Vec<Playlist>,
    /// Total number of playlists
    pub total: u32,
    /// Offset of the next page, or `None` on the last page
    pub next_offset: Option<u32>,
}

impl PlaylistPage {
    /// Whether another page follows this one.
    pub fn has_next(&self) -> bool {
        self.next_offset.is_some()
    }
}

// ================================================================================================
// PENDING CHANGES AND SAVE REPORTING
// ================================================================================================

/// Direction of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ChangeAction {
    /// Add the track to the playlist
    Add,
    /// Remove the track from the playlist
    Remove,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Add => write!(f, "add"),
            ChangeAction::Remove => write!(f, "remove"),
        }
    }
}

/// A net membership change awaiting save.
///
/// The ledger guarantees at most one pending change per (track, playlist)
/// pair, and only records changes that differ from the cached remote state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PendingChange {
    /// The track being added or removed
    pub track_id: String,
    /// The playlist being modified
    pub playlist_id: String,
    /// Which direction the membership changes
    pub action: ChangeAction,
}

/// Outcome of committing a single pending change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeResult {
    /// The change that was attempted
    pub change: PendingChange,
    /// Whether the remote call succeeded
    pub success: bool,
    /// Error text for failed changes
    pub error_message: Option<String>,
}

/// Report of a save operation over the whole ledger.
///
/// Each change commits or fails independently. Failed changes remain
/// pending in the ledger after the save and show up here with their
/// error text.
///
/// # Examples
///
/// ```rust
/// use spotify_sorter::{ChangeAction, ChangeResult, PendingChange, SaveReport};
///
/// let report = SaveReport {
///     results: vec![ChangeResult {
///         change: PendingChange {
///             track_id: "t1".to_string(),
///             playlist_id: "p1".to_string(),
///             action: ChangeAction::Add,
///         },
///         success: true,
///         error_message: None,
///     }],
/// };
///
/// assert!(report.all_successful());
/// assert_eq!(report.summary_message(), "All 1 changes saved");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveReport {
    /// Per-change outcomes, in ledger order
    pub results: Vec<ChangeResult>,
}

impl SaveReport {
    /// Returns true if every change committed (vacuously true when empty).
    pub fn all_successful(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    /// Returns true if at least one change committed.
    pub fn any_successful(&self) -> bool {
        self.results.iter().any(|r| r.success)
    }

    /// Total number of changes attempted.
    pub fn total_changes(&self) -> usize {
        self.results.len()
    }

    /// Number of changes that committed.
    pub fn successful_changes(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Number of changes that failed and remain pending.
    pub fn failed_changes(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    /// One-line summary suitable for status displays.
    pub fn summary_message(&self) -> String {
        if self.results.is_empty() {
            "No changes to save".to_string()
        } else if self.all_successful() {
            format!("All {} changes saved", self.total_changes())
        } else {
            format!(
                "{} of {} changes saved, {} still pending",
                self.successful_changes(),
                self.total_changes(),
                self.failed_changes()
            )
        }
    }

    /// Detailed messages for the changes that failed.
    pub fn detailed_messages(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| {
                let preposition = match r.change.action {
                    ChangeAction::Add => "to",
                    ChangeAction::Remove => "from",
                };
                format!(
                    "Failed to {} track {} {} playlist {}: {}",
                    r.change.action,
                    r.change.track_id,
                    preposition,
                    r.change.playlist_id,
                    r.error_message.as_deref().unwrap_or("unknown error")
                )
            })
            .collect()
    }
}

// ================================================================================================
// ERROR TYPES
// ================================================================================================

/// Errors that can occur when talking to the service or driving a session.
#[derive(Debug, Error)]
pub enum SorterError {
    /// HTTP transport failure (connection, TLS, malformed response).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication failure.
    ///
    /// Raised when no access token is available, when the service rejects
    /// the token and a refresh does not help, or when an OAuth grant
    /// request itself fails.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The service rejected the request with a non-auth, non-rate-limit status.
    ///
    /// Carries the HTTP status code alongside the error message from the
    /// response body.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The service asked us to slow down.
    ///
    /// `retry_after` is the wait in seconds taken from the Retry-After
    /// header, defaulting to 60 when the header is missing or malformed.
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimit { retry_after: u64 },

    /// A response body could not be parsed.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// A slot index outside the board was used.
    #[error("Invalid slot index: {0}")]
    InvalidSlot(usize),

    /// The playlist is already bound to another slot.
    #[error("Playlist '{playlist}' is already assigned to slot {slot}")]
    SlotOccupied { playlist: String, slot: usize },

    /// The track sequence has no track at the requested position.
    #[error("No track at position {0}")]
    NoSuchTrack(usize),

    /// Filesystem failure while persisting or loading a session.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ================================================================================================
// SESSION MANAGEMENT
// ================================================================================================

/// Tokens returned by an OAuth grant (code exchange or refresh).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// The new bearer token
    pub access_token: String,
    /// Present on code exchange; refresh responses carry it only when the
    /// service rotates the refresh token
    pub refresh_token: Option<String>,
    /// Token type as reported by the service, normally `Bearer`
    pub token_type: String,
    /// Granted scopes, space separated
    pub scope: Option<String>,
    /// Absolute expiry computed from the grant's `expires_in`
    pub expires_at: DateTime<Utc>,
}

/// A persistent authenticated session.
///
/// Contains everything needed to restore API access without walking the
/// authorization flow again, for as long as the refresh token stays valid.
/// Sessions serialize to JSON for storage; see the `session_persistence`
/// module for the on-disk layout.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SpotifySession {
    /// The user ID this session belongs to
    pub username: String,
    /// Current bearer token
    pub access_token: String,
    /// Long-lived token used to mint new access tokens
    pub refresh_token: Option<String>,
    /// Token type as reported by the service, normally `Bearer`
    pub token_type: String,
    /// Granted scopes, space separated
    pub scope: Option<String>,
    /// When the current access token expires
    pub expires_at: DateTime<Utc>,
}

impl SpotifySession {
    /// Margin subtracted from the expiry when deciding whether a token is
    /// still usable, so requests do not race the deadline.
    const EXPIRY_MARGIN_SECS: i64 = 60;

    pub fn new(
        username: String,
        access_token: String,
        refresh_token: Option<String>,
        token_type: String,
        scope: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            username,
            access_token,
            refresh_token,
            token_type,
            scope,
            expires_at,
        }
    }

    /// Builds a session from a grant plus the resolved username.
    pub fn from_grant(username: String, grant: TokenGrant) -> Self {
        Self {
            username,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            token_type: grant.token_type,
            scope: grant.scope,
            expires_at: grant.expires_at,
        }
    }

    /// Folds a refresh grant into the session, keeping the existing refresh
    /// token unless the service rotated it.
    pub fn apply_grant(&mut self, grant: &TokenGrant) {
        self.access_token = grant.access_token.clone();
        self.token_type = grant.token_type.clone();
        self.expires_at = grant.expires_at;
        if grant.scope.is_some() {
            self.scope = grant.scope.clone();
        }
        if grant.refresh_token.is_some() {
            self.refresh_token = grant.refresh_token.clone();
        }
    }

    /// Whether the access token is past (or within a minute of) expiry.
    pub fn is_expired(&self) -> bool {
        Utc::now() + chrono::Duration::seconds(Self::EXPIRY_MARGIN_SECS) >= self.expires_at
    }

    /// Basic structural validity check.
    pub fn is_valid(&self) -> bool {
        !self.username.is_empty() && !self.access_token.is_empty()
    }

    /// Serializes the session to JSON for persistence.
    pub fn to_json(&self) -> Result<String, SorterError> {
        serde_json::to_string_pretty(self).map_err(|e| SorterError::Parse(e.to_string()))
    }

    /// Restores a session from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, SorterError> {
        serde_json::from_str(json).map_err(|e| SorterError::Parse(e.to_string()))
    }
}

// ================================================================================================
// CLIENT CONFIGURATION
// ================================================================================================

/// OAuth application credentials and endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Application client ID
    pub client_id: String,
    /// Application client secret
    pub client_secret: String,
    /// Redirect URI registered for the application
    pub redirect_uri: String,
    /// Base URL of the accounts service, overridable for tests
    pub accounts_base_url: String,
}

impl AuthConfig {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            accounts_base_url: "https://accounts.spotify.com".to_string(),
        }
    }

    pub fn with_accounts_base_url(mut self, base_url: String) -> Self {
        self.accounts_base_url = base_url;
        self
    }
}

/// Tuning knobs for the membership cache's exhaustive paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Tracks requested per page
    pub page_size: u32,
    /// Hard cap on pages per fetch
    ///
    /// Hitting the cap marks the playlist truncated but still fully loaded,
    /// so the session stays usable on oversized playlists.
    pub max_pages: usize,
    /// Pause between page requests within one fetch
    pub page_delay: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_pages: 200,
            page_delay: Duration::from_millis(100),
        }
    }
}

impl CacheConfig {
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Configuration without inter-page pauses, mainly for tests.
    pub fn without_delay(self) -> Self {
        self.with_page_delay(Duration::ZERO)
    }
}

/// Tuning knobs for the sorter session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SorterConfig {
    /// How close to the loaded tail the cursor may get before the next
    /// sequence page is fetched
    pub prefetch_lookahead: usize,
    /// Tracks requested per sequence page
    pub page_size: u32,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            prefetch_lookahead: 26,
            page_size: 50,
        }
    }
}

impl SorterConfig {
    pub fn with_prefetch_lookahead(mut self, prefetch_lookahead: usize) -> Self {
        self.prefetch_lookahead = prefetch_lookahead;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Configuration for rate-limit retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,
    /// Base delay in seconds for exponential backoff
    pub base_delay: u64,
    /// Ceiling on any single backoff wait, in seconds
    pub max_delay: u64,
    /// Whether retrying is enabled at all
    pub enabled: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: 2,
            max_delay: 60,
            enabled: true,
        }
    }
}

impl RetryConfig {
    /// Configuration with retries disabled.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: u64) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: u64) -> Self {
        self.max_delay = max_delay;
        self
    }
}

/// Result of an operation run through the retry helpers.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryResult<T> {
    /// The operation's result
    pub result: T,
    /// How many retries were needed
    pub retries_used: u32,
    /// Whether any rate limiting was encountered
    pub was_rate_limited: bool,
}

// ================================================================================================
// EVENT SYSTEM
// ================================================================================================

/// Information about an HTTP request, attached to events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// Full request URL
    pub url: String,
    /// HTTP method
    pub method: String,
}

impl RequestInfo {
    pub fn from_url_and_method(url: &str, method: &str) -> Self {
        Self {
            url: url.to_string(),
            method: method.to_string(),
        }
    }

    /// Compact `METHOD /path` form with host and query stripped.
    pub fn short_description(&self) -> String {
        let path = self
            .url
            .split_once("://")
            .and_then(|(_, rest)| rest.split_once('/'))
            .map(|(_, path)| path)
            .unwrap_or("");
        let path = path.split('?').next().unwrap_or(path);
        format!("{} /{}", self.method, path)
    }
}

/// Events broadcast by clients during API interactions.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A request is about to be sent
    RequestStarted {
        /// The request being sent
        request: RequestInfo,
    },
    /// A request completed with any status
    RequestCompleted {
        /// The request that completed
        request: RequestInfo,
        /// HTTP status code of the response
        status_code: u16,
        /// Wall-clock time the request took
        duration_ms: u64,
    },
    /// The service rate limited us and the client is waiting
    RateLimited {
        /// How long the client will wait before retrying
        delay_seconds: u64,
        /// The request that was rate limited, when known
        request: Option<RequestInfo>,
    },
    /// The access token was refreshed
    TokenRefreshed {
        /// Expiry of the new token
        expires_at: DateTime<Utc>,
    },
    /// A membership mutation was attempted
    MutationAttempted {
        /// Target playlist
        playlist_id: String,
        /// Track being added or removed
        track_id: String,
        /// Which direction the membership changed
        action: ChangeAction,
        /// Whether the service accepted the mutation
        success: bool,
        /// Error text when it did not
        error_message: Option<String>,
        /// Wall-clock time the attempt took
        duration_ms: u64,
    },
}

/// Receiver for the live event stream.
pub type ClientEventReceiver = broadcast::Receiver<ClientEvent>;

/// Watcher over the most recent event.
pub type ClientEventWatcher = watch::Receiver<Option<ClientEvent>>;

/// Fan-out point for [`ClientEvent`]s.
///
/// Combines a broadcast channel for live subscribers with a watch channel
/// holding the most recent event, so late subscribers can still inspect the
/// last thing that happened. Cloning shares the underlying channels, which
/// is how multiple clients publish into one stream.
#[derive(Clone)]
pub struct SharedEventBroadcaster {
    sender: broadcast::Sender<ClientEvent>,
    latest_tx: watch::Sender<Option<ClientEvent>>,
    latest_rx: watch::Receiver<Option<ClientEvent>>,
}

impl SharedEventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        let (latest_tx, latest_rx) = watch::channel(None);
        Self {
            sender,
            latest_tx,
            latest_rx,
        }
    }

    /// Publishes an event to all subscribers and records it as latest.
    pub fn broadcast_event(&self, event: ClientEvent) {
        // A send error just means nobody is listening right now.
        let _ = self.sender.send(event.clone());
        self.latest_tx.send_replace(Some(event));
    }

    /// Subscribes to the live event stream.
    pub fn subscribe(&self) -> ClientEventReceiver {
        self.sender.subscribe()
    }

    /// The most recent event, if any has been broadcast.
    pub fn latest_event(&self) -> Option<ClientEvent> {
        self.latest_rx.borrow().clone()
    }

    /// A watcher that yields each new latest event.
    pub fn latest_event_watcher(&self) -> ClientEventWatcher {
        self.latest_rx.clone()
    }
}

impl Default for SharedEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedEventBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEventBroadcaster")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

/// Bounded buffer of recent events, handy for diagnostics displays.
#[derive(Debug)]
pub struct EventHistory {
    events: VecDeque<ClientEvent>,
    capacity: usize,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: ClientEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ================================================================================================
// TESTS
// ================================================================================================
