mod api;

pub mod auth;
pub mod cache;
pub mod client;
pub mod headers;
pub mod iterator;
pub mod ledger;
pub mod reconcile;
pub mod retry;
pub mod session_persistence;
pub mod slots;
pub mod sorter;
pub mod r#trait;
pub mod types;

pub use auth::{AuthManager, OAuthTokenProvider, SCOPES};
pub use cache::MembershipCache;
pub use client::SpotifyClientImpl;
pub use iterator::{AsyncPaginatedIterator, PlaylistTracksIterator, UserPlaylistsIterator};
pub use ledger::ChangeLedger;
pub use reconcile::{displayed_state, slot_states, track_playlist_state};
pub use retry::{retry_operation, retry_with_backoff};
pub use session_persistence::SessionPersistence;
pub use slots::{SlotBoard, SLOT_COUNT};
pub use sorter::{GuardedOutcome, SlotView, SorterNotice, SorterSession, SorterState};
pub use r#trait::{SpotifyClient, TokenProvider};
pub use types::{
    ArtistInfo, AuthConfig, CacheConfig, ChangeAction, ChangeResult, ClientEvent,
    ClientEventReceiver, ClientEventWatcher, EventHistory, PendingChange, Playlist, PlaylistPage,
    RequestInfo, RetryConfig, RetryResult, SaveReport, SharedEventBroadcaster, SorterConfig,
    SorterError, SpotifySession, TokenGrant, Track, TrackArtist, TrackPage, UserProfile,
    LIKED_TRACKS_ID,
};

// Re-export mock types for testing
#[cfg(feature = "mock")]
pub use iterator::MockAsyncPaginatedIterator;
#[cfg(feature = "mock")]
pub use r#trait::{MockSpotifyClient, MockTokenProvider};

pub type Result<T> = std::result::Result<T, SorterError>;
