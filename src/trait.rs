use crate::{ArtistInfo, Playlist, PlaylistPage, Result, TokenGrant, TrackPage, UserProfile};
use async_trait::async_trait;

/// Trait for Web API operations that can be mocked for testing.
///
/// This trait abstracts the service access the membership cache, the
/// pagination iterators, and the sorter session are built on, so all of
/// them can be exercised against fakes. Playlist IDs are accepted as plain
/// strings; passing [`crate::LIKED_TRACKS_ID`] addresses the user's liked
/// songs through the same operations.
///
/// # Mocking Support
///
/// When the `mock` feature is enabled, this crate provides `MockSpotifyClient`
/// that implements this trait using the `mockall` library.
///
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait SpotifyClient {
    /// Fetch the signed-in user's profile.
    async fn get_current_user(&self) -> Result<UserProfile>;

    /// Fetch one page of the user's playlists.
    async fn get_user_playlists_page(&self, limit: u32, offset: u32) -> Result<PlaylistPage>;

    /// Fetch one page of a playlist's tracks, in playlist order.
    ///
    /// [`crate::LIKED_TRACKS_ID`] routes to the saved-tracks endpoint; any
    /// other ID routes to the playlist-tracks endpoint.
    async fn get_playlist_tracks_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<TrackPage>;

    /// Create a new playlist owned by `user_id`.
    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<Playlist>;

    /// Add a track to a playlist (or save it to the library for the liked
    /// pseudo ID). Adding a track that is already present is accepted by
    /// the service, so the call is safe to repeat.
    async fn add_track_to_playlist(&self, playlist_id: &str, track_id: &str) -> Result<()>;

    /// Remove a track from a playlist (or from the library for the liked
    /// pseudo ID). Removing an absent track is accepted by the service.
    async fn remove_track_from_playlist(&self, playlist_id: &str, track_id: &str) -> Result<()>;

    /// Fetch artist metadata, including genre tags.
    async fn get_artist(&self, artist_id: &str) -> Result<ArtistInfo>;

    /// Fetch every playlist the user owns or follows.
    async fn get_all_user_playlists(&self) -> Result<Vec<Playlist>> {
        let mut playlists = Vec::new();
        let mut offset = 0;

        loop {
            log::debug!("Fetching playlists page at offset {offset}");
            let page = self.get_user_playlists_page(50, offset).await?;
            playlists.extend(page.playlists);

            match page.next_offset {
                Some(next) => offset = next,
                None => break,
            }
        }

        log::debug!("Fetched {} playlists", playlists.len());
        Ok(playlists)
    }
}

/// Trait for bearer-token acquisition, mockable for testing.
///
/// The client impl asks for the current token before each request and for a
/// refresh after an auth rejection. Implementations must collapse
/// overlapping `refresh` calls into a single grant request so that a burst
/// of concurrently failing requests does not stampede the token endpoint.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait TokenProvider {
    /// The current access token, if one is held.
    fn access_token(&self) -> Option<String>;

    /// Obtain a fresh access token, joining any refresh already in flight.
    async fn refresh(&self) -> Result<TokenGrant>;
}
