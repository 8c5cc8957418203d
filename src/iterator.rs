use crate::r#trait::SpotifyClient;
use crate::{Playlist, PlaylistPage, Result, Track, TrackPage};

use async_trait::async_trait;

/// Async iterator trait for paginated Web API data.
///
/// This trait provides a common interface for iterating over paginated data
/// from the service, such as playlists and playlist tracks. All iterators
/// stream items one at a time and fetch pages lazily as the consumer
/// advances.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait(?Send)]
pub trait AsyncPaginatedIterator<T> {
    /// Fetch the next item from the iterator.
    ///
    /// This method automatically handles pagination, fetching new pages as needed.
    /// Returns `None` when there are no more items available.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(item))` - Next item in the sequence
    /// - `Ok(None)` - No more items available
    /// - `Err(...)` - Network or parsing error occurred
    async fn next(&mut self) -> Result<Option<T>>;

    /// Collect all remaining items into a Vec.
    ///
    /// **Warning**: This method will fetch ALL remaining pages, which could be
    /// many thousands of items for large libraries. Use [`take`](Self::take) for
    /// safer bounded collection.
    async fn collect_all(&mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Take up to n items from the iterator.
    ///
    /// This is the recommended way to collect a bounded number of items
    /// from potentially large datasets.
    ///
    /// # Arguments
    ///
    /// * `n` - Maximum number of items to collect
    async fn take(&mut self, n: usize) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for _ in 0..n {
            match self.next().await? {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(items)
    }

    /// Get the total number of items, if known.
    ///
    /// This information is not available until at least one page has been
    /// fetched.
    fn total_items(&self) -> Option<u32> {
        None // Default implementation returns None
    }
}

/// Iterator over the tracks of a playlist, in playlist order.
///
/// Accepts [`crate::LIKED_TRACKS_ID`] to walk the liked-songs library.
/// Local-file entries are yielded like any other track; skipping them is a
/// navigation concern, not a paging one.
///
/// Besides the item-at-a-time [`AsyncPaginatedIterator`] interface, the
/// iterator exposes [`next_page`](Self::next_page) for callers that want to
/// consume whole pages, which is how the sorter session prefetches its
/// track sequence.
pub struct PlaylistTracksIterator<C: SpotifyClient> {
    client: C,
    playlist_id: String,
    page_size: u32,
    next_offset: u32,
    has_more: bool,
    buffer: Vec<Track>,
    total: Option<u32>,
    pages_fetched: u32,
}

impl<C: SpotifyClient> PlaylistTracksIterator<C> {
    pub fn new(client: C, playlist_id: String) -> Self {
        Self {
            client,
            playlist_id,
            page_size: 50,
            next_offset: 0,
            has_more: true,
            buffer: Vec::new(),
            total: None,
            pages_fetched: 0,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Starts iteration at an arbitrary offset instead of the beginning.
    pub fn with_starting_offset(mut self, offset: u32) -> Self {
        self.next_offset = offset;
        self
    }

    /// The playlist this iterator walks.
    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Whether more pages remain to be fetched.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Fetch the next whole page, advancing the cursor.
    ///
    /// Returns `None` once the last page has been consumed.
    pub async fn next_page(&mut self) -> Result<Option<TrackPage>> {
        if !self.has_more {
            return Ok(None);
        }

        let page = self
            .client
            .get_playlist_tracks_page(&self.playlist_id, self.page_size, self.next_offset)
            .await?;

        self.pages_fetched += 1;
        self.total = Some(page.total);
        match page.next_offset {
            Some(next) => self.next_offset = next,
            None => self.has_more = false,
        }

        Ok(Some(page))
    }
}

#[async_trait(?Send)]
impl<C: SpotifyClient> AsyncPaginatedIterator<Track> for PlaylistTracksIterator<C> {
    async fn next(&mut self) -> Result<Option<Track>> {
        if self.buffer.is_empty() && self.has_more {
            if let Some(page) = self.next_page().await? {
                self.buffer = page.tracks;
                self.buffer.reverse(); // Reverse so we can pop from the end efficiently
            }
        }
        Ok(self.buffer.pop())
    }

    fn total_items(&self) -> Option<u32> {
        self.total
    }
}

/// Iterator over the user's playlists.
pub struct UserPlaylistsIterator<C: SpotifyClient> {
    client: C,
    page_size: u32,
    next_offset: u32,
    has_more: bool,
    buffer: Vec<Playlist>,
    total: Option<u32>,
    pages_fetched: u32,
}

impl<C: SpotifyClient> UserPlaylistsIterator<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            page_size: 50,
            next_offset: 0,
            has_more: true,
            buffer: Vec::new(),
            total: None,
            pages_fetched: 0,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Fetch the next whole page, advancing the cursor.
    ///
    /// Returns `None` once the last page has been consumed.
    pub async fn next_page(&mut self) -> Result<Option<PlaylistPage>> {
        if !self.has_more {
            return Ok(None);
        }

        let page = self
            .client
            .get_user_playlists_page(self.page_size, self.next_offset)
            .await?;

        self.pages_fetched += 1;
        self.total = Some(page.total);
        match page.next_offset {
            Some(next) => self.next_offset = next,
            None => self.has_more = false,
        }

        Ok(Some(page))
    }
}

#[async_trait(?Send)]
impl<C: SpotifyClient> AsyncPaginatedIterator<Playlist> for UserPlaylistsIterator<C> {
    async fn next(&mut self) -> Result<Option<Playlist>> {
        if self.buffer.is_empty() && self.has_more {
            if let Some(page) = self.next_page().await? {
                self.buffer = page.playlists;
                self.buffer.reverse(); // Reverse so we can pop from the end efficiently
            }
        }
        Ok(self.buffer.pop())
    }

    fn total_items(&self) -> Option<u32> {
        self.total
    }
}
