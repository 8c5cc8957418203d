//! Sorter session: the state machine driving one pass over a track
//! sequence.
//!
//! A session walks a source playlist track by track while the user flips
//! membership in up to ten target playlists. Toggles are collected in a
//! [`ChangeLedger`] and committed in one batch by [`SorterSession::save`];
//! nothing touches the service until then.

use std::fmt;

use futures::future::join_all;
use tokio::sync::watch;

use crate::cache::MembershipCache;
use crate::iterator::PlaylistTracksIterator;
use crate::ledger::ChangeLedger;
use crate::r#trait::SpotifyClient;
use crate::reconcile;
use crate::slots::{SlotBoard, SLOT_COUNT};
use crate::types::{
    CacheConfig, ChangeAction, ChangeResult, Playlist, SaveReport, SorterConfig, SorterError,
    Track, UserProfile,
};
use crate::Result;

/// Description attached to playlists created from inside a session.
const CREATED_PLAYLIST_DESCRIPTION: &str = "Created with spotify-sorter";

/// Something the session wants the user to know about, published with the
/// state snapshot it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SorterNotice {
    /// A local-file track was passed over during navigation.
    UnplayableSkipped { track_name: String },
    /// A playlist hit the page cap while loading; membership for it is
    /// incomplete.
    PlaylistTruncated { playlist_id: String },
    /// A playlist failed to load; its membership reads as empty.
    PlaylistLoadFailed { playlist_id: String },
}

impl fmt::Display for SorterNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SorterNotice::UnplayableSkipped { track_name } => {
                write!(f, "Skipped unplayable track '{track_name}'")
            }
            SorterNotice::PlaylistTruncated { playlist_id } => {
                write!(f, "Playlist {playlist_id} is too large; only part of it was loaded")
            }
            SorterNotice::PlaylistLoadFailed { playlist_id } => {
                write!(f, "Failed to load playlist {playlist_id}")
            }
        }
    }
}

/// One slot as the user sees it: its playlist, and whether the current
/// track displays as a member of that playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotView {
    pub slot: usize,
    pub playlist: Option<Playlist>,
    /// Displayed membership of the current track, pending changes applied.
    pub active: bool,
}

/// Snapshot of everything a frontend needs to render the session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SorterState {
    /// Cursor position in the source sequence, 0-based
    pub position: usize,
    /// How many sequence tracks are loaded so far
    pub loaded_tracks: usize,
    /// Total tracks the service reports for the sequence
    pub total_tracks: u32,
    pub current_track: Option<Track>,
    /// Genres of the current track's primary artist, possibly empty
    pub artist_genres: Vec<String>,
    /// All ten slots in order, empty ones included
    pub slots: Vec<SlotView>,
    /// Number of unsaved ledger entries
    pub pending_changes: usize,
    /// Whether a load, save, or create is in progress
    pub busy: bool,
    pub notice: Option<SorterNotice>,
}

/// Answer from an interaction that may need the user to resolve pending
/// changes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedOutcome {
    Done,
    /// Pending changes stand in the way; save or discard them, or repeat
    /// the interaction through its confirmed variant.
    NeedsConfirmation,
}

/// A single sorting pass over one source playlist.
///
/// All interaction goes through `&mut self`, so one interaction finishes
/// before the next begins; the busy flag in [`SorterState`] exists for
/// frontends to grey out controls, not for correctness.
///
/// # Examples
///
/// ```rust,no_run
/// use spotify_sorter::{SorterSession, SpotifyClientImpl, LIKED_TRACKS_ID};
///
/// # async fn example(client: SpotifyClientImpl) -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = SorterSession::new(client, LIKED_TRACKS_ID);
/// session.start().await?;
///
/// while let Some(track) = session.current_track() {
///     println!("Now sorting: {track}");
///     session.toggle_playlist(1)?;
///     if !session.go_next().await {
///         break;
///     }
/// }
///
/// let report = session.save().await;
/// println!("{}", report.summary_message());
/// # Ok(())
/// # }
/// ```
pub struct SorterSession<C: SpotifyClient + Clone + 'static> {
    client: C,
    cache: MembershipCache<C>,
    ledger: ChangeLedger,
    slots: SlotBoard,
    config: SorterConfig,
    sequence: PlaylistTracksIterator<C>,
    tracks: Vec<Track>,
    total_tracks: u32,
    position: usize,
    user: Option<UserProfile>,
    artist_genres: Vec<String>,
    notice: Option<SorterNotice>,
    busy: bool,
    state_tx: watch::Sender<SorterState>,
}

impl<C: SpotifyClient + Clone + 'static> SorterSession<C> {
    /// Creates a session over the given source playlist with default
    /// configuration. Use [`LIKED_TRACKS_ID`](crate::LIKED_TRACKS_ID) to
    /// sort the user's Liked Songs.
    pub fn new(client: C, source_playlist_id: &str) -> Self {
        Self::with_config(
            client,
            source_playlist_id,
            SorterConfig::default(),
            CacheConfig::default(),
        )
    }

    pub fn with_config(
        client: C,
        source_playlist_id: &str,
        config: SorterConfig,
        cache_config: CacheConfig,
    ) -> Self {
        let sequence = PlaylistTracksIterator::new(client.clone(), source_playlist_id.to_string())
            .with_page_size(config.page_size);
        let cache = MembershipCache::with_config(client.clone(), cache_config);
        let (state_tx, _) = watch::channel(SorterState::default());

        Self {
            client,
            cache,
            ledger: ChangeLedger::new(),
            slots: SlotBoard::new(),
            config,
            sequence,
            tracks: Vec::new(),
            total_tracks: 0,
            position: 0,
            user: None,
            artist_genres: Vec::new(),
            notice: None,
            busy: false,
            state_tx,
        }
    }

    /// Loads the signed-in user's profile and the first page of the source
    /// sequence.
    ///
    /// The cursor lands on position 0 as-is, even when that track is
    /// unplayable; relative navigation is what steps over unplayable
    /// tracks.
    pub async fn start(&mut self) -> Result<()> {
        self.busy = true;
        self.publish_state();

        let result = self.start_inner().await;

        self.busy = false;
        self.publish_state();
        result
    }

    async fn start_inner(&mut self) -> Result<()> {
        let user = self.client.get_current_user().await?;
        log::info!(
            "Starting sorter session for {} over playlist {}",
            user.id,
            self.sequence.playlist_id()
        );
        self.user = Some(user);

        if let Some(page) = self.sequence.next_page().await? {
            self.total_tracks = page.total;
            self.tracks.extend(page.tracks);
        }
        self.position = 0;
        self.refresh_artist_genres().await;
        Ok(())
    }

    /// Steps forward to the next playable track. Returns whether the
    /// cursor moved.
    ///
    /// Unplayable tracks are passed over with an
    /// [`UnplayableSkipped`](SorterNotice::UnplayableSkipped) notice; when
    /// only unplayable tracks remain ahead the cursor stays put and the
    /// notice still fires. Nearing the end of the loaded sequence fetches
    /// the next page first, and a failed fetch is logged while navigation
    /// carries on over what is loaded.
    pub async fn go_next(&mut self) -> bool {
        self.notice = None;
        self.prefetch_if_needed().await;

        let moved = self.advance(1);
        if moved {
            self.refresh_artist_genres().await;
        }
        self.publish_state();
        moved
    }

    /// Steps back to the previous playable track. Returns whether the
    /// cursor moved. Skips unplayable tracks the same way
    /// [`go_next`](Self::go_next) does, just backwards.
    pub async fn go_previous(&mut self) -> bool {
        self.notice = None;

        let moved = self.advance(-1);
        if moved {
            self.refresh_artist_genres().await;
        }
        self.publish_state();
        moved
    }

    /// Jumps to an exact 0-based position, loading sequence pages as
    /// needed to cover it.
    ///
    /// Unlike relative navigation this lands exactly where asked, even on
    /// an unplayable track. Positions beyond the sequence fail with
    /// [`SorterError::NoSuchTrack`].
    pub async fn go_to(&mut self, position: usize) -> Result<()> {
        while position >= self.tracks.len() && self.sequence.has_more() {
            match self.sequence.next_page().await? {
                Some(page) => {
                    self.total_tracks = page.total;
                    self.tracks.extend(page.tracks);
                }
                None => break,
            }
        }
        if position >= self.tracks.len() {
            return Err(SorterError::NoSuchTrack(position));
        }

        self.position = position;
        self.notice = None;
        self.refresh_artist_genres().await;
        self.publish_state();
        Ok(())
    }

    /// Binds a playlist to a slot and loads its membership.
    ///
    /// The load always refetches so the set reflects the service as of
    /// now, and the busy flag is raised while it runs. A failed load
    /// leaves the slot bound with empty membership and raises a
    /// [`PlaylistLoadFailed`](SorterNotice::PlaylistLoadFailed) notice; a
    /// load cut short by the page cap raises
    /// [`PlaylistTruncated`](SorterNotice::PlaylistTruncated).
    pub async fn select_playlist(&mut self, slot: usize, playlist: Playlist) -> Result<()> {
        let playlist_id = playlist.id.clone();
        self.slots.assign(slot, playlist)?;

        self.busy = true;
        self.notice = None;
        self.publish_state();

        self.cache.ensure_fully_loaded(&playlist_id, true).await;

        if !self.cache.is_fully_loaded(&playlist_id) {
            self.notice = Some(SorterNotice::PlaylistLoadFailed {
                playlist_id: playlist_id.clone(),
            });
        } else if self.cache.is_truncated(&playlist_id) {
            self.notice = Some(SorterNotice::PlaylistTruncated {
                playlist_id: playlist_id.clone(),
            });
        }

        self.busy = false;
        self.publish_state();
        Ok(())
    }

    /// Creates a playlist under the signed-in user and binds it to a slot.
    ///
    /// A brand-new playlist cannot have members yet, so its membership is
    /// seeded as an empty fully-loaded set without any fetching.
    pub async fn create_playlist(&mut self, slot: usize, name: &str) -> Result<Playlist> {
        if slot >= SLOT_COUNT {
            return Err(SorterError::InvalidSlot(slot));
        }
        let user_id = self
            .user
            .as_ref()
            .map(|u| u.id.clone())
            .ok_or_else(|| SorterError::Auth("session has not been started".to_string()))?;

        self.busy = true;
        self.publish_state();
        let created = self
            .client
            .create_playlist(&user_id, name, CREATED_PLAYLIST_DESCRIPTION, false)
            .await;
        self.busy = false;

        match created {
            Ok(playlist) => {
                log::info!("Created playlist '{}' ({})", playlist.name, playlist.id);
                self.cache.seed_empty(&playlist.id);
                self.slots.assign(slot, playlist.clone())?;
                self.publish_state();
                Ok(playlist)
            }
            Err(e) => {
                self.publish_state();
                Err(e)
            }
        }
    }

    /// Flips the displayed membership of the current track for the slot's
    /// playlist, recording the intent in the ledger. Returns `false` when
    /// the slot is empty, which is not an error.
    pub fn toggle_playlist(&mut self, slot: usize) -> Result<bool> {
        if slot >= SLOT_COUNT {
            return Err(SorterError::InvalidSlot(slot));
        }
        let track_id = self
            .current_track()
            .map(|t| t.id.clone())
            .ok_or(SorterError::NoSuchTrack(self.position))?;
        let Some(playlist_id) = self.slots.get(slot).map(|p| p.id.clone()) else {
            return Ok(false);
        };

        let actual = self.cache.contains(&playlist_id, &track_id);
        let displayed = reconcile::displayed_state(self.ledger.get(&track_id, &playlist_id), actual);
        let desired = !displayed;

        self.ledger.set_intent(&track_id, &playlist_id, desired, actual);
        log::debug!(
            "Toggled track {track_id} for playlist {playlist_id}: {displayed} -> {desired}"
        );
        self.publish_state();
        Ok(true)
    }

    /// Commits every pending change concurrently and reports per-change
    /// outcomes.
    ///
    /// Changes succeed or fail independently. Each success is mirrored
    /// into the membership cache and dropped from the ledger; each failure
    /// keeps its ledger entry so the next save retries it.
    pub async fn save(&mut self) -> SaveReport {
        let changes = self.ledger.snapshot();
        if changes.is_empty() {
            return SaveReport::default();
        }

        self.busy = true;
        self.notice = None;
        self.publish_state();

        let client = &self.client;
        let attempts = changes.iter().map(|change| async move {
            let result = match change.action {
                ChangeAction::Add => {
                    client
                        .add_track_to_playlist(&change.playlist_id, &change.track_id)
                        .await
                }
                ChangeAction::Remove => {
                    client
                        .remove_track_from_playlist(&change.playlist_id, &change.track_id)
                        .await
                }
            };
            (change.clone(), result)
        });
        let outcomes = join_all(attempts).await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (change, result) in outcomes {
            match result {
                Ok(()) => {
                    self.cache
                        .apply_local_mutation(&change.playlist_id, &change.track_id, change.action);
                    self.ledger.remove(&change.track_id, &change.playlist_id);
                    results.push(ChangeResult {
                        change,
                        success: true,
                        error_message: None,
                    });
                }
                Err(e) => {
                    log::warn!(
                        "Failed to {} track {} for playlist {}: {e}",
                        change.action,
                        change.track_id,
                        change.playlist_id
                    );
                    results.push(ChangeResult {
                        change,
                        success: false,
                        error_message: Some(e.to_string()),
                    });
                }
            }
        }

        self.busy = false;
        self.publish_state();

        let report = SaveReport { results };
        log::info!("{}", report.summary_message());
        report
    }

    /// Drops every pending change, snapping the display back to cached
    /// membership.
    pub fn discard(&mut self) {
        self.ledger.clear();
        self.notice = None;
        self.publish_state();
    }

    /// Unbinds a slot, unless pending changes still reference its
    /// playlist.
    ///
    /// With pending changes in the way this returns
    /// [`GuardedOutcome::NeedsConfirmation`] and changes nothing. The
    /// caller resolves it by saving or discarding first, or by calling
    /// [`remove_slot_confirmed`](Self::remove_slot_confirmed) to abandon
    /// that playlist's changes.
    pub fn remove_slot(&mut self, slot: usize) -> Result<GuardedOutcome> {
        let Some(playlist_id) = self.slots.get(slot).map(|p| p.id.clone()) else {
            self.slots.clear(slot)?;
            return Ok(GuardedOutcome::Done);
        };
        if self.ledger.has_changes_for_playlist(&playlist_id) {
            return Ok(GuardedOutcome::NeedsConfirmation);
        }

        self.slots.clear(slot)?;
        self.publish_state();
        Ok(GuardedOutcome::Done)
    }

    /// Unbinds a slot regardless of pending changes, dropping any ledger
    /// entries that reference its playlist.
    pub fn remove_slot_confirmed(&mut self, slot: usize) -> Result<()> {
        if let Some(playlist) = self.slots.clear(slot)? {
            let dropped = self.ledger.remove_for_playlist(&playlist.id);
            if dropped > 0 {
                log::debug!(
                    "Dropped {dropped} pending change(s) for removed playlist {}",
                    playlist.id
                );
            }
            self.publish_state();
        }
        Ok(())
    }

    /// Leave-the-session guard: [`GuardedOutcome::Done`] only when nothing
    /// is pending.
    pub fn finish(&self) -> GuardedOutcome {
        if self.ledger.is_empty() {
            GuardedOutcome::Done
        } else {
            GuardedOutcome::NeedsConfirmation
        }
    }

    /// Current snapshot of the session, identical to what a
    /// [`subscribe`](Self::subscribe) watcher would see.
    pub fn state(&self) -> SorterState {
        self.build_state()
    }

    /// Watcher that yields a fresh [`SorterState`] after every
    /// interaction.
    pub fn subscribe(&self) -> watch::Receiver<SorterState> {
        self.state_tx.subscribe()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.position)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn loaded_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn total_tracks(&self) -> u32 {
        self.total_tracks
    }

    pub fn pending_changes(&self) -> usize {
        self.ledger.len()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn artist_genres(&self) -> &[String] {
        &self.artist_genres
    }

    pub fn source_playlist_id(&self) -> &str {
        self.sequence.playlist_id()
    }

    pub fn slot_board(&self) -> &SlotBoard {
        &self.slots
    }

    pub fn cache(&self) -> &MembershipCache<C> {
        &self.cache
    }

    pub fn ledger(&self) -> &ChangeLedger {
        &self.ledger
    }

    /// Moves the cursor by `step` until a playable track is found.
    /// Leaves the cursor where it was when none is, with the skip notice
    /// from the last unplayable track still set.
    fn advance(&mut self, step: isize) -> bool {
        let mut target = self.position as isize + step;
        loop {
            if target < 0 || target as usize >= self.tracks.len() {
                return false;
            }
            let track = &self.tracks[target as usize];
            if track.is_local {
                self.notice = Some(SorterNotice::UnplayableSkipped {
                    track_name: track.name.clone(),
                });
                target += step;
                continue;
            }
            self.position = target as usize;
            return true;
        }
    }

    /// Fetches the next sequence page once the cursor is within the
    /// lookahead window of the loaded tail. Fetch failures are logged and
    /// navigation continues over what is loaded.
    async fn prefetch_if_needed(&mut self) {
        let near_tail = self.position + self.config.prefetch_lookahead >= self.tracks.len();
        if !near_tail || !self.sequence.has_more() {
            return;
        }

        match self.sequence.next_page().await {
            Ok(Some(page)) => {
                self.total_tracks = page.total;
                self.tracks.extend(page.tracks);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to prefetch next sequence page: {e}"),
        }
    }

    /// Fetches genre tags for the current track's primary artist.
    /// Failures are logged and leave the genre display empty rather than
    /// failing navigation.
    async fn refresh_artist_genres(&mut self) {
        self.artist_genres.clear();
        let Some(artist_id) = self
            .current_track()
            .and_then(|t| t.primary_artist_id())
            .map(str::to_string)
        else {
            return;
        };

        match self.client.get_artist(&artist_id).await {
            Ok(artist) => self.artist_genres = artist.genres,
            Err(e) => log::debug!("Could not fetch artist {artist_id}: {e}"),
        }
    }

    fn build_state(&self) -> SorterState {
        let current_track = self.current_track().cloned();
        let slots = (0..SLOT_COUNT)
            .map(|slot| {
                let playlist = self.slots.get(slot).cloned();
                let active = match (&current_track, &playlist) {
                    (Some(track), Some(playlist)) => reconcile::track_playlist_state(
                        &track.id,
                        &playlist.id,
                        &self.ledger,
                        &self.cache,
                    ),
                    _ => false,
                };
                SlotView {
                    slot,
                    playlist,
                    active,
                }
            })
            .collect();

        SorterState {
            position: self.position,
            loaded_tracks: self.tracks.len(),
            total_tracks: self.total_tracks,
            current_track,
            artist_genres: self.artist_genres.clone(),
            slots,
            pending_changes: self.ledger.len(),
            busy: self.busy,
            notice: self.notice.clone(),
        }
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(self.build_state());
    }
}
