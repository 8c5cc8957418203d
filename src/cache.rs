//! Membership cache: a local mirror of which tracks each playlist holds.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::future::{LocalBoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::watch;

use crate::r#trait::SpotifyClient;
use crate::types::{CacheConfig, ChangeAction};

/// An in-flight membership fetch that concurrent callers can await together.
type SharedFetch = Shared<LocalBoxFuture<'static, HashSet<String>>>;

#[derive(Debug, Default)]
struct CacheState {
    sets: HashMap<String, HashSet<String>>,
    fully_loaded: HashSet<String>,
    truncated: HashSet<String>,
}

/// Local mirror of playlist membership, loaded exhaustively page by page.
///
/// The cache holds one set of track IDs per playlist. A set is trusted only
/// once its playlist is marked fully loaded, which happens after every page
/// has been fetched in strict offset order. Membership questions against a
/// playlist with no cached set answer `false` rather than guessing.
///
/// Concurrent load requests for the same playlist join a single in-flight
/// fetch instead of paging twice. Mutations committed by a save are
/// mirrored through [`apply_local_mutation`](Self::apply_local_mutation)
/// instead of refetching the whole playlist.
pub struct MembershipCache<C: SpotifyClient + Clone + 'static> {
    client: C,
    config: CacheConfig,
    state: Arc<Mutex<CacheState>>,
    inflight: Arc<Mutex<HashMap<String, SharedFetch>>>,
    changed_tx: Arc<watch::Sender<u64>>,
}

impl<C: SpotifyClient + Clone + 'static> MembershipCache<C> {
    pub fn new(client: C) -> Self {
        Self::with_config(client, CacheConfig::default())
    }

    pub fn with_config(client: C, config: CacheConfig) -> Self {
        let (changed_tx, _) = watch::channel(0);
        Self {
            client,
            config,
            state: Arc::new(Mutex::new(CacheState::default())),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            changed_tx: Arc::new(changed_tx),
        }
    }

    /// Makes sure a playlist's membership is completely known, returning
    /// the full set of its track IDs.
    ///
    /// An already-loaded playlist returns its cached set without network
    /// traffic unless `force_refetch` is set. Callers arriving while a
    /// fetch for the same playlist is still running join that fetch and
    /// share its result, even when they asked for a refetch.
    ///
    /// A failed fetch resolves every joined caller with an empty set and
    /// leaves the playlist unloaded, so the next call starts over from
    /// offset zero.
    pub async fn ensure_fully_loaded(
        &self,
        playlist_id: &str,
        force_refetch: bool,
    ) -> HashSet<String> {
        let fetch = {
            // The in-flight check comes before the cache check so a forced
            // refetch joins the running fetch instead of stacking a second
            // paging run behind it.
            let mut inflight = self.inflight.lock().unwrap();
            if let Some(existing) = inflight.get(playlist_id) {
                existing.clone()
            } else {
                {
                    let mut state = self.state.lock().unwrap();
                    if force_refetch {
                        state.fully_loaded.remove(playlist_id);
                        state.truncated.remove(playlist_id);
                    } else if state.fully_loaded.contains(playlist_id) {
                        if let Some(set) = state.sets.get(playlist_id) {
                            return set.clone();
                        }
                    }
                }
                let fetch = self.start_fetch(playlist_id.to_string());
                inflight.insert(playlist_id.to_string(), fetch.clone());
                fetch
            }
        };

        fetch.await
    }

    /// Builds the shared fetch future for one playlist. The future owns
    /// everything it touches, so it keeps running for whichever callers
    /// still await it even if the one that started it is dropped.
    fn start_fetch(&self, playlist_id: String) -> SharedFetch {
        let client = self.client.clone();
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let inflight = Arc::clone(&self.inflight);
        let changed_tx = Arc::clone(&self.changed_tx);

        async move {
            let ids = match fetch_all_pages(&client, &playlist_id, &config).await {
                Ok((ids, truncated)) => {
                    {
                        let mut state = state.lock().unwrap();
                        state.sets.insert(playlist_id.clone(), ids.clone());
                        state.fully_loaded.insert(playlist_id.clone());
                        if truncated {
                            state.truncated.insert(playlist_id.clone());
                        } else {
                            state.truncated.remove(&playlist_id);
                        }
                    }
                    changed_tx.send_modify(|generation| *generation += 1);
                    ids
                }
                Err(e) => {
                    log::warn!("Failed to load playlist {playlist_id}: {e}");
                    HashSet::new()
                }
            };

            // The fetch clears its own registry entry, success or failure,
            // so the slot never goes stale.
            inflight.lock().unwrap().remove(&playlist_id);
            ids
        }
        .boxed_local()
        .shared()
    }

    /// Installs an empty, fully-loaded set without any fetching. Meant for
    /// playlists that were just created and cannot have members yet.
    pub fn seed_empty(&self, playlist_id: &str) {
        {
            let mut state = self.state.lock().unwrap();
            state.sets.insert(playlist_id.to_string(), HashSet::new());
            state.fully_loaded.insert(playlist_id.to_string());
            state.truncated.remove(playlist_id);
        }
        self.notify_changed();
    }

    /// Mirrors one committed remote mutation into the cached set.
    ///
    /// Does nothing when the playlist has no cached set; it never creates
    /// an entry or changes the fully-loaded mark.
    pub fn apply_local_mutation(&self, playlist_id: &str, track_id: &str, action: ChangeAction) {
        let modified = {
            let mut state = self.state.lock().unwrap();
            match state.sets.get_mut(playlist_id) {
                Some(set) => match action {
                    ChangeAction::Add => set.insert(track_id.to_string()),
                    ChangeAction::Remove => set.remove(track_id),
                },
                None => false,
            }
        };
        if modified {
            self.notify_changed();
        }
    }

    /// The cached set for a playlist, if one exists.
    pub fn membership(&self, playlist_id: &str) -> Option<HashSet<String>> {
        self.state.lock().unwrap().sets.get(playlist_id).cloned()
    }

    /// Whether the cached set for a playlist contains the track. Playlists
    /// with no cached set answer `false`.
    pub fn contains(&self, playlist_id: &str, track_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .sets
            .get(playlist_id)
            .is_some_and(|set| set.contains(track_id))
    }

    /// Whether every page of the playlist has been fetched (or the set was
    /// seeded for a freshly created playlist).
    pub fn is_fully_loaded(&self, playlist_id: &str) -> bool {
        self.state.lock().unwrap().fully_loaded.contains(playlist_id)
    }

    /// Whether the last load stopped at the page cap, leaving the set
    /// incomplete for very large playlists.
    pub fn is_truncated(&self, playlist_id: &str) -> bool {
        self.state.lock().unwrap().truncated.contains(playlist_id)
    }

    /// Watcher whose value bumps every time cached membership changes.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.changed_tx.subscribe()
    }

    fn notify_changed(&self) {
        self.changed_tx.send_modify(|generation| *generation += 1);
    }
}

/// Pages through a playlist from offset zero until the service reports no
/// next page, collecting track IDs. Stops early at `max_pages`, reporting
/// truncation, so one enormous playlist cannot pin the session in a fetch
/// loop for minutes.
async fn fetch_all_pages<C: SpotifyClient>(
    client: &C,
    playlist_id: &str,
    config: &CacheConfig,
) -> crate::Result<(HashSet<String>, bool)> {
    let mut ids = HashSet::new();
    let mut offset = 0;
    let mut pages = 0usize;
    let mut truncated = false;

    loop {
        let page = client
            .get_playlist_tracks_page(playlist_id, config.page_size, offset)
            .await?;
        pages += 1;

        for track in &page.tracks {
            ids.insert(track.id.clone());
        }

        match page.next_offset {
            Some(next) => {
                if pages >= config.max_pages {
                    log::warn!(
                        "Playlist {playlist_id} exceeds {} pages of {}; treating membership as truncated",
                        config.max_pages,
                        config.page_size
                    );
                    truncated = true;
                    break;
                }
                offset = next;
                if !config.page_delay.is_zero() {
                    tokio::time::sleep(config.page_delay).await;
                }
            }
            None => break,
        }
    }

    log::debug!(
        "Loaded {} track IDs from playlist {playlist_id} in {pages} page(s)",
        ids.len()
    );
    Ok((ids, truncated))
}
