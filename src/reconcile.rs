//! Reconciliation of cached membership with pending changes.
//!
//! What the user sees is never the raw cache: a pending change always
//! overrides it, so a toggle takes effect on screen immediately and a
//! discard snaps the display back to the remote truth.

use crate::cache::MembershipCache;
use crate::ledger::ChangeLedger;
use crate::r#trait::SpotifyClient;
use crate::slots::{SlotBoard, SLOT_COUNT};
use crate::types::{ChangeAction, PendingChange};

/// Resolves the displayed membership state for one (track, playlist) pair.
///
/// A pending add displays as on and a pending remove as off, regardless of
/// the cache. With no pending entry the cached membership decides, and a
/// playlist with no cached set displays as off.
pub fn displayed_state(pending: Option<&PendingChange>, cached_member: bool) -> bool {
    match pending {
        Some(change) => change.action == ChangeAction::Add,
        None => cached_member,
    }
}

/// Displayed membership of a track in a playlist, looked up through the
/// ledger and cache.
pub fn track_playlist_state<C: SpotifyClient + Clone + 'static>(
    track_id: &str,
    playlist_id: &str,
    ledger: &ChangeLedger,
    cache: &MembershipCache<C>,
) -> bool {
    displayed_state(
        ledger.get(track_id, playlist_id),
        cache.contains(playlist_id, track_id),
    )
}

/// Displayed membership of a track across every slot on the board.
///
/// Empty slots read as off.
pub fn slot_states<C: SpotifyClient + Clone + 'static>(
    track_id: &str,
    slots: &SlotBoard,
    ledger: &ChangeLedger,
    cache: &MembershipCache<C>,
) -> [bool; SLOT_COUNT] {
    let mut states = [false; SLOT_COUNT];
    for (slot, playlist) in slots.iter_assigned() {
        states[slot] = track_playlist_state(track_id, &playlist.id, ledger, cache);
    }
    states
}
