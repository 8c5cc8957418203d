//! Pending-change ledger: net membership intents awaiting save.

use crate::types::{ChangeAction, PendingChange};

/// Ordered collection of pending membership changes.
///
/// At most one entry exists per (track, playlist) pair, and only changes
/// that differ from the cached remote state are kept. Recording an intent
/// that matches the remote state removes the pair instead, so toggling a
/// track off and back on leaves nothing to save.
///
/// # Examples
///
/// ```rust
/// use spotify_sorter::ChangeLedger;
///
/// let mut ledger = ChangeLedger::new();
///
/// // The track is not in the playlist remotely; turning it on records an add.
/// ledger.set_intent("track-1", "playlist-a", true, false);
/// assert_eq!(ledger.len(), 1);
///
/// // Turning it back off matches the remote state again: nothing pending.
/// ledger.set_intent("track-1", "playlist-a", false, false);
/// assert!(ledger.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct ChangeLedger {
    entries: Vec<PendingChange>,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the user's intent for a (track, playlist) pair.
    ///
    /// `desired` is the state the user wants; `actual` is the cached
    /// remote state at the time of the toggle. Any previous entry for the
    /// pair is dropped first, and a new entry is appended at the tail only
    /// when the two differ.
    pub fn set_intent(&mut self, track_id: &str, playlist_id: &str, desired: bool, actual: bool) {
        self.entries
            .retain(|c| !(c.track_id == track_id && c.playlist_id == playlist_id));

        if desired != actual {
            self.entries.push(PendingChange {
                track_id: track_id.to_string(),
                playlist_id: playlist_id.to_string(),
                action: if desired {
                    ChangeAction::Add
                } else {
                    ChangeAction::Remove
                },
            });
        }
    }

    /// The pending change for a pair, if any.
    pub fn get(&self, track_id: &str, playlist_id: &str) -> Option<&PendingChange> {
        self.entries
            .iter()
            .find(|c| c.track_id == track_id && c.playlist_id == playlist_id)
    }

    /// Drops the entry for a pair, if present.
    pub fn remove(&mut self, track_id: &str, playlist_id: &str) {
        self.entries
            .retain(|c| !(c.track_id == track_id && c.playlist_id == playlist_id));
    }

    /// Drops every entry targeting the given playlist, returning how many
    /// were removed.
    pub fn remove_for_playlist(&mut self, playlist_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|c| c.playlist_id != playlist_id);
        before - self.entries.len()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Ordered copy of all entries, oldest intent first.
    pub fn snapshot(&self) -> Vec<PendingChange> {
        self.entries.clone()
    }

    /// Whether any entry targets the given playlist.
    pub fn has_changes_for_playlist(&self, playlist_id: &str) -> bool {
        self.entries.iter().any(|c| c.playlist_id == playlist_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_only_net_changes() {
        let mut ledger = ChangeLedger::new();

        ledger.set_intent("t1", "p1", true, false);
        assert_eq!(ledger.get("t1", "p1").unwrap().action, ChangeAction::Add);

        // Matching the remote state collapses the entry away.
        ledger.set_intent("t1", "p1", false, false);
        assert!(ledger.get("t1", "p1").is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn last_intent_wins() {
        let mut ledger = ChangeLedger::new();

        // Track is remotely present; the user removes it, then another
        // toggle round ends on remove again. Only one entry survives.
        ledger.set_intent("t1", "p1", false, true);
        ledger.set_intent("t1", "p1", true, true);
        assert!(ledger.is_empty());

        ledger.set_intent("t1", "p1", false, true);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("t1", "p1").unwrap().action, ChangeAction::Remove);
    }

    #[test]
    fn retoggle_moves_entry_to_tail() {
        let mut ledger = ChangeLedger::new();

        ledger.set_intent("t1", "p1", true, false);
        ledger.set_intent("t2", "p1", true, false);

        // Re-recording t1 re-appends it after t2.
        ledger.set_intent("t1", "p1", true, false);

        let order: Vec<String> = ledger.snapshot().into_iter().map(|c| c.track_id).collect();
        assert_eq!(order, vec!["t2", "t1"]);
    }

    #[test]
    fn pairs_are_independent() {
        let mut ledger = ChangeLedger::new();

        ledger.set_intent("t1", "p1", true, false);
        ledger.set_intent("t1", "p2", false, true);
        ledger.set_intent("t2", "p1", true, false);
        assert_eq!(ledger.len(), 3);

        ledger.remove("t1", "p1");
        assert_eq!(ledger.len(), 2);
        assert!(ledger.get("t1", "p1").is_none());
        assert!(ledger.get("t1", "p2").is_some());
    }

    #[test]
    fn playlist_scoped_queries_and_removal() {
        let mut ledger = ChangeLedger::new();

        ledger.set_intent("t1", "p1", true, false);
        ledger.set_intent("t2", "p1", false, true);
        ledger.set_intent("t3", "p2", true, false);

        assert!(ledger.has_changes_for_playlist("p1"));
        assert!(ledger.has_changes_for_playlist("p2"));
        assert!(!ledger.has_changes_for_playlist("p3"));

        assert_eq!(ledger.remove_for_playlist("p1"), 2);
        assert!(!ledger.has_changes_for_playlist("p1"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let mut ledger = ChangeLedger::new();
        ledger.set_intent("t1", "p1", true, false);
        ledger.set_intent("t2", "p2", false, true);

        ledger.clear();
        assert!(ledger.is_empty());
        assert!(ledger.snapshot().is_empty());
    }
}
