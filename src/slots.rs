//! Slot board: ten numbered positions for sort-target playlists.

use crate::types::{Playlist, SorterError};
use crate::Result;

/// Number of positions on the board, one per digit key.
pub const SLOT_COUNT: usize = 10;

/// The board binding target playlists to slot positions.
///
/// A playlist occupies at most one slot at a time; assigning it to a
/// second slot is rejected rather than silently moving it.
#[derive(Debug, Default)]
pub struct SlotBoard {
    slots: [Option<Playlist>; SLOT_COUNT],
}

impl SlotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a playlist to a slot, replacing whatever was there.
    ///
    /// Fails with [`SorterError::InvalidSlot`] for positions outside the
    /// board and [`SorterError::SlotOccupied`] when the playlist already
    /// sits in a different slot.
    pub fn assign(&mut self, slot: usize, playlist: Playlist) -> Result<()> {
        if slot >= SLOT_COUNT {
            return Err(SorterError::InvalidSlot(slot));
        }
        if let Some(existing) = self.slot_of(&playlist.id) {
            if existing != slot {
                return Err(SorterError::SlotOccupied {
                    playlist: playlist.name,
                    slot: existing,
                });
            }
        }
        self.slots[slot] = Some(playlist);
        Ok(())
    }

    /// Unbinds a slot, returning the playlist that occupied it.
    pub fn clear(&mut self, slot: usize) -> Result<Option<Playlist>> {
        if slot >= SLOT_COUNT {
            return Err(SorterError::InvalidSlot(slot));
        }
        Ok(self.slots[slot].take())
    }

    /// The playlist bound to a slot, if any.
    pub fn get(&self, slot: usize) -> Option<&Playlist> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    /// Which slot a playlist occupies, if any.
    pub fn slot_of(&self, playlist_id: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|p| p.id == playlist_id))
    }

    /// Occupied slots with their playlists, in slot order.
    pub fn iter_assigned(&self) -> impl Iterator<Item = (usize, &Playlist)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, s)| s.as_ref().map(|p| (slot, p)))
    }

    /// Number of occupied slots.
    pub fn assigned_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Playlists from `playlists` that are not yet on the board, keeping
    /// the input order. Spotify's auto-generated "DJ" entry is excluded
    /// since its contents cannot be edited.
    pub fn available_from<'a>(&self, playlists: &'a [Playlist]) -> Vec<&'a Playlist> {
        playlists
            .iter()
            .filter(|p| self.slot_of(&p.id).is_none() && p.name != "DJ")
            .collect()
    }
}
