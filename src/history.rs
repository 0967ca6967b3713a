//! Bounded, linear undo/redo history over deep-copy snapshots.
//!
//! A [`Snapshot`] is taken of the five tracked fields immediately before
//! every user-intent mutation. The list is append-only until a new mutation
//! lands after an undo, at which point the redo tail is discarded (the
//! standard "redo invalidated by new edit" rule). When the list exceeds its
//! capacity the oldest entry is evicted and the window slides.
//!
//! `undo`/`redo` exchange the caller's current state with the stored entry
//! at the cursor, so an undo immediately followed by a redo restores the
//! exact pre-undo state. History itself is never part of a snapshot and is
//! not persisted across restarts.

use std::collections::HashMap;
use std::mem;

use crate::models::{Dataset, SourceText};
use crate::settings::AppSettings;

/// Default number of retained snapshots.
pub const DEFAULT_CAPACITY: usize = 50;

/// Immutable deep copy of the tracked state fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub source_texts: HashMap<String, SourceText>,
    pub datasets: HashMap<String, Dataset>,
    pub settings: AppSettings,
    pub active_dataset_id: Option<String>,
    pub active_source_text_id: Option<String>,
}

/// Linear history with a cursor separating the undo path from the redo path.
///
/// Entries `[0, cursor)` are undoable; entries `[cursor, len)` are redoable.
#[derive(Debug)]
pub struct History {
    snapshots: Vec<Snapshot>,
    cursor: usize,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: 0,
            capacity: capacity.max(1),
        }
    }

    /// Record a pre-mutation snapshot.
    ///
    /// Discards any redo tail, then appends. On overflow the oldest entry
    /// is evicted and the cursor stays put, keeping the window size constant.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.truncate(self.cursor);
        self.snapshots.push(snapshot);
        if self.snapshots.len() > self.capacity {
            self.snapshots.remove(0);
        } else {
            self.cursor += 1;
        }
    }

    /// Step back one entry, exchanging `current` for the stored snapshot.
    ///
    /// Returns the snapshot to restore, or `None` at the start of history.
    pub fn undo(&mut self, current: Snapshot) -> Option<Snapshot> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(mem::replace(&mut self.snapshots[self.cursor], current))
    }

    /// Step forward one entry, exchanging `current` for the stored snapshot.
    ///
    /// Returns the snapshot to restore, or `None` at the end of history.
    pub fn redo(&mut self, current: Snapshot) -> Option<Snapshot> {
        if self.cursor == self.snapshots.len() {
            return None;
        }
        let restored = mem::replace(&mut self.snapshots[self.cursor], current);
        self.cursor += 1;
        Some(restored)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.snapshots.len()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = 0;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
