//! Undo/redo history: an ordered list of snapshots plus a cursor.
//!
//! INVARIANTS
//! ==========
//! - The cursor is `None` (nothing to show but the blank surface) or a valid
//!   index into `entries`.
//! - The cursor can only reach `None` while the oldest entry sits directly on
//!   the blank surface. Once the limit drops entries, or after a reset, the
//!   oldest kept entry is the floor.
//! - Redo is possible only while the cursor is before the last entry.
//! - Pushing truncates every entry after the cursor first.
//! - With a non-zero limit, the oldest entry is dropped on overflow and the
//!   cursor moves with the remaining entries.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use crate::snapshot::Snapshot;

#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Snapshot>,
    cursor: Option<usize>,
    /// Undoing the oldest entry returns to the blank surface.
    blank_base: bool,
    /// Maximum entries kept; `0` means unbounded.
    limit: usize,
}

impl History {
    /// Unbounded, empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(0)
    }

    /// Empty history keeping at most `limit` entries (`0` = unbounded).
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self { entries: Vec::new(), cursor: None, blank_base: true, limit }
    }

    /// Record a new snapshot at the cursor, discarding the redo tail.
    pub fn push(&mut self, snapshot: Snapshot) {
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);
        self.entries.push(snapshot);

        if self.limit > 0 && self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
            self.blank_base = false;
        }
        self.cursor = Some(self.entries.len() - 1);
    }

    /// Drop everything and keep `snapshot` as the only entry.
    pub fn reset(&mut self, snapshot: Snapshot) {
        self.entries.clear();
        self.entries.push(snapshot);
        self.cursor = Some(0);
        self.blank_base = false;
    }

    /// Move the cursor back one step. Returns false when already at the start.
    pub fn undo(&mut self) -> bool {
        match self.cursor {
            Some(0) if self.blank_base => {
                self.cursor = None;
                true
            }
            Some(0) | None => false,
            Some(c) => {
                self.cursor = Some(c - 1);
                true
            }
        }
    }

    /// Move the cursor forward one step. Returns false when at the end.
    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            return false;
        }
        self.cursor = Some(self.cursor.map_or(0, |c| c + 1));
        true
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        match self.cursor {
            Some(0) => self.blank_base,
            Some(_) => true,
            None => false,
        }
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        match self.cursor {
            Some(c) => c + 1 < self.entries.len(),
            None => !self.entries.is_empty(),
        }
    }

    /// Snapshot at the cursor; `None` means the blank surface.
    #[must_use]
    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.and_then(|c| self.entries.get(c))
    }

    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
