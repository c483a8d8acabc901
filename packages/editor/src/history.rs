//! # Undo/Redo History
//!
//! Two stacks of committed changes. `done` holds committed transactions in
//! commit order; `undone` holds what undo peeled off. Any non-replay commit
//! clears `undone`. Exhaustion is reported by return value and logged, not
//! raised: running out of history is an everyday event, not a fault.

use crate::change::DocumentChange;

#[derive(Debug, Clone, Default)]
pub struct History {
    done: Vec<DocumentChange>,
    undone: Vec<DocumentChange>,
    max_levels: usize,
}

impl History {
    /// Default capacity of 100 undo levels.
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    /// `0` means unlimited.
    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            done: Vec::new(),
            undone: Vec::new(),
            max_levels,
        }
    }

    /// Record a fresh (non-replay) commit. Invalidates the redo stack.
    pub fn record(&mut self, change: DocumentChange) {
        self.done.push(change);
        if self.max_levels > 0 && self.done.len() > self.max_levels {
            self.done.remove(0);
        }
        self.undone.clear();
    }

    pub(crate) fn pop_done(&mut self) -> Option<DocumentChange> {
        self.done.pop()
    }

    pub(crate) fn push_done(&mut self, change: DocumentChange) {
        self.done.push(change);
    }

    pub(crate) fn pop_undone(&mut self) -> Option<DocumentChange> {
        self.undone.pop()
    }

    pub(crate) fn push_undone(&mut self, change: DocumentChange) {
        self.undone.push(change);
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.done.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.undone.len()
    }

    pub fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
    }
}
