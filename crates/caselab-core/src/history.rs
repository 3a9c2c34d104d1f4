//! ============================================================================
//! History Engine - Bounded undo/redo over any state value
//! ============================================================================
//! `past` and `future` are capped at `max_history` entries each; the oldest
//! entry is evicted first. Committing a value equal to the present is a
//! no-op, so repeated identical edits never create spurious undo steps.
//!
//! Undo and redo raise a suppress flag. Any `set` issued while it is raised
//! (a coupled side effect of the undo/redo in the same turn) is dropped.
//! The owner clears it with `settle()` at the start of its next turn.
//! ============================================================================

use std::collections::VecDeque;
use tracing::debug;

/// Default number of undo steps kept
pub const DEFAULT_MAX_HISTORY: usize = 50;

#[derive(Debug, Clone)]
pub struct History<T> {
    past: VecDeque<T>,
    present: T,
    future: VecDeque<T>,
    max_history: usize,
    suppressed: bool,
}

impl<T: Clone + PartialEq> History<T> {
    pub fn new(initial: T) -> Self {
        Self::with_max_history(initial, DEFAULT_MAX_HISTORY)
    }

    pub fn with_max_history(initial: T, max_history: usize) -> Self {
        Self {
            past: VecDeque::new(),
            present: initial,
            future: VecDeque::new(),
            max_history,
            suppressed: false,
        }
    }

    pub fn present(&self) -> &T {
        &self.present
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// True while an undo/redo is still propagating
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// End the current turn: accept `set` calls again
    pub fn settle(&mut self) {
        self.suppressed = false;
    }

    /// Commit a new present. Returns whether history changed.
    pub fn set(&mut self, next: T) -> bool {
        if self.suppressed {
            debug!("History set suppressed during undo/redo");
            return false;
        }
        if next == self.present {
            return false;
        }
        let previous = std::mem::replace(&mut self.present, next);
        self.push_past(previous);
        self.future.clear();
        true
    }

    /// Commit a value computed from the present
    pub fn update(&mut self, f: impl FnOnce(&T) -> T) -> bool {
        if self.suppressed {
            debug!("History update suppressed during undo/redo");
            return false;
        }
        let next = f(&self.present);
        self.set(next)
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop_back() else {
            return false;
        };
        self.suppressed = true;
        let current = std::mem::replace(&mut self.present, previous);
        self.future.push_front(current);
        self.future.truncate(self.max_history);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop_front() else {
            return false;
        };
        self.suppressed = true;
        let current = std::mem::replace(&mut self.present, next);
        self.push_past(current);
        true
    }

    /// Replace the present and forget both stacks. Not undoable.
    pub fn reset(&mut self, state: T) {
        self.past.clear();
        self.future.clear();
        self.present = state;
    }

    fn push_past(&mut self, value: T) {
        self.past.push_back(value);
        while self.past.len() > self.max_history {
            self.past.pop_front();
        }
    }
}
