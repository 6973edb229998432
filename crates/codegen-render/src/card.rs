//! Code cards and their copy-action state.
//!
//! Each fenced code region in the rendered document becomes a [`CodeCard`]
//! with a 1-based document-order index. The copy action flips the card's
//! label to "Copied!" and reverts it after a fixed delay. Revert timers are
//! keyed by (index, generation): a timer that fires after the card was
//! re-copied, replaced by a re-render, or dropped entirely is a no-op.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const COPY_REVERT_DELAY: Duration = Duration::from_millis(2000);
pub const COPY_LABEL_IDLE: &str = "Copy";
pub const COPY_LABEL_COPIED: &str = "Copied!";

/// A detected code region, ready for display and copying. `code` is the raw
/// fence content, exactly what the copy action puts on the clipboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeCard {
    pub index: usize,
    pub label: String,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyState {
    Idle,
    Copied,
}

#[derive(Debug, Clone, Copy)]
struct CardCopy {
    state: CopyState,
    generation: u64,
}

#[derive(Default)]
struct TrackerInner {
    cards: HashMap<usize, CardCopy>,
    next_generation: u64,
}

/// Shared copy-state table. Cloned into revert-timer threads; all access
/// goes through the mutex, and at most one live timer matters per card
/// because only the newest generation can revert.
#[derive(Clone, Default)]
pub struct CopyTracker {
    inner: Arc<Mutex<TrackerInner>>,
}

impl CopyTracker {
    pub fn state(&self, index: usize) -> CopyState {
        let inner = self.inner.lock().expect("copy tracker lock");
        inner
            .cards
            .get(&index)
            .map(|c| c.state)
            .unwrap_or(CopyState::Idle)
    }

    pub fn label(&self, index: usize) -> &'static str {
        match self.state(index) {
            CopyState::Idle => COPY_LABEL_IDLE,
            CopyState::Copied => COPY_LABEL_COPIED,
        }
    }

    /// Record a copy on `index` and return the generation token the caller
    /// must pass to [`schedule_revert`].
    pub fn mark_copied(&self, index: usize) -> u64 {
        let mut inner = self.inner.lock().expect("copy tracker lock");
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.cards.insert(
            index,
            CardCopy {
                state: CopyState::Copied,
                generation,
            },
        );
        generation
    }

    /// Spawn the fixed-delay revert timer for one copy event.
    pub fn schedule_revert(&self, index: usize, generation: u64) {
        let tracker = self.clone();
        thread::spawn(move || {
            thread::sleep(COPY_REVERT_DELAY);
            tracker.revert_if_current(index, generation);
        });
    }

    /// Revert the card to Idle only if `generation` is still its latest copy.
    pub fn revert_if_current(&self, index: usize, generation: u64) {
        let mut inner = self.inner.lock().expect("copy tracker lock");
        if let Some(card) = inner.cards.get_mut(&index) {
            if card.generation == generation {
                card.state = CopyState::Idle;
            }
        }
    }

    /// Drop state for cards past the end of the current document. Called on
    /// every render so copy state never outlives its card.
    pub fn retain_visible(&self, card_count: usize) {
        let mut inner = self.inner.lock().expect("copy tracker lock");
        inner.cards.retain(|&index, _| index <= card_count);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_until_copied() {
        let tracker = CopyTracker::default();
        assert_eq!(tracker.state(1), CopyState::Idle);
        assert_eq!(tracker.label(1), "Copy");
        tracker.mark_copied(1);
        assert_eq!(tracker.state(1), CopyState::Copied);
        assert_eq!(tracker.label(1), "Copied!");
    }

    #[test]
    fn current_revert_flips_back_to_idle() {
        let tracker = CopyTracker::default();
        let generation = tracker.mark_copied(1);
        tracker.revert_if_current(1, generation);
        assert_eq!(tracker.state(1), CopyState::Idle);
    }

    #[test]
    fn stale_revert_is_a_no_op() {
        let tracker = CopyTracker::default();
        let stale = tracker.mark_copied(1);
        // Re-copy before the first timer fires.
        let _current = tracker.mark_copied(1);
        tracker.revert_if_current(1, stale);
        assert_eq!(tracker.state(1), CopyState::Copied);
    }

    #[test]
    fn revert_for_vanished_card_is_harmless() {
        let tracker = CopyTracker::default();
        let generation = tracker.mark_copied(3);
        tracker.retain_visible(1);
        tracker.revert_if_current(3, generation);
        assert_eq!(tracker.state(3), CopyState::Idle);
    }

    #[test]
    fn retain_keeps_visible_cards() {
        let tracker = CopyTracker::default();
        tracker.mark_copied(1);
        tracker.mark_copied(2);
        tracker.retain_visible(2);
        assert_eq!(tracker.state(1), CopyState::Copied);
        assert_eq!(tracker.state(2), CopyState::Copied);
    }
}
