//! One-shot visibility triggers.
//!
//! The embedding host watches card geometry (with the configured look-ahead
//! margin) and calls [`VisibilityTracker::report_visible`] when a card enters
//! it. The watch is removed before the event is forwarded, so a card that
//! keeps re-entering the viewport can never enqueue a second task — the
//! no-duplicate guarantee lives in this consumption, not in a flag.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::domain::{CardHandle, Story};
use crate::scheduler::SchedulerHandle;

pub struct VisibilityTracker {
    scheduler: SchedulerHandle,
    watches: Mutex<HashMap<CardHandle, String>>,
}

impl VisibilityTracker {
    pub fn new(scheduler: SchedulerHandle) -> Self {
        Self {
            scheduler,
            watches: Mutex::new(HashMap::new()),
        }
    }

    /// Register a story's card for preview resolution. Self posts and
    /// domain-less entries are not watchable; returns whether a watch was
    /// armed.
    pub fn watch_story(&self, story: &Story) -> bool {
        if !story.wants_thumbnail() {
            return false;
        }
        self.watch(CardHandle::for_story(story), story.url.clone());
        true
    }

    pub fn watch(&self, handle: CardHandle, target: String) {
        self.lock_watches().insert(handle, target);
    }

    /// A watched card entered the look-ahead margin. Consumes the watch and
    /// enqueues the fetch task; returns false when the card was not (or no
    /// longer) watched.
    pub async fn report_visible(&self, handle: &CardHandle) -> bool {
        let target = self.lock_watches().remove(handle);

        match target {
            Some(target) => {
                self.scheduler.report_visible(target, handle.clone()).await;
                true
            }
            None => {
                debug!("Ignoring visibility report for unwatched card {}", handle);
                false
            }
        }
    }

    pub fn watched_count(&self) -> usize {
        self.lock_watches().len()
    }

    fn lock_watches(&self) -> std::sync::MutexGuard<'_, HashMap<CardHandle, String>> {
        self.watches.lock().unwrap_or_else(|e| e.into_inner())
    }
}
