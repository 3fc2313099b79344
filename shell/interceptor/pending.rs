/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Single-slot record of the last eligible press.
//!
//! A press records where the user meant to go; the click (or a history
//! mutation) that follows within [`PENDING_FRESHNESS_WINDOW`] acts on it.
//! Older entries are dropped the next time anyone looks at the slot.

use std::time::{Duration, Instant};

use url::Url;

use super::dom::NodeId;

pub const PENDING_FRESHNESS_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNavigation {
    pub url: Url,
    pub captured_at: Instant,
    pub origin: NodeId,
    /// A history mutation already redirected this gesture; the click that
    /// follows must be swallowed, not sent again.
    pub settled_by_history: bool,
}

impl PendingNavigation {
    pub fn new(url: Url, captured_at: Instant, origin: NodeId) -> Self {
        Self {
            url,
            captured_at,
            origin,
            settled_by_history: false,
        }
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        self.age(now) < PENDING_FRESHNESS_WINDOW
    }
}

#[derive(Debug, Default)]
pub struct PendingSlot {
    entry: Option<PendingNavigation>,
}

impl PendingSlot {
    /// Overwrite the slot, returning whatever was there.
    pub fn record(&mut self, pending: PendingNavigation) -> Option<PendingNavigation> {
        self.entry.replace(pending)
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn peek(&self) -> Option<&PendingNavigation> {
        self.entry.as_ref()
    }

    /// Drop the entry if it has aged out, returning it.
    pub fn discard_if_stale(&mut self, now: Instant) -> Option<PendingNavigation> {
        if self.entry.as_ref().is_some_and(|p| !p.is_fresh(now)) {
            return self.entry.take();
        }
        None
    }

    /// Consume the entry if it is still fresh. Stale entries are dropped.
    pub fn take_fresh(&mut self, now: Instant) -> Option<PendingNavigation> {
        self.discard_if_stale(now);
        self.entry.take()
    }

    pub fn fresh_mut(&mut self, now: Instant) -> Option<&mut PendingNavigation> {
        self.discard_if_stale(now);
        self.entry.as_mut()
    }
}
