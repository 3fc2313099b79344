/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Diagnostics channel bus.
//!
//! Components report what they did (a push delivered, a click redirected, a
//! stale gesture dropped) as counted events on static channel ids. Nothing
//! here changes behaviour; a host that never installs a sender pays only for
//! the `OnceLock` read.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crossbeam_channel::{Receiver, Sender, unbounded};
use serde_json::{Value, json};

pub const CHANNEL_PUSH_DELIVERED: &str = "coordinator.push.delivered";
pub const CHANNEL_PUSH_INSTALL_RETRY: &str = "coordinator.push.install_retry";
pub const CHANNEL_PUSH_DROPPED: &str = "coordinator.push.dropped";
pub const CHANNEL_PUSH_SKIPPED_RESTRICTED: &str = "coordinator.push.skipped_restricted";
pub const CHANNEL_OPEN_SIBLING: &str = "coordinator.open.sibling";
pub const CHANNEL_OPEN_NEW_PAGE: &str = "coordinator.open.new_page";
pub const CHANNEL_OPEN_IGNORED_SCHEME: &str = "coordinator.open.ignored_scheme";
pub const CHANNEL_REQUEST_RECEIVED: &str = "coordinator.request.received";
pub const CHANNEL_REQUEST_MALFORMED: &str = "coordinator.request.malformed";
pub const CHANNEL_TOGGLE: &str = "coordinator.toggle";

pub const CHANNEL_PENDING_RECORDED: &str = "interceptor.pending.recorded";
pub const CHANNEL_PENDING_STALE: &str = "interceptor.pending.stale";
pub const CHANNEL_CLICK_REDIRECTED: &str = "interceptor.click.redirected";
pub const CHANNEL_CLICK_FALLBACK_REDIRECTED: &str = "interceptor.click.fallback_redirected";
pub const CHANNEL_CLICK_SETTLED_BY_HISTORY: &str = "interceptor.click.settled_by_history";
pub const CHANNEL_HISTORY_REDIRECTED: &str = "interceptor.history.redirected";
pub const CHANNEL_REQUEST_SEND_FAILED: &str = "interceptor.request.send_failed";

static GLOBAL_DIAGNOSTICS_TX: OnceLock<Sender<DiagnosticEvent>> = OnceLock::new();

#[cfg(test)]
thread_local! {
    static TEST_DIAGNOSTICS_TX: std::cell::RefCell<Option<Sender<DiagnosticEvent>>> =
        const { std::cell::RefCell::new(None) };
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticEvent {
    MessageSent {
        channel_id: &'static str,
        byte_len: usize,
    },
    MessageReceived {
        channel_id: &'static str,
        latency_us: u64,
    },
}

pub fn install_global_sender(sender: Sender<DiagnosticEvent>) {
    #[cfg(test)]
    {
        TEST_DIAGNOSTICS_TX.with(|slot| {
            *slot.borrow_mut() = Some(sender.clone());
        });
    }

    let _ = GLOBAL_DIAGNOSTICS_TX.set(sender);
}

pub fn emit_event(event: DiagnosticEvent) {
    // Under test each thread reports only to its own state, so parallel
    // tests never see each other's counts.
    #[cfg(test)]
    {
        TEST_DIAGNOSTICS_TX.with(|slot| {
            if let Some(tx) = slot.borrow().as_ref() {
                let _ = tx.send(event);
            }
        });
    }

    #[cfg(not(test))]
    {
        if let Some(tx) = GLOBAL_DIAGNOSTICS_TX.get() {
            let _ = tx.send(event);
        }
    }
}

/// Aggregated view over everything emitted since the state was created.
pub struct DiagnosticsState {
    pub event_tx: Sender<DiagnosticEvent>,
    event_rx: Receiver<DiagnosticEvent>,
    message_counts: BTreeMap<&'static str, u64>,
    bytes_sent: BTreeMap<&'static str, u64>,
    latency_us_total: BTreeMap<&'static str, u64>,
}

impl DiagnosticsState {
    pub fn new() -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            event_tx,
            event_rx,
            message_counts: BTreeMap::new(),
            bytes_sent: BTreeMap::new(),
            latency_us_total: BTreeMap::new(),
        }
    }

    /// Route [`emit_event`] into this state.
    pub fn install(&self) {
        install_global_sender(self.event_tx.clone());
    }

    /// Fold every queued event into the counters. Returns how many were read.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            drained += 1;
            match event {
                DiagnosticEvent::MessageSent {
                    channel_id,
                    byte_len,
                } => {
                    *self.message_counts.entry(channel_id).or_default() += 1;
                    *self.bytes_sent.entry(channel_id).or_default() += byte_len as u64;
                }
                DiagnosticEvent::MessageReceived {
                    channel_id,
                    latency_us,
                } => {
                    *self.message_counts.entry(channel_id).or_default() += 1;
                    *self.latency_us_total.entry(channel_id).or_default() += latency_us;
                }
            }
        }
        drained
    }

    pub fn message_count(&self, channel_id: &str) -> u64 {
        self.message_counts.get(channel_id).copied().unwrap_or(0)
    }

    pub fn channels(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.message_counts.iter().map(|(k, v)| (*k, *v))
    }

    pub fn snapshot_json(&self) -> Value {
        json!({
            "channels": {
                "message_counts": self.message_counts,
                "bytes_sent": self.bytes_sent,
                "latency_us_total": self.latency_us_total,
            }
        })
    }
}

impl Default for DiagnosticsState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_counts_per_channel() {
        let mut state = DiagnosticsState::new();
        state.install();

        emit_event(DiagnosticEvent::MessageSent {
            channel_id: CHANNEL_OPEN_SIBLING,
            byte_len: 21,
        });
        emit_event(DiagnosticEvent::MessageSent {
            channel_id: CHANNEL_OPEN_SIBLING,
            byte_len: 4,
        });
        emit_event(DiagnosticEvent::MessageReceived {
            channel_id: CHANNEL_REQUEST_RECEIVED,
            latency_us: 10,
        });

        assert_eq!(state.drain(), 3);
        assert_eq!(state.message_count(CHANNEL_OPEN_SIBLING), 2);
        assert_eq!(state.message_count(CHANNEL_REQUEST_RECEIVED), 1);
        assert_eq!(state.message_count(CHANNEL_OPEN_NEW_PAGE), 0);

        let snapshot = state.snapshot_json();
        assert_eq!(
            snapshot["channels"]["bytes_sent"][CHANNEL_OPEN_SIBLING].as_u64(),
            Some(25)
        );
    }

    #[test]
    fn test_emit_without_installed_state_is_dropped() {
        emit_event(DiagnosticEvent::MessageSent {
            channel_id: CHANNEL_PUSH_DROPPED,
            byte_len: 0,
        });
        let mut state = DiagnosticsState::new();
        assert_eq!(state.drain(), 0);
    }
}
