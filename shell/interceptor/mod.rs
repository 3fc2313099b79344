/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Page-side navigation interceptor.
//!
//! One [`NavigationInterceptor`] lives in each page context that the host
//! installed it into. It captures user-initiated navigation in two phases:
//!
//! 1. On pointer-down / mouse-down it resolves the nearest link and, if the
//!    gesture is eligible, records a [`PendingNavigation`] and stops the
//!    press from reaching page handlers. The default action is left alone.
//! 2. On click it consumes a fresh pending entry (or re-evaluates the click
//!    itself), prevents the default action and asks the coordinator to open
//!    the URL in the other pane.
//!
//! Single-page apps that route from their own press handlers are caught by
//! the history wrapper: a same-origin route change issued while a pending
//! entry is still fresh is redirected instead of applied. That correlation
//! is a timing heuristic and can misfire on very slow or very fast routers.

pub mod dom;
pub mod eligibility;
pub mod history;
pub mod pending;

use std::sync::{Arc, Weak};

use log::{debug, warn};
use parking_lot::Mutex;
use splitlink_core::protocol::{self, ProtocolError};
use splitlink_core::{
    CoordinatorMessage, CoordinatorReply, InterceptorReply, InterceptorRequest, PageContextId,
};
use tokio::sync::oneshot;
use url::Url;

use crate::prefs::InterceptorPrefs;
use crate::shell::runtime::diagnostics::{self, DiagnosticEvent, emit_event};
use crate::shell::runtime::link::CoordinatorLink;

use self::dom::{Document, DomEvent, EventFlow, EventKind};
use self::eligibility::{InterceptDecision, should_intercept};
use self::history::{
    HistoryCall, HistoryPatchError, HistoryPatchGuard, HistorySurface, HistoryVerdict,
    HistoryWrapper,
};
use self::pending::{PendingNavigation, PendingSlot};

fn emit_sent(channel_id: &'static str, byte_len: usize) {
    emit_event(DiagnosticEvent::MessageSent {
        channel_id,
        byte_len,
    });
}

struct InterceptorCore {
    page: PageContextId,
    enabled: bool,
    history_interception_enabled: bool,
    prefs: InterceptorPrefs,
    pending: PendingSlot,
    link: CoordinatorLink,
    /// Bumped on every coordinator push; lets the install-time query detect
    /// that a newer state already arrived.
    state_epoch: u64,
}

impl InterceptorCore {
    fn arm(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.history_interception_enabled = enabled && self.prefs.history_interception;
        if !enabled {
            self.pending.clear();
        }
    }

    fn on_press(&mut self, document: &Document, event: &DomEvent, flow: &mut EventFlow) {
        let link = document.closest_link(event.target);
        match should_intercept(self.enabled, link.as_ref(), event.button, event.modifiers) {
            InterceptDecision::Intercept(url) => {
                flow.stop_immediate_propagation();
                let origin = link.map_or(event.target, |link| link.node);
                // pointerdown and mousedown of one press must not undo a
                // history redirect made between them.
                let settled = self
                    .pending
                    .fresh_mut(event.time_stamp)
                    .is_some_and(|pending| pending.settled_by_history && pending.url == url);
                emit_sent(diagnostics::CHANNEL_PENDING_RECORDED, url.as_str().len());
                let mut pending = PendingNavigation::new(url, event.time_stamp, origin);
                pending.settled_by_history = settled;
                self.pending.record(pending);
            }
            InterceptDecision::Decline(reason) => {
                if self.pending.peek().is_some() {
                    debug!("interceptor: {} press declined ({reason:?}); clearing pending", self.page);
                }
                self.pending.clear();
            }
        }
    }

    fn on_click(&mut self, document: &Document, event: &DomEvent, flow: &mut EventFlow) {
        if let Some(stale) = self.pending.discard_if_stale(event.time_stamp) {
            debug!(
                "interceptor: {} discarding stale pending {} ({:?} old)",
                self.page,
                stale.url,
                stale.age(event.time_stamp)
            );
            emit_sent(diagnostics::CHANNEL_PENDING_STALE, stale.url.as_str().len());
        }

        if let Some(pending) = self.pending.take_fresh(event.time_stamp) {
            if pending.settled_by_history {
                flow.prevent_default();
                flow.stop_propagation();
                emit_sent(
                    diagnostics::CHANNEL_CLICK_SETTLED_BY_HISTORY,
                    pending.url.as_str().len(),
                );
                return;
            }
            if self.request_open(&pending.url) {
                flow.prevent_default();
                flow.stop_propagation();
                emit_sent(diagnostics::CHANNEL_CLICK_REDIRECTED, pending.url.as_str().len());
            }
            return;
        }

        let link = document.closest_link(event.target);
        if let InterceptDecision::Intercept(url) =
            should_intercept(self.enabled, link.as_ref(), event.button, event.modifiers)
            && self.request_open(&url)
        {
            flow.prevent_default();
            flow.stop_propagation();
            emit_sent(diagnostics::CHANNEL_CLICK_FALLBACK_REDIRECTED, url.as_str().len());
        }
    }

    fn on_history_call(&mut self, call: &HistoryCall) -> HistoryVerdict {
        if !self.enabled || !self.history_interception_enabled {
            return HistoryVerdict::Proceed;
        }
        if !call.is_same_origin_route_change() {
            return HistoryVerdict::Proceed;
        }
        let settled = match self.pending.fresh_mut(call.issued_at) {
            Some(pending) => pending.settled_by_history,
            None => return HistoryVerdict::Proceed,
        };
        if settled {
            debug!(
                "interceptor: {} suppressing repeat {} to {}",
                self.page,
                call.method.name(),
                call.target
            );
            return HistoryVerdict::Suppress;
        }
        if !self.request_open(&call.target) {
            return HistoryVerdict::Proceed;
        }
        if let Some(pending) = self.pending.fresh_mut(call.issued_at) {
            pending.settled_by_history = true;
        }
        emit_sent(diagnostics::CHANNEL_HISTORY_REDIRECTED, call.target.as_str().len());
        HistoryVerdict::Redirect
    }

    /// Fire-and-forget OPEN_IN_OTHER_SPLIT. False when nothing was sent.
    fn request_open(&self, url: &Url) -> bool {
        let request = InterceptorRequest::OpenInOtherSplit {
            url: url.to_string(),
        };
        match self.link.send(self.page, &request) {
            Ok(_reply) => {
                debug!("interceptor: {} requested {url} in other split", self.page);
                true
            }
            Err(e) => {
                warn!("interceptor: {} could not request {url}: {e}", self.page);
                emit_sent(diagnostics::CHANNEL_REQUEST_SEND_FAILED, url.as_str().len());
                false
            }
        }
    }
}

struct HistoryRedirect {
    core: Weak<Mutex<InterceptorCore>>,
}

impl HistoryWrapper for HistoryRedirect {
    fn intercept(&self, call: &HistoryCall) -> HistoryVerdict {
        match self.core.upgrade() {
            Some(core) => core.lock().on_history_call(call),
            None => HistoryVerdict::Proceed,
        }
    }
}

/// Installed interceptor for one page context. Dropping it releases the
/// history patch.
pub struct NavigationInterceptor {
    core: Arc<Mutex<InterceptorCore>>,
    _history_patch: HistoryPatchGuard,
}

impl std::fmt::Debug for NavigationInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core.lock();
        f.debug_struct("NavigationInterceptor")
            .field("page", &core.page)
            .field("enabled", &core.enabled)
            .field("history_interception_enabled", &core.history_interception_enabled)
            .finish()
    }
}

impl NavigationInterceptor {
    /// Patch `history`, then ask the coordinator for the current state.
    ///
    /// The returned [`InitialStateSync`] must be driven for that answer to
    /// take effect; until then the interceptor stays disabled.
    pub fn install(
        page: PageContextId,
        history: &HistorySurface,
        link: CoordinatorLink,
        prefs: InterceptorPrefs,
    ) -> Result<(Self, InitialStateSync), HistoryPatchError> {
        let core = Arc::new(Mutex::new(InterceptorCore {
            page,
            enabled: false,
            history_interception_enabled: false,
            prefs,
            pending: PendingSlot::default(),
            link,
            state_epoch: 0,
        }));
        let history_patch = history.patch(Arc::new(HistoryRedirect {
            core: Arc::downgrade(&core),
        }))?;

        let reply = {
            let core = core.lock();
            match core.link.send(page, &InterceptorRequest::CheckEnabled) {
                Ok(reply) => Some(reply),
                Err(e) => {
                    warn!("interceptor: {page} initial state check failed: {e}");
                    None
                }
            }
        };

        let sync = InitialStateSync {
            core: Arc::downgrade(&core),
            page,
            epoch: 0,
            reply,
        };
        Ok((
            Self {
                core,
                _history_patch: history_patch,
            },
            sync,
        ))
    }

    pub fn page(&self) -> PageContextId {
        self.core.lock().page
    }

    pub fn is_enabled(&self) -> bool {
        self.core.lock().enabled
    }

    pub fn history_interception_enabled(&self) -> bool {
        self.core.lock().history_interception_enabled
    }

    pub fn pending(&self) -> Option<PendingNavigation> {
        self.core.lock().pending.peek().cloned()
    }

    /// Capture-phase entry point for pointer and click events.
    pub fn handle_event(&self, document: &Document, event: &DomEvent, flow: &mut EventFlow) {
        let mut core = self.core.lock();
        match event.kind {
            EventKind::PointerDown | EventKind::MouseDown => core.on_press(document, event, flow),
            EventKind::Click => core.on_click(document, event, flow),
        }
    }

    pub fn apply(&self, message: CoordinatorMessage) -> InterceptorReply {
        let mut core = self.core.lock();
        match message {
            CoordinatorMessage::UpdateState { enabled } => {
                core.state_epoch += 1;
                core.arm(enabled);
                debug!("interceptor: {} enabled={enabled}", core.page);
            }
        }
        InterceptorReply::ACK
    }

    /// JSON in, JSON reply out.
    pub fn handle_message(&self, raw: &str) -> Result<String, ProtocolError> {
        let message: CoordinatorMessage = protocol::decode(raw)?;
        protocol::encode(&self.apply(message))
    }
}

/// Pending reply to the install-time CHECK_ENABLED query.
#[must_use = "the interceptor stays disabled until the initial state is applied"]
pub struct InitialStateSync {
    core: Weak<Mutex<InterceptorCore>>,
    page: PageContextId,
    epoch: u64,
    reply: Option<oneshot::Receiver<CoordinatorReply>>,
}

impl InitialStateSync {
    pub async fn run(self) {
        let Some(reply) = self.reply else {
            return;
        };
        match reply.await {
            Ok(CoordinatorReply::Enabled { enabled }) => {
                let Some(core) = self.core.upgrade() else {
                    return;
                };
                let mut core = core.lock();
                if core.state_epoch != self.epoch {
                    debug!("interceptor: {} newer state already applied", self.page);
                } else if enabled {
                    core.arm(true);
                }
            }
            Ok(other) => {
                warn!("interceptor: {} unexpected CHECK_ENABLED reply {other:?}", self.page);
            }
            Err(_) => debug!("interceptor: {} CHECK_ENABLED went unanswered", self.page),
        }
    }
}
