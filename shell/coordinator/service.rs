/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Async shell around [`PaneCoordinator`].
//!
//! Two inbound streams feed the coordinator: host lifecycle events and
//! JSON requests from page interceptors. Both are handled one at a time,
//! so the interception map is only ever touched by one handler.
//!
//! Hosts with their own frame loop call [`CoordinatorService::drain_pending`]
//! each tick; everything else spawns [`CoordinatorService::run`] and stops it
//! through the [`CancellationToken`].

use std::time::Instant;

use splitlink_core::protocol;
use splitlink_core::{CoordinatorReply, InterceptorRequest, PageContextId, is_http_like};
use splitlink_runtime::HostPlatform;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::PaneCoordinator;
use crate::shell::runtime::diagnostics::{self, DiagnosticEvent, emit_event};
use crate::shell::runtime::link::{CoordinatorLink, PageEnvelope, PageRequestReceiver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    PageActivated(PageContextId),
    /// A page finished loading a new document.
    NavigationCompleted(PageContextId),
    PageClosed(PageContextId),
    ActionClicked(PageContextId),
    /// The page joined, left or switched pane groups.
    SplitChanged(PageContextId),
}

pub type HostEventSender = mpsc::UnboundedSender<HostEvent>;

pub struct CoordinatorInbox {
    pub host_events: mpsc::UnboundedReceiver<HostEvent>,
    pub page_requests: PageRequestReceiver,
}

/// Sender for the host, link for interceptors, inbox for the service.
pub fn coordinator_channels() -> (HostEventSender, CoordinatorLink, CoordinatorInbox) {
    let (host_tx, host_events) = mpsc::unbounded_channel();
    let (link, page_requests) = CoordinatorLink::channel();
    (
        host_tx,
        link,
        CoordinatorInbox {
            host_events,
            page_requests,
        },
    )
}

pub struct CoordinatorService<P: HostPlatform> {
    coordinator: PaneCoordinator<P>,
    inbox: CoordinatorInbox,
    cancel: CancellationToken,
}

impl<P: HostPlatform> CoordinatorService<P> {
    pub fn new(coordinator: PaneCoordinator<P>, inbox: CoordinatorInbox) -> Self {
        Self {
            coordinator,
            inbox,
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn coordinator(&self) -> &PaneCoordinator<P> {
        &self.coordinator
    }

    /// Handle inbound work until cancelled or every sender is gone, then
    /// hand the coordinator back.
    pub async fn run(mut self) -> PaneCoordinator<P> {
        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::debug!("coordinator: service cancelled");
                    break;
                }
                Some(event) = self.inbox.host_events.recv() => {
                    self.handle_host_event(event).await;
                }
                Some(envelope) = self.inbox.page_requests.recv() => {
                    self.handle_envelope(envelope).await;
                }
                else => {
                    log::debug!("coordinator: all senders dropped");
                    break;
                }
            }
        }
        self.coordinator
    }

    /// Handle everything queued, including work queued by the handlers
    /// themselves. Returns how many items were handled.
    pub async fn drain_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            if let Ok(event) = self.inbox.host_events.try_recv() {
                self.handle_host_event(event).await;
            } else if let Ok(envelope) = self.inbox.page_requests.try_recv() {
                self.handle_envelope(envelope).await;
            } else {
                break;
            }
            handled += 1;
        }
        handled
    }

    async fn handle_host_event(&mut self, event: HostEvent) {
        log::debug!("coordinator: host event {event:?}");
        match event {
            HostEvent::PageActivated(page) => {
                self.coordinator.on_page_activated(page).await;
            }
            HostEvent::NavigationCompleted(page) => {
                self.coordinator.on_navigation_completed(page).await;
            }
            HostEvent::PageClosed(page) => self.coordinator.on_page_closed(page),
            HostEvent::ActionClicked(page) => {
                self.coordinator.on_action_clicked(page).await;
            }
            HostEvent::SplitChanged(page) => {
                self.coordinator.on_split_changed(page).await;
            }
        }
    }

    async fn handle_envelope(&mut self, envelope: PageEnvelope) {
        let PageEnvelope {
            source,
            payload,
            sent_at,
            reply,
        } = envelope;
        let latency_us =
            u64::try_from(Instant::now().saturating_duration_since(sent_at).as_micros())
                .unwrap_or(u64::MAX);
        emit_event(DiagnosticEvent::MessageReceived {
            channel_id: diagnostics::CHANNEL_REQUEST_RECEIVED,
            latency_us,
        });

        let request: InterceptorRequest = match protocol::decode(&payload) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("coordinator: dropping malformed request from {source}: {e}");
                emit_event(DiagnosticEvent::MessageSent {
                    channel_id: diagnostics::CHANNEL_REQUEST_MALFORMED,
                    byte_len: payload.len(),
                });
                return;
            }
        };

        match request {
            InterceptorRequest::CheckEnabled => {
                let enabled = self.coordinator.is_enabled(source);
                if reply.send(CoordinatorReply::Enabled { enabled }).is_err() {
                    log::debug!("coordinator: {source} stopped waiting for CHECK_ENABLED");
                }
            }
            InterceptorRequest::OpenInOtherSplit { url } => {
                // The page is answered before the navigation happens.
                if reply.send(CoordinatorReply::Ack { success: true }).is_err() {
                    log::debug!("coordinator: {source} stopped waiting for its open ack");
                }
                match Url::parse(&url) {
                    Ok(parsed) if is_http_like(&parsed) => {
                        self.coordinator.open_elsewhere(source, parsed.as_str()).await;
                    }
                    _ => {
                        log::debug!("coordinator: ignoring open request for {url:?}");
                        emit_event(DiagnosticEvent::MessageSent {
                            channel_id: diagnostics::CHANNEL_OPEN_IGNORED_SCHEME,
                            byte_len: url.len(),
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::{ActionTitles, InterceptorPrefs};
    use crate::shell::host::{InMemoryHost, NavigationCause};
    use crate::shell::runtime::diagnostics::DiagnosticsState;
    use std::sync::Arc;

    struct Setup {
        host: Arc<InMemoryHost>,
        link: CoordinatorLink,
        service: CoordinatorService<InMemoryHost>,
    }

    fn setup() -> Setup {
        let (events, link, inbox) = coordinator_channels();
        let host = Arc::new(InMemoryHost::new(
            link.clone(),
            events,
            InterceptorPrefs::default(),
        ));
        let coordinator = PaneCoordinator::new(host.clone(), ActionTitles::default());
        Setup {
            host,
            link,
            service: CoordinatorService::new(coordinator, inbox),
        }
    }

    #[tokio::test]
    async fn test_check_enabled_replies_with_current_flag() {
        let mut s = setup();
        let window = s.host.open_window();
        let a = s.host.open_page(window, "https://example.com/a").unwrap();
        let b = s.host.open_page(window, "https://example.com/b").unwrap();
        s.host.split(a, b).unwrap();
        s.host.activate(a).unwrap();
        s.service.drain_pending().await;
        s.host.click_action(a).unwrap();
        s.service.drain_pending().await;

        let reply = s
            .link
            .send(b, &InterceptorRequest::CheckEnabled)
            .unwrap();
        s.service.drain_pending().await;
        assert_eq!(reply.await.unwrap(), CoordinatorReply::Enabled { enabled: true });
    }

    #[tokio::test]
    async fn test_malformed_request_is_dropped() {
        let mut s = setup();
        let mut diag = DiagnosticsState::new();
        diag.install();

        let reply = s
            .link
            .send_raw(PageContextId::new(1), r#"{"type":"NAVIGATE_AWAY"}"#.to_string())
            .unwrap();
        assert_eq!(s.service.drain_pending().await, 1);
        assert!(reply.await.is_err());

        diag.drain();
        assert_eq!(diag.message_count(diagnostics::CHANNEL_REQUEST_MALFORMED), 1);
    }

    #[tokio::test]
    async fn test_non_http_open_request_is_acked_and_ignored() {
        let mut s = setup();
        let window = s.host.open_window();
        let page = s.host.open_page(window, "https://example.com/").unwrap();
        s.service.drain_pending().await;

        let reply = s
            .link
            .send(
                page,
                &InterceptorRequest::OpenInOtherSplit {
                    url: "ftp://example.com/file".into(),
                },
            )
            .unwrap();
        s.service.drain_pending().await;

        assert_eq!(reply.await.unwrap(), CoordinatorReply::Ack { success: true });
        assert_eq!(s.host.pages(), vec![page]);
        assert!(s.host.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_open_request_without_sibling_creates_page() {
        let mut s = setup();
        let window = s.host.open_window();
        let page = s.host.open_page(window, "https://example.com/").unwrap();

        let _reply = s
            .link
            .send(
                page,
                &InterceptorRequest::OpenInOtherSplit {
                    url: "https://example.com/x".into(),
                },
            )
            .unwrap();
        s.service.drain_pending().await;

        let navigations = s.host.navigations();
        assert_eq!(navigations.len(), 1);
        assert_eq!(navigations[0].cause, NavigationCause::Created);
    }

    #[tokio::test]
    async fn test_open_request_still_navigates_after_page_stops_waiting() {
        let mut s = setup();
        let window = s.host.open_window();
        let a = s.host.open_page(window, "https://example.com/a").unwrap();
        let b = s.host.open_page(window, "https://example.com/b").unwrap();
        s.host.split(a, b).unwrap();
        s.service.drain_pending().await;

        let reply = s
            .link
            .send(
                a,
                &InterceptorRequest::OpenInOtherSplit {
                    url: "https://example.com/x".into(),
                },
            )
            .unwrap();
        drop(reply);
        s.service.drain_pending().await;

        assert_eq!(
            s.host.location(b).map(|url| url.to_string()).as_deref(),
            Some("https://example.com/x")
        );
    }

    #[tokio::test]
    async fn test_split_change_refreshes_former_sibling() {
        let mut s = setup();
        let window = s.host.open_window();
        let a = s.host.open_page(window, "https://example.com/a").unwrap();
        let b = s.host.open_page(window, "https://example.com/b").unwrap();
        s.host.split(a, b).unwrap();
        s.service.drain_pending().await;
        assert!(s.host.click_action(a).unwrap());
        s.service.drain_pending().await;
        assert_eq!(s.host.interceptor_enabled(b), Some(true));

        s.host.unsplit(a).unwrap();
        s.service.drain_pending().await;

        for page in [a, b] {
            assert!(!s.service.coordinator().has_state(page));
            assert!(!s.host.toolbar(page).unwrap().enabled);
            assert_eq!(s.host.interceptor_enabled(page), Some(false));
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let s = setup();
        let cancel = s.service.cancel_token();
        let task = tokio::spawn(s.service.run());

        cancel.cancel();
        let coordinator = task.await.unwrap();
        assert_eq!(coordinator.tracked_pages(), 0);
    }

    #[tokio::test]
    async fn test_run_handles_events_until_cancelled() {
        let s = setup();
        let host = s.host.clone();
        let window = host.open_window();
        let a = host.open_page(window, "https://example.com/a").unwrap();
        let b = host.open_page(window, "https://example.com/b").unwrap();
        host.split(a, b).unwrap();

        let cancel = s.service.cancel_token();
        let task = tokio::spawn(s.service.run());
        for _ in 0..100 {
            if host.toolbar(a).is_some_and(|toolbar| toolbar.enabled) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(host.click_action(a).unwrap());
        for _ in 0..100 {
            if host.interceptor_enabled(b) == Some(true) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        cancel.cancel();
        let coordinator = task.await.unwrap();

        assert!(coordinator.is_enabled(a));
        assert!(coordinator.is_enabled(b));
    }
}
