/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! In-process browser stand-in.
//!
//! `InMemoryHost` keeps windows, pages and split groups in memory and runs
//! page-side code (interceptor, simulated framework listeners, default
//! link actions) synchronously on dispatch. Lifecycle changes are reported
//! to the coordinator through the host event channel, the same way a real
//! browser reports tab activation, load completion and closing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use splitlink_core::protocol;
use splitlink_core::{
    CoordinatorMessage, InterceptorReply, PageContextId, PaneGroupId, WindowId,
    can_install_interceptor, is_http_like,
};
use splitlink_runtime::{HostPlatform, IconSet, PageInfo, PlatformError};
use url::Url;

use super::install_registry::InstallRegistry;
use crate::prefs::InterceptorPrefs;
use crate::shell::coordinator::service::{HostEvent, HostEventSender};
use crate::shell::interceptor::NavigationInterceptor;
use crate::shell::interceptor::dom::{
    Document, DomEvent, EventFlow, EventKind, LinkKind, Modifiers, MouseButton, NodeId,
};
use crate::shell::interceptor::history::{HistoryOutcome, HistorySurface};
use crate::shell::runtime::link::CoordinatorLink;

/// Gap between the press and the click of a simulated mouse click.
pub const SIMULATED_CLICK_DELAY: Duration = Duration::from_millis(80);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarState {
    pub icon: IconSet,
    pub title: String,
    pub enabled: bool,
}

impl Default for ToolbarState {
    fn default() -> Self {
        Self {
            icon: IconSet::Disabled,
            title: String::new(),
            enabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationCause {
    /// Requested through [`HostPlatform::navigate`].
    Platform,
    /// A link's default action.
    Native,
    /// Client-side routing via `pushState`.
    HistoryApi,
    /// A page opened through [`HostPlatform::create_page`] or a `_blank` link.
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRecord {
    pub page: PageContextId,
    pub url: String,
    pub cause: NavigationCause,
}

/// Where a simulated page listener sits relative to the interceptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerStage {
    /// Window capture listener registered before the interceptor.
    BeforeInterceptor,
    /// Ordinary page handler; skipped once propagation stops.
    AfterInterceptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkAction {
    /// Client-side router: cancel the default and push the link's route.
    ClientRoute,
    /// Cancel the default and stop propagation.
    Swallow,
}

#[derive(Debug, Clone, Copy)]
struct FrameworkListener {
    kind: EventKind,
    stage: ListenerStage,
    action: FrameworkAction,
}

struct HostPage {
    window: WindowId,
    pane_group: Option<PaneGroupId>,
    document: Arc<Document>,
    history: HistorySurface,
    interceptor: Option<Arc<NavigationInterceptor>>,
    listeners: Vec<FrameworkListener>,
    toolbar: ToolbarState,
}

impl HostPage {
    fn loaded(window: WindowId, url: Url) -> Self {
        Self {
            window,
            pane_group: None,
            document: Arc::new(Document::new(url.clone())),
            history: HistorySurface::new(url),
            interceptor: None,
            listeners: Vec::new(),
            toolbar: ToolbarState::default(),
        }
    }

    fn info(&self, id: PageContextId) -> PageInfo {
        PageInfo {
            id,
            window: self.window,
            pane_group: self.pane_group,
            url: Some(self.history.location().to_string()),
        }
    }
}

#[derive(Default)]
struct HostState {
    next_id: u64,
    windows: BTreeMap<WindowId, Vec<PageContextId>>,
    pages: BTreeMap<PageContextId, HostPage>,
    navigations: Vec<NavigationRecord>,
    refuse_installs: bool,
}

impl HostState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn add_page(&mut self, window: WindowId, url: Url) -> Result<PageContextId, PlatformError> {
        if !self.windows.contains_key(&window) {
            return Err(PlatformError::WindowGone(window));
        }
        let page = PageContextId::new(self.allocate_id());
        self.windows.entry(window).or_default().push(page);
        self.pages.insert(page, HostPage::loaded(window, url));
        Ok(page)
    }

    fn page_mut(&mut self, page: PageContextId) -> Result<&mut HostPage, PlatformError> {
        self.pages.get_mut(&page).ok_or(PlatformError::PageGone(page))
    }

    /// Dissolve `group`, returning its former members.
    fn clear_group(&mut self, group: PaneGroupId) -> Vec<PageContextId> {
        let mut members = Vec::new();
        for (id, host_page) in self.pages.iter_mut() {
            if host_page.pane_group == Some(group) {
                host_page.pane_group = None;
                members.push(*id);
            }
        }
        members
    }
}

fn staged(
    listeners: &[FrameworkListener],
    kind: EventKind,
    stage: ListenerStage,
) -> impl Iterator<Item = &FrameworkListener> {
    listeners
        .iter()
        .filter(move |listener| listener.kind == kind && listener.stage == stage)
}

fn parse_url(raw: &str) -> Result<Url, PlatformError> {
    Url::parse(raw).map_err(|_| PlatformError::InvalidUrl(raw.to_string()))
}

pub struct InMemoryHost {
    state: Mutex<HostState>,
    installs: InstallRegistry,
    link: CoordinatorLink,
    events: HostEventSender,
    prefs: InterceptorPrefs,
}

impl InMemoryHost {
    pub fn new(link: CoordinatorLink, events: HostEventSender, prefs: InterceptorPrefs) -> Self {
        Self {
            state: Mutex::new(HostState::default()),
            installs: InstallRegistry::new(),
            link,
            events,
            prefs,
        }
    }

    fn emit(&self, event: HostEvent) {
        if let Err(e) = self.events.send(event) {
            log::debug!("host: coordinator gone; dropping {:?}", e.0);
        }
    }

    pub fn open_window(&self) -> WindowId {
        let mut state = self.state.lock();
        let window = WindowId::new(state.allocate_id());
        state.windows.insert(window, Vec::new());
        window
    }

    /// Open a page the way a user would. Reported as a completed load.
    pub fn open_page(&self, window: WindowId, url: &str) -> Result<PageContextId, PlatformError> {
        let url = parse_url(url)?;
        let page = self.state.lock().add_page(window, url)?;
        self.emit(HostEvent::NavigationCompleted(page));
        Ok(page)
    }

    /// Put two pages of one window into a fresh split. Any split either
    /// page was in before is dissolved. Every page whose group changed is
    /// reported.
    pub fn split(&self, a: PageContextId, b: PageContextId) -> Result<PaneGroupId, PlatformError> {
        let group = PaneGroupId::new();
        let mut changed = {
            let mut state = self.state.lock();
            let (window_a, old_a) = {
                let page = state.page_mut(a)?;
                (page.window, page.pane_group)
            };
            let (window_b, old_b) = {
                let page = state.page_mut(b)?;
                (page.window, page.pane_group)
            };
            if a == b || window_a != window_b {
                return Err(PlatformError::PermissionDenied(format!(
                    "cannot split {a} with {b}"
                )));
            }
            let mut changed = vec![a, b];
            for old in [old_a, old_b].into_iter().flatten() {
                changed.extend(state.clear_group(old));
            }
            state.page_mut(a)?.pane_group = Some(group);
            state.page_mut(b)?.pane_group = Some(group);
            changed
        };
        log::debug!("host: {a} and {b} split as {group}");
        changed.sort();
        changed.dedup();
        for page in changed {
            self.emit(HostEvent::SplitChanged(page));
        }
        Ok(group)
    }

    /// Dissolve the page's split, reporting every former member.
    pub fn unsplit(&self, page: PageContextId) -> Result<(), PlatformError> {
        let changed = {
            let mut state = self.state.lock();
            match state.page_mut(page)?.pane_group {
                Some(group) => state.clear_group(group),
                None => Vec::new(),
            }
        };
        for member in changed {
            self.emit(HostEvent::SplitChanged(member));
        }
        Ok(())
    }

    pub fn close_page(&self, page: PageContextId) -> Result<(), PlatformError> {
        let closed = {
            let mut state = self.state.lock();
            let closed = state
                .pages
                .remove(&page)
                .ok_or(PlatformError::PageGone(page))?;
            if let Some(pages) = state.windows.get_mut(&closed.window) {
                pages.retain(|candidate| *candidate != page);
            }
            closed
        };
        self.installs.release(page);
        drop(closed);
        self.emit(HostEvent::PageClosed(page));
        Ok(())
    }

    pub fn activate(&self, page: PageContextId) -> Result<(), PlatformError> {
        self.state.lock().page_mut(page)?;
        self.emit(HostEvent::PageActivated(page));
        Ok(())
    }

    /// Press the toolbar action. A disabled action does not fire.
    pub fn click_action(&self, page: PageContextId) -> Result<bool, PlatformError> {
        let enabled = self.state.lock().page_mut(page)?.toolbar.enabled;
        if enabled {
            self.emit(HostEvent::ActionClicked(page));
        }
        Ok(enabled)
    }

    pub fn append_element(
        &self,
        page: PageContextId,
        parent: NodeId,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> Result<NodeId, PlatformError> {
        let mut state = self.state.lock();
        let host_page = state.page_mut(page)?;
        Ok(Arc::make_mut(&mut host_page.document).append(parent, tag, attributes))
    }

    /// Append `<a href=..>` under the document root.
    pub fn append_link(
        &self,
        page: PageContextId,
        href: &str,
        attributes: &[(&str, &str)],
    ) -> Result<NodeId, PlatformError> {
        let mut all = vec![("href", href)];
        all.extend_from_slice(attributes);
        self.append_element(page, NodeId::ROOT, "a", &all)
    }

    pub fn add_listener(
        &self,
        page: PageContextId,
        kind: EventKind,
        stage: ListenerStage,
        action: FrameworkAction,
    ) -> Result<(), PlatformError> {
        self.state
            .lock()
            .page_mut(page)?
            .listeners
            .push(FrameworkListener {
                kind,
                stage,
                action,
            });
        Ok(())
    }

    /// Dispatch one event: early listeners, the interceptor, page
    /// listeners, then the default action of an uncancelled click.
    pub fn dispatch(&self, page: PageContextId, event: DomEvent) -> Result<EventFlow, PlatformError> {
        let (document, history, interceptor, listeners) = {
            let mut state = self.state.lock();
            let host_page = state.page_mut(page)?;
            (
                host_page.document.clone(),
                host_page.history.clone(),
                host_page.interceptor.clone(),
                host_page.listeners.clone(),
            )
        };
        let mut flow = EventFlow::default();
        for listener in staged(&listeners, event.kind, ListenerStage::BeforeInterceptor) {
            if flow.immediate_propagation_stopped() {
                break;
            }
            self.run_listener(page, listener.action, &document, &history, &event, &mut flow);
        }
        if let Some(interceptor) = &interceptor
            && !flow.immediate_propagation_stopped()
        {
            interceptor.handle_event(&document, &event, &mut flow);
        }
        for listener in staged(&listeners, event.kind, ListenerStage::AfterInterceptor) {
            if flow.propagation_stopped() {
                break;
            }
            self.run_listener(page, listener.action, &document, &history, &event, &mut flow);
        }

        if event.kind == EventKind::Click && !flow.default_prevented() {
            self.default_action(page, &document, event.target)?;
        }
        Ok(flow)
    }

    /// Primary-button press and click on `target`, no modifiers.
    pub fn click(&self, page: PageContextId, target: NodeId) -> Result<EventFlow, PlatformError> {
        self.click_with(page, target, MouseButton::Primary, Modifiers::NONE)
    }

    pub fn click_with(
        &self,
        page: PageContextId,
        target: NodeId,
        button: MouseButton,
        modifiers: Modifiers,
    ) -> Result<EventFlow, PlatformError> {
        let pressed_at = Instant::now();
        let event = |kind: EventKind, time_stamp: Instant| DomEvent {
            kind,
            target,
            button,
            modifiers,
            time_stamp,
        };
        self.dispatch(page, event(EventKind::PointerDown, pressed_at))?;
        self.dispatch(page, event(EventKind::MouseDown, pressed_at))?;
        self.dispatch(
            page,
            event(EventKind::Click, pressed_at + SIMULATED_CLICK_DELAY),
        )
    }

    /// `history.pushState` issued by page script outside any gesture.
    pub fn push_state_from_script(
        &self,
        page: PageContextId,
        url: &str,
    ) -> Result<HistoryOutcome, PlatformError> {
        let history = self.state.lock().page_mut(page)?.history.clone();
        let outcome = history
            .push_state(url, Instant::now())
            .map_err(|e| PlatformError::PermissionDenied(e.to_string()))?;
        if let HistoryOutcome::Applied { location } = &outcome {
            self.record(page, location.as_str(), NavigationCause::HistoryApi);
        }
        Ok(outcome)
    }

    pub fn location(&self, page: PageContextId) -> Option<Url> {
        self.state
            .lock()
            .pages
            .get(&page)
            .map(|host_page| host_page.history.location())
    }

    pub fn toolbar(&self, page: PageContextId) -> Option<ToolbarState> {
        self.state
            .lock()
            .pages
            .get(&page)
            .map(|host_page| host_page.toolbar.clone())
    }

    pub fn navigations(&self) -> Vec<NavigationRecord> {
        self.state.lock().navigations.clone()
    }

    pub fn pages(&self) -> Vec<PageContextId> {
        self.state.lock().pages.keys().copied().collect()
    }

    pub fn refuse_installs(&self, refuse: bool) {
        self.state.lock().refuse_installs = refuse;
    }

    pub fn has_interceptor(&self, page: PageContextId) -> bool {
        self.installs.is_installed(page)
    }

    pub fn interceptor_enabled(&self, page: PageContextId) -> Option<bool> {
        let state = self.state.lock();
        let interceptor = state.pages.get(&page)?.interceptor.as_ref()?;
        Some(interceptor.is_enabled())
    }

    fn record(&self, page: PageContextId, url: &str, cause: NavigationCause) {
        self.state.lock().navigations.push(NavigationRecord {
            page,
            url: url.to_string(),
            cause,
        });
    }

    fn run_listener(
        &self,
        page: PageContextId,
        action: FrameworkAction,
        document: &Document,
        history: &HistorySurface,
        event: &DomEvent,
        flow: &mut EventFlow,
    ) {
        match action {
            FrameworkAction::Swallow => {
                flow.prevent_default();
                flow.stop_propagation();
            }
            FrameworkAction::ClientRoute => {
                let Some(link) = document.closest_link(event.target) else {
                    return;
                };
                flow.prevent_default();
                match history.push_state(link.destination.as_str(), event.time_stamp) {
                    Ok(HistoryOutcome::Applied { location }) => {
                        self.record(page, location.as_str(), NavigationCause::HistoryApi);
                    }
                    Ok(outcome) => log::debug!("host: {page} route to {} {outcome:?}", link.destination),
                    Err(e) => log::debug!("host: {page} route failed: {e}"),
                }
            }
        }
    }

    fn default_action(
        &self,
        page: PageContextId,
        document: &Document,
        target: NodeId,
    ) -> Result<(), PlatformError> {
        let Some(link) = document.closest_link(target) else {
            return Ok(());
        };
        if link.kind != LinkKind::Anchor || !is_http_like(&link.destination) {
            return Ok(());
        }
        let new_page = link
            .target
            .as_deref()
            .is_some_and(|name| name.trim().eq_ignore_ascii_case("_blank"));
        if new_page {
            self.create_standalone(link.destination, NavigationCause::Created)
                .map(|_| ())
        } else {
            self.load(page, link.destination, NavigationCause::Native)
        }
    }

    /// Replace the page's document. The old interceptor goes with it.
    fn load(&self, page: PageContextId, url: Url, cause: NavigationCause) -> Result<(), PlatformError> {
        let retired = {
            let mut state = self.state.lock();
            let host_page = state.page_mut(page)?;
            host_page.document = Arc::new(Document::new(url.clone()));
            host_page.history = HistorySurface::new(url.clone());
            host_page.listeners.clear();
            let retired = host_page.interceptor.take();
            state.navigations.push(NavigationRecord {
                page,
                url: url.to_string(),
                cause,
            });
            retired
        };
        self.installs.release(page);
        drop(retired);
        log::debug!("host: {page} loaded {url} ({cause:?})");
        self.emit(HostEvent::NavigationCompleted(page));
        Ok(())
    }

    /// New page in the most recently opened window.
    fn create_standalone(&self, url: Url, cause: NavigationCause) -> Result<PageContextId, PlatformError> {
        let page = {
            let mut state = self.state.lock();
            let window = match state.windows.keys().next_back().copied() {
                Some(window) => window,
                None => {
                    let window = WindowId::new(state.allocate_id());
                    state.windows.insert(window, Vec::new());
                    window
                }
            };
            let page = state.add_page(window, url.clone())?;
            state.navigations.push(NavigationRecord {
                page,
                url: url.to_string(),
                cause,
            });
            page
        };
        self.emit(HostEvent::NavigationCompleted(page));
        Ok(page)
    }
}

impl HostPlatform for InMemoryHost {
    async fn page(&self, page: PageContextId) -> Result<PageInfo, PlatformError> {
        let mut state = self.state.lock();
        Ok(state.page_mut(page)?.info(page))
    }

    async fn pages_in_window(&self, window: WindowId) -> Result<Vec<PageInfo>, PlatformError> {
        let state = self.state.lock();
        let ids = state
            .windows
            .get(&window)
            .ok_or(PlatformError::WindowGone(window))?;
        Ok(ids
            .iter()
            .filter_map(|id| state.pages.get(id).map(|host_page| host_page.info(*id)))
            .collect())
    }

    async fn set_action_icon(&self, page: PageContextId, icon: IconSet) -> Result<(), PlatformError> {
        self.state.lock().page_mut(page)?.toolbar.icon = icon;
        Ok(())
    }

    async fn set_action_title(&self, page: PageContextId, title: &str) -> Result<(), PlatformError> {
        self.state.lock().page_mut(page)?.toolbar.title = title.to_string();
        Ok(())
    }

    async fn set_action_enabled(
        &self,
        page: PageContextId,
        enabled: bool,
    ) -> Result<(), PlatformError> {
        self.state.lock().page_mut(page)?.toolbar.enabled = enabled;
        Ok(())
    }

    async fn navigate(&self, page: PageContextId, url: &str) -> Result<(), PlatformError> {
        let url = parse_url(url)?;
        self.load(page, url, NavigationCause::Platform)
    }

    async fn create_page(&self, url: &str) -> Result<PageContextId, PlatformError> {
        let url = parse_url(url)?;
        self.create_standalone(url, NavigationCause::Created)
    }

    async fn install_interceptor(&self, page: PageContextId) -> Result<(), PlatformError> {
        let (location, history, refuse) = {
            let mut state = self.state.lock();
            let refuse = state.refuse_installs;
            let host_page = state.page_mut(page)?;
            (host_page.history.location(), host_page.history.clone(), refuse)
        };
        if !can_install_interceptor(Some(location.as_str())) {
            return Err(PlatformError::InjectionRefused(format!(
                "restricted page {location}"
            )));
        }
        if refuse {
            return Err(PlatformError::InjectionRefused(format!("{page} refused install")));
        }
        if !self.installs.try_claim(page) {
            log::debug!("host: {page} already has an interceptor");
            return Ok(());
        }

        let (interceptor, sync) =
            match NavigationInterceptor::install(page, &history, self.link.clone(), self.prefs) {
                Ok(installed) => installed,
                Err(e) => {
                    self.installs.release(page);
                    return Err(PlatformError::InjectionRefused(e.to_string()));
                }
            };
        let stored = self
            .state
            .lock()
            .pages
            .get_mut(&page)
            .map(|host_page| host_page.interceptor = Some(Arc::new(interceptor)))
            .is_some();
        if !stored {
            self.installs.release(page);
            return Err(PlatformError::PageGone(page));
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(sync.run());
            }
            Err(_) => log::debug!("host: no runtime to answer initial state for {page}"),
        }
        log::debug!("host: interceptor installed in {page}");
        Ok(())
    }

    async fn send_to_page(
        &self,
        page: PageContextId,
        message: CoordinatorMessage,
    ) -> Result<InterceptorReply, PlatformError> {
        let interceptor = {
            let mut state = self.state.lock();
            state
                .page_mut(page)?
                .interceptor
                .clone()
                .ok_or(PlatformError::NoReceiver(page))?
        };
        let exchange = protocol::encode(&message)
            .and_then(|payload| interceptor.handle_message(&payload))
            .and_then(|reply| protocol::decode(&reply));
        exchange.map_err(|e| {
            log::warn!("host: message exchange with {page} failed: {e}");
            PlatformError::NoReceiver(page)
        })
    }
}
