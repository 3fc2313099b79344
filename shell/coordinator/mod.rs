/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Background pane coordinator.
//!
//! Owns the per-page interception flags and answers every question about
//! split topology by asking the host again. Nothing about pane groups is
//! cached between calls. All host failures are absorbed here: a page that
//! cannot be queried is treated as not split, a push that cannot be
//! delivered is retried once after installing the interceptor and then
//! dropped.

pub mod service;
pub mod toolbar;

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use splitlink_core::{
    CoordinatorMessage, PageContextId, PaneGroupId, WindowId, can_install_interceptor,
};
use splitlink_runtime::{HostPlatform, PlatformError};

use crate::prefs::ActionTitles;
use crate::shell::runtime::diagnostics::{self, DiagnosticEvent, emit_event};

use self::toolbar::{ActionPresentation, SplitState};

fn emit_sent(channel_id: &'static str, byte_len: usize) {
    emit_event(DiagnosticEvent::MessageSent {
        channel_id,
        byte_len,
    });
}

/// Live view of the split a page belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneGroup {
    pub id: PaneGroupId,
    pub window: WindowId,
    /// At most two pages, in host order.
    pub members: Vec<PageContextId>,
}

impl PaneGroup {
    pub fn sibling_of(&self, page: PageContextId) -> Option<PageContextId> {
        if self.members.len() < 2 {
            return None;
        }
        self.members.iter().copied().find(|member| *member != page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Delivered,
    DeliveredAfterInstall,
    SkippedRestricted,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    NavigatedSibling(PageContextId),
    CreatedPage(PageContextId),
    Failed,
}

pub struct PaneCoordinator<P: HostPlatform> {
    platform: Arc<P>,
    interception: HashMap<PageContextId, bool>,
    titles: ActionTitles,
}

impl<P: HostPlatform> PaneCoordinator<P> {
    pub fn new(platform: Arc<P>, titles: ActionTitles) -> Self {
        Self {
            platform,
            interception: HashMap::new(),
            titles,
        }
    }

    /// Absent entries read as disabled.
    pub fn is_enabled(&self, page: PageContextId) -> bool {
        self.interception.get(&page).copied().unwrap_or(false)
    }

    pub fn has_state(&self, page: PageContextId) -> bool {
        self.interception.contains_key(&page)
    }

    pub fn tracked_pages(&self) -> usize {
        self.interception.len()
    }

    pub async fn resolve_pane_group(&self, page: PageContextId) -> Option<PaneGroup> {
        let info = match self.platform.page(page).await {
            Ok(info) => info,
            Err(e) => {
                debug!("coordinator: {page} lookup failed: {e}");
                return None;
            }
        };
        let id = info.pane_group?;
        let pages = match self.platform.pages_in_window(info.window).await {
            Ok(pages) => pages,
            Err(e) => {
                debug!("coordinator: {} enumeration failed: {e}", info.window);
                return None;
            }
        };
        let members = pages
            .into_iter()
            .filter(|candidate| candidate.pane_group == Some(id))
            .map(|candidate| candidate.id)
            .take(2)
            .collect();
        Some(PaneGroup {
            id,
            window: info.window,
            members,
        })
    }

    pub async fn get_sibling(&self, page: PageContextId) -> Option<PageContextId> {
        self.resolve_pane_group(page).await?.sibling_of(page)
    }

    pub async fn split_state(&self, page: PageContextId) -> SplitState {
        match self.resolve_pane_group(page).await {
            Some(_) => SplitState::split(self.is_enabled(page)),
            None => SplitState::NotSplit,
        }
    }

    pub async fn set_interception(&mut self, page: PageContextId, enabled: bool) -> PushOutcome {
        self.interception.insert(page, enabled);
        self.push_state(page, enabled).await
    }

    /// Deliver UPDATE_STATE, installing the interceptor once if nothing in
    /// the page is listening.
    async fn push_state(&self, page: PageContextId, enabled: bool) -> PushOutcome {
        let url = match self.platform.page(page).await {
            Ok(info) => info.url,
            Err(e) => {
                debug!("coordinator: {page} gone before push: {e}");
                return PushOutcome::Dropped;
            }
        };
        if !can_install_interceptor(url.as_deref()) {
            debug!("coordinator: {page} is restricted ({url:?}); not pushing");
            emit_sent(diagnostics::CHANNEL_PUSH_SKIPPED_RESTRICTED, 0);
            return PushOutcome::SkippedRestricted;
        }

        let message = CoordinatorMessage::UpdateState { enabled };
        match self.platform.send_to_page(page, message.clone()).await {
            Ok(_) => {
                emit_sent(diagnostics::CHANNEL_PUSH_DELIVERED, 1);
                return PushOutcome::Delivered;
            }
            Err(e) => debug!("coordinator: push to {page} failed ({e}); installing"),
        }

        emit_sent(diagnostics::CHANNEL_PUSH_INSTALL_RETRY, 1);
        if let Err(e) = self.platform.install_interceptor(page).await {
            debug!("coordinator: install into {page} failed: {e}");
            emit_sent(diagnostics::CHANNEL_PUSH_DROPPED, 1);
            return PushOutcome::Dropped;
        }
        match self.platform.send_to_page(page, message).await {
            Ok(_) => {
                emit_sent(diagnostics::CHANNEL_PUSH_DELIVERED, 1);
                PushOutcome::DeliveredAfterInstall
            }
            Err(e) => {
                debug!("coordinator: retried push to {page} failed: {e}");
                emit_sent(diagnostics::CHANNEL_PUSH_DROPPED, 1);
                PushOutcome::Dropped
            }
        }
    }

    async fn present(&self, page: PageContextId, state: SplitState) -> Result<(), PlatformError> {
        let presentation = ActionPresentation::for_state(state, &self.titles);
        self.platform.set_action_icon(page, presentation.icon).await?;
        self.platform.set_action_title(page, &presentation.title).await?;
        self.platform
            .set_action_enabled(page, presentation.enabled)
            .await
    }

    /// Bring the toolbar and the interceptor in line with the page's
    /// current split membership. Safe to call repeatedly.
    pub async fn refresh_ui(&mut self, page: PageContextId) -> SplitState {
        if self.resolve_pane_group(page).await.is_none() {
            let was_enabled = self.interception.remove(&page).unwrap_or(false);
            if let Err(e) = self.present(page, SplitState::NotSplit).await {
                debug!("coordinator: toolbar update for {page} failed: {e}");
            }
            if was_enabled {
                self.retract(page).await;
            }
            return SplitState::NotSplit;
        }

        let enabled = self.is_enabled(page);
        let state = SplitState::split(enabled);
        if let Err(e) = self.present(page, state).await {
            debug!("coordinator: toolbar update for {page} failed: {e}");
        }
        self.push_state(page, enabled).await;
        state
    }

    /// Tell an interceptor that is already listening to stand down. Never
    /// installs one.
    async fn retract(&self, page: PageContextId) {
        let message = CoordinatorMessage::UpdateState { enabled: false };
        if let Err(e) = self.platform.send_to_page(page, message).await {
            debug!("coordinator: {page} left its split with no listener: {e}");
        }
    }

    /// Flip the page's flag and copy the result to its sibling. `None` when
    /// the page is not split.
    pub async fn toggle(&mut self, page: PageContextId) -> Option<bool> {
        let group = self.resolve_pane_group(page).await?;
        let enabled = !self.is_enabled(page);
        emit_sent(diagnostics::CHANNEL_TOGGLE, 1);
        debug!("coordinator: {page} toggled to {enabled} in {}", group.id);

        self.interception.insert(page, enabled);
        self.refresh_ui(page).await;
        if let Some(sibling) = group.sibling_of(page) {
            self.interception.insert(sibling, enabled);
            self.refresh_ui(sibling).await;
        }
        Some(enabled)
    }

    /// Load `url` into the source's sibling, or into one new page when
    /// there is no sibling or it cannot be navigated.
    pub async fn open_elsewhere(&self, source: PageContextId, url: &str) -> OpenOutcome {
        if let Some(sibling) = self.get_sibling(source).await {
            match self.platform.navigate(sibling, url).await {
                Ok(()) => {
                    emit_sent(diagnostics::CHANNEL_OPEN_SIBLING, url.len());
                    return OpenOutcome::NavigatedSibling(sibling);
                }
                Err(e) => warn!("coordinator: navigating {sibling} to {url} failed: {e}"),
            }
        }
        match self.platform.create_page(url).await {
            Ok(page) => {
                emit_sent(diagnostics::CHANNEL_OPEN_NEW_PAGE, url.len());
                OpenOutcome::CreatedPage(page)
            }
            Err(e) => {
                warn!("coordinator: opening {url} in a new page failed: {e}");
                OpenOutcome::Failed
            }
        }
    }

    /// Toolbar click. Not split: nothing happens.
    pub async fn on_action_clicked(&mut self, page: PageContextId) -> Option<bool> {
        self.toggle(page).await
    }

    pub async fn on_page_activated(&mut self, page: PageContextId) -> SplitState {
        self.refresh_ui(page).await
    }

    pub async fn on_navigation_completed(&mut self, page: PageContextId) -> SplitState {
        self.refresh_ui(page).await
    }

    /// The host moved the page into, out of, or between pane groups.
    pub async fn on_split_changed(&mut self, page: PageContextId) -> SplitState {
        self.refresh_ui(page).await
    }

    pub fn on_page_closed(&mut self, page: PageContextId) {
        if self.interception.remove(&page).is_some() {
            debug!("coordinator: dropped state for closed {page}");
        }
    }
}
