/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::Arc;

use splitlink::prefs::{ActionTitles, InterceptorPrefs};
use splitlink::shell::coordinator::PaneCoordinator;
use splitlink::shell::coordinator::service::{CoordinatorService, coordinator_channels};
use splitlink::shell::host::{InMemoryHost, NavigationCause, NavigationRecord};
use splitlink::splitlink_core::{PageContextId, WindowId};

pub struct Harness {
    pub host: Arc<InMemoryHost>,
    pub service: CoordinatorService<InMemoryHost>,
    pub window: WindowId,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_prefs(InterceptorPrefs::default())
    }

    pub fn with_prefs(prefs: InterceptorPrefs) -> Self {
        let (events, link, inbox) = coordinator_channels();
        let host = Arc::new(InMemoryHost::new(link, events, prefs));
        let coordinator = PaneCoordinator::new(host.clone(), ActionTitles::default());
        let window = host.open_window();
        Self {
            host,
            service: CoordinatorService::new(coordinator, inbox),
            window,
        }
    }

    /// Run page tasks and coordinator work until both are idle.
    pub async fn settle(&mut self) {
        loop {
            tokio::task::yield_now().await;
            if self.service.drain_pending().await == 0 {
                break;
            }
        }
    }

    pub async fn open(&mut self, url: &str) -> PageContextId {
        let page = self.host.open_page(self.window, url).unwrap();
        self.settle().await;
        page
    }

    /// Two pages split together, left one active.
    pub async fn split_pair(&mut self, left: &str, right: &str) -> (PageContextId, PageContextId) {
        let a = self.host.open_page(self.window, left).unwrap();
        let b = self.host.open_page(self.window, right).unwrap();
        self.host.split(a, b).unwrap();
        self.host.activate(a).unwrap();
        self.settle().await;
        (a, b)
    }

    pub async fn press_action(&mut self, page: PageContextId) -> bool {
        let fired = self.host.click_action(page).unwrap();
        self.settle().await;
        fired
    }

    pub fn location(&self, page: PageContextId) -> String {
        self.host
            .location(page)
            .map(|url| url.to_string())
            .unwrap_or_default()
    }

    pub fn navigations_of(&self, cause: NavigationCause) -> Vec<NavigationRecord> {
        self.host
            .navigations()
            .into_iter()
            .filter(|record| record.cause == cause)
            .collect()
    }
}
