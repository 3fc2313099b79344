/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Install-once registry for page interceptors.
//!
//! The host owns the duplicate-install guard. A page id is claimed before an
//! interceptor is built and released when the page navigates away or
//! closes, so the next document in the same page can be installed into.

use std::collections::HashSet;

use parking_lot::Mutex;
use splitlink_core::PageContextId;

#[derive(Debug, Default)]
pub(crate) struct InstallRegistry {
    installed: Mutex<HashSet<PageContextId>>,
}

impl InstallRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns false when `page` already has an interceptor.
    pub(crate) fn try_claim(&self, page: PageContextId) -> bool {
        self.installed.lock().insert(page)
    }

    pub(crate) fn release(&self, page: PageContextId) -> bool {
        self.installed.lock().remove(&page)
    }

    pub(crate) fn is_installed(&self, page: PageContextId) -> bool {
        self.installed.lock().contains(&page)
    }
}
