/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Host boundary for splitlink.
//!
//! The coordinator never talks to a browser directly. Everything it needs
//! from the host (page metadata, window enumeration, the toolbar action,
//! navigation, interceptor installation, page messaging) goes through
//! [`HostPlatform`]. Every call may fail; callers decide how much of a
//! failure to absorb.

use std::fmt;
use std::future::Future;

pub use splitlink_core::{
    CoordinatorMessage, InterceptorReply, PageContextId, PaneGroupId, WindowId,
};

/// Host-side snapshot of one page. Always re-queried, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub id: PageContextId,
    pub window: WindowId,
    pub pane_group: Option<PaneGroupId>,
    pub url: Option<String>,
}

/// Toolbar icon families. Asset selection itself belongs to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconSet {
    Disabled,
    Off,
    On,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The page was closed or never existed.
    PageGone(PageContextId),
    WindowGone(WindowId),
    /// Nothing in the page is listening for messages.
    NoReceiver(PageContextId),
    /// The host refused to install the interceptor (restricted page).
    InjectionRefused(String),
    InvalidUrl(String),
    PermissionDenied(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageGone(page) => write!(f, "{page} no longer exists"),
            Self::WindowGone(window) => write!(f, "{window} no longer exists"),
            Self::NoReceiver(page) => write!(f, "no message receiver in {page}"),
            Self::InjectionRefused(reason) => write!(f, "interceptor install refused: {reason}"),
            Self::InvalidUrl(url) => write!(f, "invalid url: {url}"),
            Self::PermissionDenied(reason) => write!(f, "permission denied: {reason}"),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Capabilities the coordinator consumes from the host browser.
///
/// Methods return `Send` futures so a coordinator can be driven from a
/// multi-threaded runtime. Implementations must not hold locks across
/// awaits that re-enter the coordinator.
pub trait HostPlatform: Send + Sync {
    fn page(
        &self,
        page: PageContextId,
    ) -> impl Future<Output = Result<PageInfo, PlatformError>> + Send;

    fn pages_in_window(
        &self,
        window: WindowId,
    ) -> impl Future<Output = Result<Vec<PageInfo>, PlatformError>> + Send;

    fn set_action_icon(
        &self,
        page: PageContextId,
        icon: IconSet,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    fn set_action_title(
        &self,
        page: PageContextId,
        title: &str,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    fn set_action_enabled(
        &self,
        page: PageContextId,
        enabled: bool,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Load `url` into an existing page, replacing its content.
    fn navigate(
        &self,
        page: PageContextId,
        url: &str,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Open `url` as a new standalone page.
    fn create_page(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<PageContextId, PlatformError>> + Send;

    /// Install the navigation interceptor. Installing into a page that
    /// already has one is a successful no-op.
    fn install_interceptor(
        &self,
        page: PageContextId,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    fn send_to_page(
        &self,
        page: PageContextId,
        message: CoordinatorMessage,
    ) -> impl Future<Output = Result<InterceptorReply, PlatformError>> + Send;
}
