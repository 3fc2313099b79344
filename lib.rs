/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! splitlink routes link clicks made in one pane of a split-view window into
//! the sibling pane.
//!
//! The background [`PaneCoordinator`](shell::coordinator::PaneCoordinator)
//! tracks which pages have interception armed and owns the split topology.
//! Each page runs a [`NavigationInterceptor`](shell::interceptor::NavigationInterceptor)
//! that turns qualifying user gestures into open-elsewhere requests. The two
//! only ever talk through messages.

pub mod prefs;
pub mod shell;

pub use splitlink_core;
pub use splitlink_runtime;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the stderr subscriber. `log` records are bridged into it.
#[cfg(feature = "tracing")]
pub fn init_tracing(filter: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let filter = filter.unwrap_or("info");
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|e| {
        eprintln!("splitlink: ignoring invalid log filter '{filter}': {e}");
        EnvFilter::new("info")
    });
    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        log::debug!("tracing: subscriber already installed");
    }
}

#[cfg(not(feature = "tracing"))]
pub fn init_tracing(_filter: Option<&str>) {}
