/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Host platform implementations.

mod install_registry;
pub mod memory;

pub use memory::{
    FrameworkAction, InMemoryHost, ListenerStage, NavigationCause, NavigationRecord, ToolbarState,
};
