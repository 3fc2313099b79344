/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Portable identity and wire protocol for splitlink.
//!
//! Everything in here is shared by the background coordinator and the
//! per-page interceptor. Neither side holds references into the other; they
//! only exchange the identifiers and messages defined in this crate.

pub mod ids;
pub mod protocol;
pub mod scheme;

pub use ids::{PageContextId, PaneGroupId, WindowId};
pub use protocol::{
    CoordinatorMessage, CoordinatorReply, InterceptorReply, InterceptorRequest, ProtocolError,
};
pub use scheme::{RESTRICTED_SCHEME_PREFIXES, can_install_interceptor, is_http_like};
