/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Page history surface with patchable `pushState` / `replaceState`.
//!
//! A wrapper installed with [`HistorySurface::patch`] sees every call before
//! the original mutation runs and may redirect or suppress it. Patching is
//! scoped: dropping the returned [`HistoryPatchGuard`] restores the original
//! entry points.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMethod {
    PushState,
    ReplaceState,
}

impl HistoryMethod {
    pub fn name(self) -> &'static str {
        match self {
            Self::PushState => "pushState",
            Self::ReplaceState => "replaceState",
        }
    }
}

/// A history mutation as seen by the wrapper, target already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryCall {
    pub method: HistoryMethod,
    pub target: Url,
    pub current: Url,
    pub issued_at: Instant,
}

impl HistoryCall {
    /// Same origin as the current location but a different path.
    pub fn is_same_origin_route_change(&self) -> bool {
        self.target.origin() == self.current.origin() && self.target.path() != self.current.path()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryVerdict {
    /// Run the original mutation unmodified.
    Proceed,
    /// The navigation was sent elsewhere; skip the mutation.
    Redirect,
    /// Skip the mutation without sending anything.
    Suppress,
}

pub trait HistoryWrapper: Send + Sync {
    fn intercept(&self, call: &HistoryCall) -> HistoryVerdict;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOutcome {
    Applied { location: Url },
    Redirected { url: Url },
    Suppressed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    InvalidUrl(String),
    /// History cannot move a document to another origin.
    CrossOrigin { from: String, to: String },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(url) => write!(f, "invalid history url: {url}"),
            Self::CrossOrigin { from, to } => {
                write!(f, "history mutation from {from} to {to} crosses origins")
            }
        }
    }
}

impl std::error::Error for HistoryError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPatchError {
    AlreadyPatched,
}

impl fmt::Display for HistoryPatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyPatched => write!(f, "history entry points are already patched"),
        }
    }
}

impl std::error::Error for HistoryPatchError {}

struct HistoryInner {
    location: Url,
    entries: Vec<Url>,
    wrapper: Option<Arc<dyn HistoryWrapper>>,
}

#[derive(Clone)]
pub struct HistorySurface {
    inner: Arc<Mutex<HistoryInner>>,
}

impl fmt::Debug for HistorySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("HistorySurface")
            .field("location", &inner.location.as_str())
            .field("entries", &inner.entries.len())
            .field("patched", &inner.wrapper.is_some())
            .finish()
    }
}

impl HistorySurface {
    pub fn new(location: Url) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HistoryInner {
                entries: vec![location.clone()],
                location,
                wrapper: None,
            })),
        }
    }

    pub fn location(&self) -> Url {
        self.inner.lock().location.clone()
    }

    /// Session history entries, the current one included.
    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_patched(&self) -> bool {
        self.inner.lock().wrapper.is_some()
    }

    pub fn push_state(&self, url: &str, issued_at: Instant) -> Result<HistoryOutcome, HistoryError> {
        self.mutate(HistoryMethod::PushState, url, issued_at)
    }

    pub fn replace_state(
        &self,
        url: &str,
        issued_at: Instant,
    ) -> Result<HistoryOutcome, HistoryError> {
        self.mutate(HistoryMethod::ReplaceState, url, issued_at)
    }

    /// Route both entry points through `wrapper` until the guard drops.
    pub fn patch(
        &self,
        wrapper: Arc<dyn HistoryWrapper>,
    ) -> Result<HistoryPatchGuard, HistoryPatchError> {
        let mut inner = self.inner.lock();
        if inner.wrapper.is_some() {
            return Err(HistoryPatchError::AlreadyPatched);
        }
        inner.wrapper = Some(wrapper);
        Ok(HistoryPatchGuard {
            surface: Arc::downgrade(&self.inner),
        })
    }

    fn mutate(
        &self,
        method: HistoryMethod,
        url: &str,
        issued_at: Instant,
    ) -> Result<HistoryOutcome, HistoryError> {
        let (call, wrapper) = {
            let inner = self.inner.lock();
            let target = inner
                .location
                .join(url)
                .map_err(|_| HistoryError::InvalidUrl(url.to_string()))?;
            let call = HistoryCall {
                method,
                target,
                current: inner.location.clone(),
                issued_at,
            };
            (call, inner.wrapper.clone())
        };

        // The wrapper may message out of the page; never hold the lock for it.
        if let Some(wrapper) = wrapper {
            match wrapper.intercept(&call) {
                HistoryVerdict::Proceed => {}
                HistoryVerdict::Redirect => {
                    return Ok(HistoryOutcome::Redirected { url: call.target });
                }
                HistoryVerdict::Suppress => return Ok(HistoryOutcome::Suppressed),
            }
        }

        self.apply_original(call)
    }

    fn apply_original(&self, call: HistoryCall) -> Result<HistoryOutcome, HistoryError> {
        let mut inner = self.inner.lock();
        if call.target.origin() != inner.location.origin() {
            return Err(HistoryError::CrossOrigin {
                from: inner.location.origin().ascii_serialization(),
                to: call.target.origin().ascii_serialization(),
            });
        }
        match call.method {
            HistoryMethod::PushState => inner.entries.push(call.target.clone()),
            HistoryMethod::ReplaceState => match inner.entries.last_mut() {
                Some(last) => *last = call.target.clone(),
                None => inner.entries.push(call.target.clone()),
            },
        }
        inner.location = call.target;
        Ok(HistoryOutcome::Applied {
            location: inner.location.clone(),
        })
    }
}

/// Restores the unwrapped entry points on drop.
#[must_use = "dropping the guard immediately unpatches history"]
pub struct HistoryPatchGuard {
    surface: Weak<Mutex<HistoryInner>>,
}

impl fmt::Debug for HistoryPatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryPatchGuard")
            .field("live", &(self.surface.strong_count() > 0))
            .finish()
    }
}

impl Drop for HistoryPatchGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.surface.upgrade() {
            inner.lock().wrapper = None;
        }
    }
}
