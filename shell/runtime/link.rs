/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Page → coordinator message path.
//!
//! Requests leave the page as JSON so nothing but bytes crosses the context
//! boundary. Each one carries a oneshot for the reply; pages that do not
//! care about the reply simply drop the receiver.

use std::time::Instant;

use splitlink_core::protocol::{self, ProtocolError};
use splitlink_core::{CoordinatorReply, InterceptorRequest, PageContextId};
use tokio::sync::{mpsc, oneshot};

pub type PageRequestReceiver = mpsc::UnboundedReceiver<PageEnvelope>;

#[derive(Debug)]
pub struct PageEnvelope {
    pub source: PageContextId,
    pub payload: String,
    pub sent_at: Instant,
    pub reply: oneshot::Sender<CoordinatorReply>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    Encode(ProtocolError),
    /// The coordinator side has gone away.
    Disconnected,
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "{e}"),
            Self::Disconnected => write!(f, "coordinator link disconnected"),
        }
    }
}

impl std::error::Error for LinkError {}

/// Sending half handed to every installed interceptor.
#[derive(Debug, Clone)]
pub struct CoordinatorLink {
    tx: mpsc::UnboundedSender<PageEnvelope>,
}

impl CoordinatorLink {
    pub fn channel() -> (Self, PageRequestReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(
        &self,
        source: PageContextId,
        request: &InterceptorRequest,
    ) -> Result<oneshot::Receiver<CoordinatorReply>, LinkError> {
        let payload = protocol::encode(request).map_err(LinkError::Encode)?;
        self.send_raw(source, payload)
    }

    /// Send an already-encoded payload. The coordinator validates it.
    pub fn send_raw(
        &self,
        source: PageContextId,
        payload: String,
    ) -> Result<oneshot::Receiver<CoordinatorReply>, LinkError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(PageEnvelope {
                source,
                payload,
                sent_at: Instant::now(),
                reply,
            })
            .map_err(|_| LinkError::Disconnected)?;
        Ok(reply_rx)
    }
}
