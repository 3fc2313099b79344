/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Messages exchanged between the coordinator and page interceptors.
//!
//! Each message crosses a page-context boundary as JSON with a `type` tag,
//! e.g. `{"type":"UPDATE_STATE","enabled":true}`. Replies are untagged and
//! are told apart by their single field.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Coordinator → interceptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorMessage {
    UpdateState { enabled: bool },
}

/// Interceptor → coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterceptorRequest {
    /// Sent once when the interceptor is installed.
    CheckEnabled,
    OpenInOtherSplit { url: String },
}

/// Coordinator reply to an [`InterceptorRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinatorReply {
    Enabled { enabled: bool },
    Ack { success: bool },
}

/// Interceptor reply to a [`CoordinatorMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptorReply {
    pub success: bool,
}

impl InterceptorReply {
    pub const ACK: Self = Self { success: true };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    Encode(String),
    Decode(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "message encode failed: {e}"),
            Self::Decode(e) => write!(f, "message decode failed: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

pub fn encode<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(|e| ProtocolError::Encode(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, ProtocolError> {
    serde_json::from_str(raw).map_err(|e| ProtocolError::Decode(e.to_string()))
}
