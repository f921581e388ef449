// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types for the BLIP driver.

use thiserror::Error;

use crate::bluetooth::LinkError;

/// Errors returned by the driver.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied a value the device would reject or ignore.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation requires an active connection.
    #[error("not connected to the controller")]
    NotConnected,

    /// The BLE link failed while performing `operation`.
    #[error("transport error during {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: LinkError,
    },

    /// All connection attempts failed.
    #[error("unable to connect after {0} attempts")]
    ConnectionFailed(u32),

    /// Bytes could not be parsed as a frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

impl Error {
    /// Wrap a link failure with the operation that was attempted.
    pub fn transport(operation: &'static str, source: LinkError) -> Self {
        Self::Transport { operation, source }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedFrame(message.into())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
