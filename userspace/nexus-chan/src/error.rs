// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the channel controller.
//!
//! Errors fall into two groups. Setup and handle-integrity failures are fatal: the firmware
//! halts rather than run with a leaked or unknown resource. Everything else is recoverable and
//! the main loop carries on with the next period.

use core::fmt;

use nexus_hostcall::{HostError, HttpResult};
use thiserror::Error;

use crate::channel::ChannelState;
use crate::response::ClosureClass;

/// Host resource classes tracked by [`crate::ResourceHandles`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceClass {
    /// Notification center (ring + IRQ binding).
    NotificationCenter,
    /// Network connection.
    Network,
    /// Data channel.
    Channel,
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceClass::NotificationCenter => "notification center",
            ResourceClass::Network => "network",
            ResourceClass::Channel => "channel",
        })
    }
}

/// Errors reported by the controller and its components.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChanError {
    /// Initial acquisition of a notification center or network failed.
    #[error("{resource} setup failed: {status} (code {})", .status.code())]
    SetupFatal {
        /// Resource being acquired.
        resource: ResourceClass,
        /// Host status.
        status: HostError,
    },
    /// A second handle of a class was requested while one is live.
    #[error("{0} handle already live")]
    HandleInUse(ResourceClass),
    /// Host reported success on close but left the handle non-zero.
    #[error("{resource} handle {raw} not zeroed after close")]
    ResidualHandle {
        /// Resource being closed.
        resource: ResourceClass,
        /// Value left behind.
        raw: u32,
    },
    /// Host refused a close.
    #[error("{resource} close rejected: {status}")]
    CloseRejected {
        /// Resource being closed.
        resource: ResourceClass,
        /// Host status.
        status: HostError,
    },
    /// Network never reached `Connected` within the connect policy.
    #[error("network not connected after {waited_us} us")]
    NetworkUnavailable {
        /// Time spent waiting.
        waited_us: u64,
    },
    /// Channel operation without a live network.
    #[error("no network handle")]
    NoNetwork,
    /// Channel open rejected.
    #[error("could not open channel: {0}")]
    OpenRejected(HostError),
    /// Operation not valid in the channel's current state.
    #[error("channel busy ({0:?})")]
    Busy(ChannelState),
    /// Request could not be issued.
    #[error("could not issue request: {0}")]
    SendFailed(HostError),
    /// Response metadata could not be read.
    #[error("response data read failed: {0}")]
    MetadataReadFailed(HostError),
    /// Transport-level failure reported in the response metadata.
    #[error("HTTP request failed (result {})", .0.raw())]
    RequestFailed(HttpResult),
    /// Status code other than 200 or 404.
    #[error("unexpected HTTP status code: {0}")]
    UnexpectedStatus(u32),
    /// Response body could not be copied out.
    #[error("response body read failed: {0}")]
    BodyReadFailed(HostError),
    /// The host dropped the channel.
    #[error("channel closed unexpectedly: {reason}")]
    ClosedUnexpectedly {
        /// Classified closure reason.
        reason: ClosureClass,
    },
}

impl ChanError {
    /// Fatal errors halt the firmware; the rest are logged and the loop continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChanError::SetupFatal { .. }
                | ChanError::HandleInUse(_)
                | ChanError::ResidualHandle { .. }
                | ChanError::CloseRejected { .. }
                | ChanError::NetworkUnavailable { .. }
        )
    }
}
