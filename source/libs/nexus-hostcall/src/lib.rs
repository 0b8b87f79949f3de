// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(any(test, feature = "fake")), no_std)]
#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

//! CONTEXT: Host-runtime call boundary shared by firmware crates
//! OWNERS: @runtime
//! PUBLIC API: handle newtypes, HostError/HostResult, NotificationRecord/NotificationSlot,
//!   NetworkStatus, OpenChannelParams, HttpRequest/HttpResponseMeta, closure and wake codes,
//!   HostRuntime trait; host tests: fake::FakeHost
//! DEPENDS_ON: nexus-sync (host-lent buffers), thiserror
//! INVARIANTS: Handle value 0 is the "unallocated/closed" sentinel on every resource class;
//!   a notification slot is 16 bytes; every call returns a status synchronously and reports
//!   completion later through the notification ring
//!
//! The raw-word decoders (`check_status`, `HostError::from_code`, `NetworkStatus::from_raw`,
//! `HttpResult::from_raw`) serve a `HostRuntime` backend that issues the host calls
//! directly. No such backend lives in this workspace yet; `fake::FakeHost` produces typed
//! values and the decoders are pinned by the unit tests below.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use nexus_sync::SpinLock;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

/// Result type returned by host calls.
pub type HostResult<T> = core::result::Result<T, HostError>;

/// Raw status value the host uses for success.
pub const STATUS_OKAY: u32 = 0;

/// Non-success statuses returned by the host runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// Handle does not name a live resource.
    #[error("invalid handle")]
    InvalidHandle,
    /// Buffer pointer/size rejected (alignment or length).
    #[error("invalid buffer")]
    InvalidBuffer,
    /// A parameter block was malformed.
    #[error("invalid parameter")]
    InvalidParameter,
    /// Resource temporarily unavailable; retry later.
    #[error("unavailable")]
    Unavailable,
    /// The channel was closed underneath the caller.
    #[error("channel closed")]
    ChannelClosed,
    /// Call rate exceeded the host's budget.
    #[error("rate limited")]
    RateLimited,
    /// Call not supported on this channel type or runtime version.
    #[error("not supported")]
    NotSupported,
    /// Host-side deadline expired.
    #[error("timed out")]
    TimedOut,
    /// Host ran out of handles or buffer space.
    #[error("resources exhausted")]
    Exhausted,
    /// Status value not known to this build.
    #[error("unrecognized status {0}")]
    Unrecognized(u32),
}

impl HostError {
    /// Stable numeric code, as printed in log lines.
    pub const fn code(self) -> u32 {
        match self {
            HostError::InvalidHandle => 1,
            HostError::InvalidBuffer => 2,
            HostError::InvalidParameter => 3,
            HostError::Unavailable => 4,
            HostError::ChannelClosed => 5,
            HostError::RateLimited => 6,
            HostError::NotSupported => 7,
            HostError::TimedOut => 8,
            HostError::Exhausted => 9,
            HostError::Unrecognized(raw) => raw,
        }
    }

    /// Decodes a raw non-zero status.
    pub const fn from_code(raw: u32) -> Self {
        match raw {
            1 => HostError::InvalidHandle,
            2 => HostError::InvalidBuffer,
            3 => HostError::InvalidParameter,
            4 => HostError::Unavailable,
            5 => HostError::ChannelClosed,
            6 => HostError::RateLimited,
            7 => HostError::NotSupported,
            8 => HostError::TimedOut,
            9 => HostError::Exhausted,
            other => HostError::Unrecognized(other),
        }
    }
}

/// Maps a raw status word onto `HostResult<()>`.
pub const fn check_status(raw: u32) -> HostResult<()> {
    if raw == STATUS_OKAY {
        Ok(())
    } else {
        Err(HostError::from_code(raw))
    }
}

macro_rules! host_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Sentinel meaning "unallocated/closed".
            pub const NONE: Self = Self(0);

            /// Wraps a value issued by the host. Only host implementations mint handles.
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// Raw value, for logging and ABI marshalling.
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// True unless this is the sentinel.
            pub const fn is_live(self) -> bool {
                self.0 != 0
            }

            /// Host side of a close acknowledgment: write the sentinel back.
            pub fn invalidate(&mut self) {
                self.0 = 0;
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

host_handle!(
    /// Handle of a notification center (ring + IRQ binding).
    NotificationHandle
);
host_handle!(
    /// Handle of a requested network connection.
    NetworkHandle
);
host_handle!(
    /// Handle of an open data channel.
    ChannelHandle
);

/// Connection state reported for a network handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Host is backing off before its next connection attempt.
    DelayingConnection,
    /// Attempt in progress.
    Connecting,
    /// Usable for channels.
    Connected,
}

impl NetworkStatus {
    /// Decodes the raw status word; unknown values read as `Connecting`.
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => NetworkStatus::DelayingConnection,
            2 => NetworkStatus::Connected,
            _ => NetworkStatus::Connecting,
        }
    }
}

/// Raw event kinds the host writes into notification records.
pub mod event {
    /// Slot holds no event (zero-filled or consumed).
    pub const NONE: u32 = 0;
    /// Network connection state changed.
    pub const NETWORK_STATUS_CHANGED: u32 = 1;
    /// Channel has response data ready to read.
    pub const CHANNEL_DATA_READABLE: u32 = 2;
    /// Channel send buffer drained.
    pub const CHANNEL_DATA_WRITE_SPACE: u32 = 3;
    /// Channel lost its connection.
    pub const CHANNEL_NOT_CONNECTED: u32 = 4;
}

/// One decoded notification record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotificationRecord {
    /// Raw handle of the resource the event concerns.
    pub handle: u32,
    /// One of the [`event`] codes.
    pub event_kind: u32,
    /// Host result word attached to the event.
    pub result_code: u32,
    /// Caller-chosen correlation tag from the originating request.
    pub tag: u32,
}

/// Ring slot written by the host and read by the interrupt handler.
///
/// Layout is four little-endian words; `event_kind` is published last so a reader that sees a
/// non-zero kind also sees the rest of the record.
#[repr(C)]
pub struct NotificationSlot {
    handle: AtomicU32,
    event_kind: AtomicU32,
    result_code: AtomicU32,
    tag: AtomicU32,
}

const _: () = assert!(core::mem::size_of::<NotificationSlot>() == 16);

impl NotificationSlot {
    /// A zero-filled slot.
    pub const fn empty() -> Self {
        Self {
            handle: AtomicU32::new(0),
            event_kind: AtomicU32::new(event::NONE),
            result_code: AtomicU32::new(0),
            tag: AtomicU32::new(0),
        }
    }

    /// Host side: write a full record.
    pub fn publish(&self, record: NotificationRecord) {
        self.handle.store(record.handle, Ordering::Relaxed);
        self.result_code.store(record.result_code, Ordering::Relaxed);
        self.tag.store(record.tag, Ordering::Relaxed);
        self.event_kind.store(record.event_kind, Ordering::Release);
    }

    /// Reader side: snapshot the record.
    pub fn read(&self) -> NotificationRecord {
        let event_kind = self.event_kind.load(Ordering::Acquire);
        NotificationRecord {
            handle: self.handle.load(Ordering::Relaxed),
            event_kind,
            result_code: self.result_code.load(Ordering::Relaxed),
            tag: self.tag.load(Ordering::Relaxed),
        }
    }

    /// Marks the slot consumed so an overrun cannot replay it.
    pub fn clear_event(&self) {
        self.event_kind.store(event::NONE, Ordering::Release);
    }

    /// Zero-fills every field.
    pub fn reset(&self) {
        self.clear_event();
        self.handle.store(0, Ordering::Relaxed);
        self.result_code.store(0, Ordering::Relaxed);
        self.tag.store(0, Ordering::Relaxed);
    }
}

impl Default for NotificationSlot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Parameters for `setup_notifications`.
#[derive(Clone, Copy)]
pub struct NotificationSetup {
    /// IRQ line the host pends after writing a record.
    pub irq: u32,
    /// Ring storage; the host writes into it for as long as the center lives.
    pub buffer: &'static [NotificationSlot],
}

/// Memory lent to the host as a channel send or receive buffer.
pub type ChannelBuffer = SpinLock<[u8]>;

/// Protocol discriminator for a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelType {
    /// Structured request/response exchanges.
    Http,
    /// Raw byte stream to `endpoint`.
    Stream,
}

/// Parameters for `open_channel`.
#[derive(Clone, Copy)]
pub struct OpenChannelParams {
    /// Center that receives this channel's notifications.
    pub notification: NotificationHandle,
    /// Correlation tag echoed in every record for this channel.
    pub tag: u32,
    /// Live network the channel rides on.
    pub network: NetworkHandle,
    /// Host writes inbound bytes here.
    pub receive_buffer: &'static ChannelBuffer,
    /// Host drains outbound bytes from here.
    pub send_buffer: &'static ChannelBuffer,
    /// Protocol discriminator.
    pub channel_type: ChannelType,
    /// Stream endpoint; empty for HTTP channels.
    pub endpoint: &'static [u8],
}

/// Single raw header line, e.g. `Accept: application/json`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpHeader<'a>(pub &'a str);

/// Outbound HTTP request; passed through opaquely to the host.
#[derive(Clone, Copy, Debug)]
pub struct HttpRequest<'a> {
    /// Verb, e.g. `GET`.
    pub method: &'a str,
    /// Absolute URL.
    pub url: &'a str,
    /// Extra header lines.
    pub headers: &'a [HttpHeader<'a>],
    /// Request body.
    pub body: &'a [u8],
    /// Host-side deadline for the whole exchange.
    pub timeout_ms: u32,
}

/// Transport-level outcome of an HTTP exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpResult {
    /// Exchange completed; inspect the status code.
    Ok,
    /// Could not reach the server.
    ConnectFailed,
    /// Host deadline expired.
    TimedOut,
    /// Response exceeded the receive buffer.
    ResponseTooLarge,
    /// Any other result word.
    Other(u32),
}

impl HttpResult {
    /// Decodes the raw result word.
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => HttpResult::Ok,
            1 => HttpResult::ConnectFailed,
            2 => HttpResult::TimedOut,
            3 => HttpResult::ResponseTooLarge,
            other => HttpResult::Other(other),
        }
    }

    /// Raw result word.
    pub const fn raw(self) -> u32 {
        match self {
            HttpResult::Ok => 0,
            HttpResult::ConnectFailed => 1,
            HttpResult::TimedOut => 2,
            HttpResult::ResponseTooLarge => 3,
            HttpResult::Other(raw) => raw,
        }
    }
}

/// Response metadata read after `CHANNEL_DATA_READABLE`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpResponseMeta {
    /// Transport outcome.
    pub result: HttpResult,
    /// HTTP status code.
    pub status_code: u32,
    /// Number of response headers.
    pub header_count: u32,
    /// Body length in bytes.
    pub body_length: u32,
}

/// Raw closure reasons reported by `get_closure_reason`.
pub mod closure {
    /// Host could not attribute the closure.
    pub const UNKNOWN: u32 = 0;
    /// Server closed the connection cleanly.
    pub const PEER_CLOSED: u32 = 1;
    /// Server reset the connection.
    pub const PEER_RESET: u32 = 2;
    /// Underlying network dropped.
    pub const NETWORK_DOWN: u32 = 3;
    /// Network handle was released while the channel was open.
    pub const NETWORK_RELEASED: u32 = 4;
    /// TLS handshake failed.
    pub const TLS_HANDSHAKE_FAILED: u32 = 5;
    /// Peer sent a fatal TLS alert.
    pub const TLS_ALERT: u32 = 6;
    /// Name resolution failed.
    pub const DNS_FAILED: u32 = 7;
    /// TCP connect failed.
    pub const CONNECT_FAILED: u32 = 8;
}

/// Why the application (re)started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WakeReason(pub u32);

impl WakeReason {
    const DESCRIPTIONS: [&'static str; 17] = [
        "Cold boot or wake-up from shutdown mode",
        "Host restart requested via server",
        "Application restart requested via server",
        "Application restarted by debugger",
        "Host kernel crash",
        "Host watchdog failure",
        "Host out of memory error",
        "Unspecified host error",
        "Application crash",
        "Application updated",
        "Host updated",
        "Device option bytes updated",
        "Device woken from deep sleep due to check-in period expiration",
        "Device woken from deep sleep by application",
        "Device woken from deep sleep due to cellular modem interrupt",
        "Device woken from deep sleep due to application RTC wakeup",
        "Device woken from deep sleep: reason unclear",
    ];

    /// Human-readable description, or `None` for codes this build does not know.
    pub fn describe(self) -> Option<&'static str> {
        Self::DESCRIPTIONS.get(self.0 as usize).copied()
    }
}

/// The host-runtime syscall surface the controller consumes.
///
/// Every method is a single non-blocking call. Completion of channel work is reported later
/// through the notification ring. Close calls take the handle by reference because the host
/// acknowledges by writing the sentinel back into the caller's field.
pub trait HostRuntime {
    /// Registers a notification ring bound to `setup.irq`.
    fn setup_notifications(&mut self, setup: &NotificationSetup) -> HostResult<NotificationHandle>;

    /// Tears down a notification center.
    fn close_notifications(&mut self, handle: &mut NotificationHandle) -> HostResult<()>;

    /// Asks the host to bring up a network connection; progress is polled separately.
    fn request_network(
        &mut self,
        notification: NotificationHandle,
        tag: u32,
    ) -> HostResult<NetworkHandle>;

    /// Current state of a requested network.
    fn get_network_status(&mut self, network: NetworkHandle) -> HostResult<NetworkStatus>;

    /// Releases a network handle.
    fn release_network(&mut self, network: &mut NetworkHandle) -> HostResult<()>;

    /// Opens a data channel over a live network.
    fn open_channel(&mut self, params: &OpenChannelParams) -> HostResult<ChannelHandle>;

    /// Closes a data channel.
    fn close_channel(&mut self, channel: &mut ChannelHandle) -> HostResult<()>;

    /// Issues a request on an HTTP channel.
    fn send_http_request(
        &mut self,
        channel: ChannelHandle,
        request: &HttpRequest<'_>,
    ) -> HostResult<()>;

    /// Queues bytes on a stream channel, returning how many were accepted.
    fn write_stream(&mut self, channel: ChannelHandle, bytes: &[u8]) -> HostResult<usize>;

    /// Reads metadata for the response currently held by `channel`.
    fn read_response_metadata(&mut self, channel: ChannelHandle) -> HostResult<HttpResponseMeta>;

    /// Copies `buf.len()` body bytes starting at `offset`.
    fn read_response_body(
        &mut self,
        channel: ChannelHandle,
        offset: u32,
        buf: &mut [u8],
    ) -> HostResult<()>;

    /// Raw [`closure`] code for a channel that reported `CHANNEL_NOT_CONNECTED`.
    fn get_closure_reason(&mut self, channel: ChannelHandle) -> HostResult<u32>;

    /// Monotonic microsecond clock.
    fn get_microseconds(&mut self) -> HostResult<u64>;

    /// Why the application last started.
    fn get_wake_reason(&mut self) -> HostResult<WakeReason>;

    /// Writes the device identifier into `buf`, returning its length.
    fn get_device_id(&mut self, buf: &mut [u8]) -> HostResult<usize>;
}

impl<H: HostRuntime + ?Sized> HostRuntime for &mut H {
    fn setup_notifications(&mut self, setup: &NotificationSetup) -> HostResult<NotificationHandle> {
        (**self).setup_notifications(setup)
    }

    fn close_notifications(&mut self, handle: &mut NotificationHandle) -> HostResult<()> {
        (**self).close_notifications(handle)
    }

    fn request_network(
        &mut self,
        notification: NotificationHandle,
        tag: u32,
    ) -> HostResult<NetworkHandle> {
        (**self).request_network(notification, tag)
    }

    fn get_network_status(&mut self, network: NetworkHandle) -> HostResult<NetworkStatus> {
        (**self).get_network_status(network)
    }

    fn release_network(&mut self, network: &mut NetworkHandle) -> HostResult<()> {
        (**self).release_network(network)
    }

    fn open_channel(&mut self, params: &OpenChannelParams) -> HostResult<ChannelHandle> {
        (**self).open_channel(params)
    }

    fn close_channel(&mut self, channel: &mut ChannelHandle) -> HostResult<()> {
        (**self).close_channel(channel)
    }

    fn send_http_request(
        &mut self,
        channel: ChannelHandle,
        request: &HttpRequest<'_>,
    ) -> HostResult<()> {
        (**self).send_http_request(channel, request)
    }

    fn write_stream(&mut self, channel: ChannelHandle, bytes: &[u8]) -> HostResult<usize> {
        (**self).write_stream(channel, bytes)
    }

    fn read_response_metadata(&mut self, channel: ChannelHandle) -> HostResult<HttpResponseMeta> {
        (**self).read_response_metadata(channel)
    }

    fn read_response_body(
        &mut self,
        channel: ChannelHandle,
        offset: u32,
        buf: &mut [u8],
    ) -> HostResult<()> {
        (**self).read_response_body(channel, offset, buf)
    }

    fn get_closure_reason(&mut self, channel: ChannelHandle) -> HostResult<u32> {
        (**self).get_closure_reason(channel)
    }

    fn get_microseconds(&mut self) -> HostResult<u64> {
        (**self).get_microseconds()
    }

    fn get_wake_reason(&mut self) -> HostResult<WakeReason> {
        (**self).get_wake_reason()
    }

    fn get_device_id(&mut self, buf: &mut [u8]) -> HostResult<usize> {
        (**self).get_device_id(buf)
    }
}
