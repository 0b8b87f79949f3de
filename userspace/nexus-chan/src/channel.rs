// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Data channel lifecycle and request issuing
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below; tests/scenarios.rs
//!
//! State machine:
//!
//! ```text
//! Closed --open--> Opening --ok--> Open --send--> Sending --ok--> AwaitingResponse
//!   ^                 |             |                |                 |
//!   |               fail         (send err)     ChannelClosed     drop notification
//!   |                 v             v                v                 v
//!   +---close---- Closed          Open       ClosedUnexpectedly <------+
//! ```
//!
//! Every state returns to `Closed` through [`Channel::close`].

use log::{error, info, warn};
use nexus_hostcall::{ChannelBuffer, ChannelType, HostError, HostRuntime, HttpRequest};

use crate::error::ChanError;
use crate::handles::ResourceHandles;

/// Lifecycle state of the data channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// No channel handle held.
    Closed,
    /// `open_channel` in progress.
    Opening,
    /// Handle held, no exchange outstanding.
    Open,
    /// Request being handed to the host.
    Sending,
    /// Request accepted; waiting for a notification.
    AwaitingResponse,
    /// Host dropped the channel; handle still needs closing.
    ClosedUnexpectedly,
}

/// Protocol spoken on the channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelKind {
    /// Request/response exchanges.
    Http,
    /// Raw bytes to a fixed endpoint.
    Stream {
        /// Endpoint passed to `open_channel`, e.g. `b"tcp://10.0.0.2:9000"`.
        endpoint: &'static [u8],
    },
}

impl ChannelKind {
    /// Host-side discriminator.
    pub fn channel_type(self) -> ChannelType {
        match self {
            ChannelKind::Http => ChannelType::Http,
            ChannelKind::Stream { .. } => ChannelType::Stream,
        }
    }

    /// Endpoint bytes; empty for HTTP.
    pub fn endpoint(self) -> &'static [u8] {
        match self {
            ChannelKind::Http => b"",
            ChannelKind::Stream { endpoint } => endpoint,
        }
    }
}

/// Static description of the channel: protocol, tag and the buffers lent to the host.
#[derive(Clone, Copy)]
pub struct ChannelSession {
    /// Protocol.
    pub kind: ChannelKind,
    /// Correlation tag echoed in notifications.
    pub tag: u32,
    /// Host writes inbound data here.
    pub receive_buffer: &'static ChannelBuffer,
    /// Host drains outbound data from here.
    pub send_buffer: &'static ChannelBuffer,
}

/// One outbound unit of work.
#[derive(Clone, Copy, Debug)]
pub enum Outbound<'a> {
    /// HTTP request, for [`ChannelKind::Http`].
    Http(HttpRequest<'a>),
    /// Raw bytes, for [`ChannelKind::Stream`].
    Stream(&'a [u8]),
}

/// Bookkeeping for the exchange currently in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingExchange {
    /// Clock value when the host accepted the request.
    pub issued_at_us: u64,
    /// Watchdog fires once the clock passes this value.
    pub kill_at_us: u64,
}

/// The data channel and its exchange state.
pub struct Channel {
    session: ChannelSession,
    state: ChannelState,
    pending: Option<PendingExchange>,
    kill_period_us: u64,
}

impl Channel {
    /// A closed channel. `kill_period_us` bounds how long an exchange may stay outstanding.
    pub fn new(session: ChannelSession, kill_period_us: u64) -> Self {
        Self { session, state: ChannelState::Closed, pending: None, kill_period_us }
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        self.state
    }

    /// Exchange in flight, if any.
    pub fn pending(&self) -> Option<PendingExchange> {
        self.pending
    }

    /// Static channel description.
    pub fn session(&self) -> &ChannelSession {
        &self.session
    }

    /// Opens the channel. A no-op when already open.
    pub fn open<H: HostRuntime>(
        &mut self,
        handles: &mut ResourceHandles,
        host: &mut H,
    ) -> Result<(), ChanError> {
        match self.state {
            ChannelState::Open => return Ok(()),
            ChannelState::Closed => {}
            state => return Err(ChanError::Busy(state)),
        }
        self.state = ChannelState::Opening;
        match handles.open_channel(host, &self.session) {
            Ok(handle) => {
                info!("channel handle: {handle}");
                self.state = ChannelState::Open;
                Ok(())
            }
            Err(err) => {
                error!("{err}");
                self.state = ChannelState::Closed;
                Err(err)
            }
        }
    }

    /// Issues `request`, opening the channel first if it is closed.
    ///
    /// At most one implicit open happens per call. On success the exchange deadline is armed
    /// from `now_us`.
    pub fn send<H: HostRuntime>(
        &mut self,
        handles: &mut ResourceHandles,
        host: &mut H,
        request: &Outbound<'_>,
        now_us: u64,
    ) -> Result<(), ChanError> {
        if self.state == ChannelState::Closed {
            self.open(handles, host)?;
        }
        if self.state != ChannelState::Open {
            return Err(ChanError::Busy(self.state));
        }
        let channel = handles.channel();
        self.state = ChannelState::Sending;
        let outcome = match request {
            Outbound::Http(req) => host.send_http_request(channel, req),
            Outbound::Stream(bytes) => host.write_stream(channel, bytes).map(|accepted| {
                if accepted < bytes.len() {
                    warn!("stream write truncated: {accepted} of {} bytes", bytes.len());
                }
            }),
        };
        match outcome {
            Ok(()) => {
                self.state = ChannelState::AwaitingResponse;
                self.pending = Some(PendingExchange {
                    issued_at_us: now_us,
                    kill_at_us: now_us.saturating_add(self.kill_period_us),
                });
                info!("request sent on channel {channel}");
                Ok(())
            }
            Err(HostError::ChannelClosed) => {
                error!("channel {channel} already closed");
                self.state = ChannelState::ClosedUnexpectedly;
                Err(ChanError::SendFailed(HostError::ChannelClosed))
            }
            Err(status) => {
                error!("could not issue request (status: {})", status.code());
                self.state = ChannelState::Open;
                Err(ChanError::SendFailed(status))
            }
        }
    }

    /// Records that the host dropped the channel.
    pub fn mark_dropped(&mut self) {
        if self.state != ChannelState::Closed {
            self.state = ChannelState::ClosedUnexpectedly;
        }
    }

    /// True once an outstanding exchange has been waiting longer than the kill period.
    pub fn watchdog_expired(&self, now_us: u64) -> bool {
        match self.pending {
            Some(exchange) if self.state == ChannelState::AwaitingResponse => {
                now_us > exchange.kill_at_us
            }
            _ => false,
        }
    }

    /// Closes the channel and forgets any exchange. The state is `Closed` afterwards even
    /// when the host close fails; the error is fatal in that case.
    pub fn close<H: HostRuntime>(
        &mut self,
        handles: &mut ResourceHandles,
        host: &mut H,
    ) -> Result<(), ChanError> {
        let result = handles.close_channel(host);
        self.state = ChannelState::Closed;
        self.pending = None;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_hostcall::fake::FakeHost;
    use nexus_hostcall::{HttpHeader, NotificationSetup, NotificationSlot};
    use nexus_sync::SpinLock;

    const KILL_US: u64 = 15_000_000;

    fn leak_buffer() -> &'static ChannelBuffer {
        let buf: &'static SpinLock<[u8; 32]> = Box::leak(Box::new(SpinLock::new([0u8; 32])));
        buf
    }

    fn fixture(kind: ChannelKind) -> (FakeHost, ResourceHandles, Channel) {
        let mut host = FakeHost::new();
        let mut handles = ResourceHandles::new();
        let ring: &'static [NotificationSlot; 4] =
            Box::leak(Box::new([const { NotificationSlot::empty() }; 4]));
        handles
            .acquire_notification_center(&mut host, &NotificationSetup { irq: 13, buffer: ring })
            .unwrap();
        handles.acquire_network(&mut host, 1).unwrap();
        let session =
            ChannelSession { kind, tag: 3, receive_buffer: leak_buffer(), send_buffer: leak_buffer() };
        (host, handles, Channel::new(session, KILL_US))
    }

    fn get() -> Outbound<'static> {
        Outbound::Http(HttpRequest {
            method: "GET",
            url: "https://example.invalid/todos/1",
            headers: &[HttpHeader("Content-Type: application/json; charset=utf-8")],
            body: b"",
            timeout_ms: 10_000,
        })
    }

    #[test]
    fn send_opens_implicitly_and_arms_deadline() {
        let (mut host, mut handles, mut channel) = fixture(ChannelKind::Http);
        channel.send(&mut handles, &mut host, &get(), 1_000).unwrap();
        assert_eq!(channel.state(), ChannelState::AwaitingResponse);
        assert_eq!(
            channel.pending(),
            Some(PendingExchange { issued_at_us: 1_000, kill_at_us: 1_000 + KILL_US })
        );
        assert_eq!(host.calls.open_channel, 1);
        assert_eq!(host.sent[0].timeout_ms, 10_000);
    }

    #[test]
    fn open_failure_leaves_channel_closed() {
        let (mut host, mut handles, mut channel) = fixture(ChannelKind::Http);
        host.script_open(Err(HostError::Exhausted));
        let err = channel.send(&mut handles, &mut host, &get(), 0).unwrap_err();
        assert_eq!(err, ChanError::OpenRejected(HostError::Exhausted));
        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(host.calls.open_channel, 1);
        assert_eq!(host.calls.send_http_request, 0);
    }

    #[test]
    fn send_failure_keeps_channel_open() {
        let (mut host, mut handles, mut channel) = fixture(ChannelKind::Http);
        host.script_send(Err(HostError::RateLimited));
        let err = channel.send(&mut handles, &mut host, &get(), 0).unwrap_err();
        assert_eq!(err, ChanError::SendFailed(HostError::RateLimited));
        assert_eq!(channel.state(), ChannelState::Open);
        assert!(channel.pending().is_none());
    }

    #[test]
    fn second_send_while_waiting_is_busy() {
        let (mut host, mut handles, mut channel) = fixture(ChannelKind::Http);
        channel.send(&mut handles, &mut host, &get(), 0).unwrap();
        assert_eq!(
            channel.send(&mut handles, &mut host, &get(), 1),
            Err(ChanError::Busy(ChannelState::AwaitingResponse))
        );
        assert_eq!(host.sent.len(), 1);
    }

    #[test]
    fn host_closed_channel_marks_unexpected_close() {
        let (mut host, mut handles, mut channel) = fixture(ChannelKind::Http);
        channel.open(&mut handles, &mut host).unwrap();
        host.drop_channel(nexus_hostcall::closure::PEER_CLOSED);
        let err = channel.send(&mut handles, &mut host, &get(), 0).unwrap_err();
        assert_eq!(err, ChanError::SendFailed(HostError::ChannelClosed));
        assert_eq!(channel.state(), ChannelState::ClosedUnexpectedly);
        channel.close(&mut handles, &mut host).unwrap();
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(!handles.channel().is_live());
    }

    #[test]
    fn watchdog_is_strictly_after_kill_period() {
        let (mut host, mut handles, mut channel) = fixture(ChannelKind::Http);
        assert!(!channel.watchdog_expired(u64::MAX));
        channel.send(&mut handles, &mut host, &get(), 100).unwrap();
        assert!(!channel.watchdog_expired(100 + KILL_US));
        assert!(channel.watchdog_expired(101 + KILL_US));
        channel.close(&mut handles, &mut host).unwrap();
        assert!(!channel.watchdog_expired(u64::MAX));
    }

    #[test]
    fn stream_channel_writes_bytes_to_endpoint() {
        let (mut host, mut handles, mut channel) =
            fixture(ChannelKind::Stream { endpoint: b"tcp://10.0.0.2:9000" });
        channel.send(&mut handles, &mut host, &Outbound::Stream(b"ping"), 0).unwrap();
        assert_eq!(host.streamed, vec![b"ping".to_vec()]);
        assert_eq!(host.send_buffer_prefix(4), b"ping".to_vec());
        assert_eq!(channel.session().kind.channel_type(), ChannelType::Stream);
    }
}
