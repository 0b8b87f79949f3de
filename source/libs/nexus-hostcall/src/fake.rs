// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Deterministic scripted host runtime for controller tests (host-first)
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below; exercised by nexus-chan and http-poller test suites
//!
//! Every call pops its outcome from a per-call script; an empty script means success.
//! The clock advances by `clock_step_us` on each read. Notifications are written into the
//! registered ring round-robin and latch `irq_pending` the way the interrupt controller would.

use std::collections::VecDeque;

use crate::{
    event, ChannelBuffer, ChannelHandle, HostError, HostResult, HostRuntime, HttpRequest,
    HttpResponseMeta, HttpResult, NetworkHandle, NetworkStatus, NotificationHandle,
    NotificationRecord, NotificationSetup, NotificationSlot, OpenChannelParams, WakeReason,
};

/// Per-call invocation counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `setup_notifications`
    pub setup_notifications: usize,
    /// `close_notifications`
    pub close_notifications: usize,
    /// `request_network`
    pub request_network: usize,
    /// `get_network_status`
    pub network_status: usize,
    /// `release_network`
    pub release_network: usize,
    /// `open_channel`
    pub open_channel: usize,
    /// `close_channel`
    pub close_channel: usize,
    /// `send_http_request`
    pub send_http_request: usize,
    /// `write_stream`
    pub write_stream: usize,
    /// `read_response_metadata`
    pub read_metadata: usize,
    /// `read_response_body`
    pub read_body: usize,
    /// `get_closure_reason`
    pub closure_reason: usize,
}

/// High-water marks of simultaneously live handles per resource class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LivePeaks {
    /// Notification centers.
    pub notification: usize,
    /// Networks.
    pub network: usize,
    /// Channels.
    pub channel: usize,
}

/// A request captured from `send_http_request`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentRequest {
    /// Channel the request went out on.
    pub channel: ChannelHandle,
    /// Verb.
    pub method: String,
    /// URL.
    pub url: String,
    /// Header lines.
    pub headers: Vec<String>,
    /// Body bytes.
    pub body: Vec<u8>,
    /// Timeout passed through.
    pub timeout_ms: u32,
}

/// Canned HTTP response served by the fake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CannedResponse {
    /// Transport result.
    pub result: HttpResult,
    /// HTTP status.
    pub status_code: u32,
    /// Header count to report.
    pub header_count: u32,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl CannedResponse {
    /// A `200` response carrying `body`.
    pub fn ok(body: &[u8]) -> Self {
        Self { result: HttpResult::Ok, status_code: 200, header_count: 0, body: body.to_vec() }
    }

    /// A bodiless response with `status_code`.
    pub fn status(status_code: u32) -> Self {
        Self { result: HttpResult::Ok, status_code, header_count: 0, body: Vec::new() }
    }

    fn meta(&self) -> HttpResponseMeta {
        HttpResponseMeta {
            result: self.result,
            status_code: self.status_code,
            header_count: self.header_count,
            body_length: self.body.len() as u32,
        }
    }
}

/// Scripted host runtime.
pub struct FakeHost {
    next_handle: u32,
    now_us: u64,
    /// Microseconds added to the clock after each read.
    pub clock_step_us: u64,
    clock_failures: usize,

    ring: Option<&'static [NotificationSlot]>,
    ring_write: usize,
    irq_pending: bool,

    notification: Option<NotificationHandle>,
    networks: Vec<NetworkHandle>,
    channels: Vec<ChannelHandle>,
    channel_tags: Vec<(ChannelHandle, u32)>,
    send_buffer: Option<&'static ChannelBuffer>,
    peer_closed: Vec<ChannelHandle>,

    setup_script: VecDeque<HostResult<()>>,
    network_script: VecDeque<HostResult<()>>,
    status_script: VecDeque<HostResult<NetworkStatus>>,
    open_script: VecDeque<HostResult<()>>,
    send_script: VecDeque<HostResult<()>>,
    metadata_script: VecDeque<HostResult<()>>,
    body_script: VecDeque<HostResult<()>>,
    closure_script: VecDeque<HostResult<u32>>,
    close_script: VecDeque<HostResult<()>>,

    /// When set, channel closes report success but leave the handle non-zero.
    pub leak_channel_on_close: bool,
    /// Served (and signalled) after every accepted HTTP request when set.
    pub auto_respond: Option<CannedResponse>,
    staged: Option<CannedResponse>,

    /// Call counters.
    pub calls: CallCounts,
    /// Live-handle high-water marks.
    pub peaks: LivePeaks,
    /// Requests captured from `send_http_request`.
    pub sent: Vec<SentRequest>,
    /// Byte chunks captured from `write_stream`.
    pub streamed: Vec<Vec<u8>>,
    /// Value returned by `get_wake_reason`.
    pub wake_reason: WakeReason,
    /// Value written by `get_device_id`.
    pub device_id: String,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHost {
    /// A host where every call succeeds and the network is immediately connected.
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            now_us: 0,
            clock_step_us: 0,
            clock_failures: 0,
            ring: None,
            ring_write: 0,
            irq_pending: false,
            notification: None,
            networks: Vec::new(),
            channels: Vec::new(),
            channel_tags: Vec::new(),
            send_buffer: None,
            peer_closed: Vec::new(),
            setup_script: VecDeque::new(),
            network_script: VecDeque::new(),
            status_script: VecDeque::new(),
            open_script: VecDeque::new(),
            send_script: VecDeque::new(),
            metadata_script: VecDeque::new(),
            body_script: VecDeque::new(),
            closure_script: VecDeque::new(),
            close_script: VecDeque::new(),
            leak_channel_on_close: false,
            auto_respond: None,
            staged: None,
            calls: CallCounts::default(),
            peaks: LivePeaks::default(),
            sent: Vec::new(),
            streamed: Vec::new(),
            wake_reason: WakeReason(0),
            device_id: String::from("UV11223344556677889900"),
        }
    }

    /// Sets the clock to `now_us`.
    pub fn set_time(&mut self, now_us: u64) {
        self.now_us = now_us;
    }

    /// Moves the clock forward.
    pub fn advance(&mut self, micros: u64) {
        self.now_us = self.now_us.saturating_add(micros);
    }

    /// Current clock value without advancing it.
    pub fn now(&self) -> u64 {
        self.now_us
    }

    /// Fails the next `count` clock reads.
    pub fn fail_clock_reads(&mut self, count: usize) {
        self.clock_failures = count;
    }

    /// Scripts the next `setup_notifications` outcome.
    pub fn script_setup(&mut self, outcome: HostResult<()>) {
        self.setup_script.push_back(outcome);
    }

    /// Scripts the next `request_network` outcome.
    pub fn script_network_request(&mut self, outcome: HostResult<()>) {
        self.network_script.push_back(outcome);
    }

    /// Scripts the next `get_network_status` answer. Once drained, status reads `Connected`.
    pub fn script_network_status(&mut self, outcome: HostResult<NetworkStatus>) {
        self.status_script.push_back(outcome);
    }

    /// Scripts the next `open_channel` outcome.
    pub fn script_open(&mut self, outcome: HostResult<()>) {
        self.open_script.push_back(outcome);
    }

    /// Scripts the next `send_http_request`/`write_stream` outcome.
    pub fn script_send(&mut self, outcome: HostResult<()>) {
        self.send_script.push_back(outcome);
    }

    /// Scripts the next `read_response_metadata` outcome.
    pub fn script_metadata(&mut self, outcome: HostResult<()>) {
        self.metadata_script.push_back(outcome);
    }

    /// Scripts the next `read_response_body` outcome.
    pub fn script_body(&mut self, outcome: HostResult<()>) {
        self.body_script.push_back(outcome);
    }

    /// Scripts the next `get_closure_reason` answer.
    pub fn script_closure_reason(&mut self, outcome: HostResult<u32>) {
        self.closure_script.push_back(outcome);
    }

    /// Scripts the next `close_channel` outcome.
    pub fn script_close(&mut self, outcome: HostResult<()>) {
        self.close_script.push_back(outcome);
    }

    /// Makes `response` the data held by the open channel.
    pub fn stage_response(&mut self, response: CannedResponse) {
        self.staged = Some(response);
    }

    /// Raw value of the live channel, if any.
    pub fn live_channel(&self) -> Option<ChannelHandle> {
        self.channels.last().copied()
    }

    /// Number of channels currently open on the host side.
    pub fn live_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of networks currently held on the host side.
    pub fn live_networks(&self) -> usize {
        self.networks.len()
    }

    /// True while a notification center is registered.
    pub fn notifications_live(&self) -> bool {
        self.notification.is_some()
    }

    /// Bytes currently in the send buffer lent by the open channel.
    pub fn send_buffer_prefix(&self, len: usize) -> Vec<u8> {
        match self.send_buffer {
            Some(buf) => {
                let guard = buf.lock();
                guard[..len.min(guard.len())].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Writes one record into the ring and pends the IRQ. Returns false without a ring.
    pub fn post(&mut self, record: NotificationRecord) -> bool {
        let Some(ring) = self.ring else {
            return false;
        };
        if ring.is_empty() {
            return false;
        }
        ring[self.ring_write].publish(record);
        self.ring_write = (self.ring_write + 1) % ring.len();
        self.irq_pending = true;
        true
    }

    /// Signals readable data on the live channel.
    pub fn notify_data_readable(&mut self) -> bool {
        let (handle, tag) = self.live_channel_tag();
        self.post(NotificationRecord {
            handle,
            event_kind: event::CHANNEL_DATA_READABLE,
            result_code: 0,
            tag,
        })
    }

    /// Simulates the peer dropping the live channel with raw closure `reason`.
    pub fn drop_channel(&mut self, reason: u32) -> bool {
        let (handle, tag) = self.live_channel_tag();
        if let Some(live) = self.live_channel() {
            self.peer_closed.push(live);
        }
        self.closure_script.push_front(Ok(reason));
        self.post(NotificationRecord {
            handle,
            event_kind: event::CHANNEL_NOT_CONNECTED,
            result_code: 0,
            tag,
        })
    }

    /// Consumes the pending-IRQ latch.
    pub fn take_irq(&mut self) -> bool {
        core::mem::take(&mut self.irq_pending)
    }

    fn live_channel_tag(&self) -> (u32, u32) {
        match self.live_channel() {
            Some(handle) => {
                let tag = self
                    .channel_tags
                    .iter()
                    .find(|(h, _)| *h == handle)
                    .map(|(_, tag)| *tag)
                    .unwrap_or(0);
                (handle.raw(), tag)
            }
            None => (0, 0),
        }
    }

    fn mint(&mut self) -> u32 {
        let raw = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        raw
    }

    fn pop<T>(script: &mut VecDeque<HostResult<T>>) -> Option<HostResult<T>> {
        script.pop_front()
    }

    fn pop_unit(script: &mut VecDeque<HostResult<()>>) -> HostResult<()> {
        Self::pop(script).unwrap_or(Ok(()))
    }

    fn check_channel(&self, channel: ChannelHandle) -> HostResult<()> {
        if !self.channels.contains(&channel) {
            return Err(HostError::InvalidHandle);
        }
        Ok(())
    }
}

impl HostRuntime for FakeHost {
    fn setup_notifications(&mut self, setup: &NotificationSetup) -> HostResult<NotificationHandle> {
        self.calls.setup_notifications += 1;
        Self::pop_unit(&mut self.setup_script)?;
        if setup.buffer.is_empty() {
            return Err(HostError::InvalidBuffer);
        }
        let handle = NotificationHandle::from_raw(self.mint());
        self.ring = Some(setup.buffer);
        self.ring_write = 0;
        self.notification = Some(handle);
        self.peaks.notification = self.peaks.notification.max(1);
        Ok(handle)
    }

    fn close_notifications(&mut self, handle: &mut NotificationHandle) -> HostResult<()> {
        self.calls.close_notifications += 1;
        if self.notification != Some(*handle) {
            return Err(HostError::InvalidHandle);
        }
        self.notification = None;
        self.ring = None;
        handle.invalidate();
        Ok(())
    }

    fn request_network(
        &mut self,
        notification: NotificationHandle,
        _tag: u32,
    ) -> HostResult<NetworkHandle> {
        self.calls.request_network += 1;
        Self::pop_unit(&mut self.network_script)?;
        if self.notification != Some(notification) {
            return Err(HostError::InvalidHandle);
        }
        let handle = NetworkHandle::from_raw(self.mint());
        self.networks.push(handle);
        self.peaks.network = self.peaks.network.max(self.networks.len());
        Ok(handle)
    }

    fn get_network_status(&mut self, network: NetworkHandle) -> HostResult<NetworkStatus> {
        self.calls.network_status += 1;
        if !self.networks.contains(&network) {
            return Err(HostError::InvalidHandle);
        }
        Self::pop(&mut self.status_script).unwrap_or(Ok(NetworkStatus::Connected))
    }

    fn release_network(&mut self, network: &mut NetworkHandle) -> HostResult<()> {
        self.calls.release_network += 1;
        let Some(pos) = self.networks.iter().position(|h| h == network) else {
            return Err(HostError::InvalidHandle);
        };
        self.networks.remove(pos);
        network.invalidate();
        Ok(())
    }

    fn open_channel(&mut self, params: &OpenChannelParams) -> HostResult<ChannelHandle> {
        self.calls.open_channel += 1;
        Self::pop_unit(&mut self.open_script)?;
        if !self.networks.contains(&params.network) {
            return Err(HostError::InvalidHandle);
        }
        if self.notification != Some(params.notification) {
            return Err(HostError::InvalidHandle);
        }
        let handle = ChannelHandle::from_raw(self.mint());
        self.channels.push(handle);
        self.channel_tags.push((handle, params.tag));
        self.send_buffer = Some(params.send_buffer);
        self.peaks.channel = self.peaks.channel.max(self.channels.len());
        Ok(handle)
    }

    fn close_channel(&mut self, channel: &mut ChannelHandle) -> HostResult<()> {
        self.calls.close_channel += 1;
        let scripted = Self::pop_unit(&mut self.close_script);
        let Some(pos) = self.channels.iter().position(|h| h == channel) else {
            return Err(HostError::InvalidHandle);
        };
        self.channels.remove(pos);
        self.channel_tags.retain(|(h, _)| h != channel);
        let was_dropped = self.peer_closed.contains(channel);
        self.peer_closed.retain(|h| h != channel);
        self.staged = None;
        if self.channels.is_empty() {
            self.send_buffer = None;
        }
        if !self.leak_channel_on_close {
            channel.invalidate();
        }
        scripted?;
        if was_dropped {
            return Err(HostError::ChannelClosed);
        }
        Ok(())
    }

    fn send_http_request(
        &mut self,
        channel: ChannelHandle,
        request: &HttpRequest<'_>,
    ) -> HostResult<()> {
        self.calls.send_http_request += 1;
        self.check_channel(channel)?;
        if self.peer_closed.contains(&channel) {
            return Err(HostError::ChannelClosed);
        }
        Self::pop_unit(&mut self.send_script)?;
        self.sent.push(SentRequest {
            channel,
            method: request.method.to_string(),
            url: request.url.to_string(),
            headers: request.headers.iter().map(|h| h.0.to_string()).collect(),
            body: request.body.to_vec(),
            timeout_ms: request.timeout_ms,
        });
        if let Some(response) = self.auto_respond.clone() {
            self.staged = Some(response);
            self.notify_data_readable();
        }
        Ok(())
    }

    fn write_stream(&mut self, channel: ChannelHandle, bytes: &[u8]) -> HostResult<usize> {
        self.calls.write_stream += 1;
        self.check_channel(channel)?;
        if self.peer_closed.contains(&channel) {
            return Err(HostError::ChannelClosed);
        }
        Self::pop_unit(&mut self.send_script)?;
        let accepted = match self.send_buffer {
            Some(buf) => {
                let mut guard = buf.lock();
                let n = bytes.len().min(guard.len());
                guard[..n].copy_from_slice(&bytes[..n]);
                n
            }
            None => bytes.len(),
        };
        self.streamed.push(bytes[..accepted].to_vec());
        Ok(accepted)
    }

    fn read_response_metadata(&mut self, channel: ChannelHandle) -> HostResult<HttpResponseMeta> {
        self.calls.read_metadata += 1;
        self.check_channel(channel)?;
        Self::pop_unit(&mut self.metadata_script)?;
        self.staged.as_ref().map(CannedResponse::meta).ok_or(HostError::Unavailable)
    }

    fn read_response_body(
        &mut self,
        channel: ChannelHandle,
        offset: u32,
        buf: &mut [u8],
    ) -> HostResult<()> {
        self.calls.read_body += 1;
        self.check_channel(channel)?;
        Self::pop_unit(&mut self.body_script)?;
        let body = self.staged.as_ref().map(|r| r.body.as_slice()).ok_or(HostError::Unavailable)?;
        let start = offset as usize;
        let end = start.checked_add(buf.len()).ok_or(HostError::InvalidParameter)?;
        if end > body.len() {
            return Err(HostError::InvalidParameter);
        }
        buf.copy_from_slice(&body[start..end]);
        Ok(())
    }

    fn get_closure_reason(&mut self, channel: ChannelHandle) -> HostResult<u32> {
        self.calls.closure_reason += 1;
        self.check_channel(channel)?;
        Self::pop(&mut self.closure_script).unwrap_or(Ok(crate::closure::UNKNOWN))
    }

    fn get_microseconds(&mut self) -> HostResult<u64> {
        if self.clock_failures > 0 {
            self.clock_failures -= 1;
            return Err(HostError::Unavailable);
        }
        let now = self.now_us;
        self.now_us = self.now_us.saturating_add(self.clock_step_us);
        Ok(now)
    }

    fn get_wake_reason(&mut self) -> HostResult<WakeReason> {
        Ok(self.wake_reason)
    }

    fn get_device_id(&mut self, buf: &mut [u8]) -> HostResult<usize> {
        let id = self.device_id.as_bytes();
        let n = id.len().min(buf.len());
        buf[..n].copy_from_slice(&id[..n]);
        Ok(n)
    }
}
