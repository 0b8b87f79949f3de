// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Periodic HTTP poller firmware application
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below; tests/poller.rs
//!
//! PUBLIC API:
//!   - TodoPoller: numbered-item GET policy (404 resets the counter)
//!   - log_startup_diagnostics(): wake reason and device id
//!   - build_controller(): controller wired to the application's static buffers
//!   - IRQ_SHARED, RX_BUFFER, TX_BUFFER: interrupt and host-lent storage
//!
//! Firmware entry: install a `ServerLogger`, call `log_startup_diagnostics`, then
//! `build_controller(..)?.start()?` and `run()`, binding `IRQ_SHARED.on_interrupt` to the
//! notification IRQ vector.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

extern crate alloc;

use alloc::string::String;
use core::fmt::Write;

use log::{error, info};
use nexus_chan::{
    ChannelKind, ChannelSession, ConfigError, Controller, ControllerConfig, ExchangePolicy,
    IrqShared, Outbound,
};
use nexus_hal::Platform;
use nexus_hostcall::{ChannelBuffer, HostRuntime, HttpRequest};
use nexus_sync::SpinLock;

/// Items are fetched from `{ITEM_BASE_URL}{n}`.
pub const ITEM_BASE_URL: &str = "https://jsonplaceholder.typicode.com/todos/";
/// Receive buffer lent to the host.
pub const RX_BUFFER_BYTES: usize = 1536;
/// Send buffer lent to the host.
pub const TX_BUFFER_BYTES: usize = 512;
/// Longest device id the host reports.
pub const DEVICE_ID_MAX_LEN: usize = 34;

/// Ring and flags shared with the notification interrupt.
pub static IRQ_SHARED: IrqShared = IrqShared::new();
/// Inbound channel storage.
pub static RX_BUFFER: SpinLock<[u8; RX_BUFFER_BYTES]> = SpinLock::new([0; RX_BUFFER_BYTES]);
/// Outbound channel storage.
pub static TX_BUFFER: SpinLock<[u8; TX_BUFFER_BYTES]> = SpinLock::new([0; TX_BUFFER_BYTES]);

/// GETs item 1, 2, 3, ... one per send period; a 404 starts over at 1.
pub struct TodoPoller {
    base_url: &'static str,
    timeout_ms: u32,
    item: u32,
    url: String,
}

impl TodoPoller {
    /// Poller for `base_url` with a host-side request timeout.
    pub fn new(base_url: &'static str, timeout_ms: u32) -> Self {
        Self { base_url, timeout_ms, item: 0, url: String::new() }
    }

    /// Number of the last requested item; 0 before the first request or after a reset.
    pub fn item(&self) -> u32 {
        self.item
    }
}

impl ExchangePolicy for TodoPoller {
    fn next_request(&mut self) -> Outbound<'_> {
        self.item = self.item.wrapping_add(1);
        self.url.clear();
        let _ = write!(self.url, "{}{}", self.base_url, self.item);
        info!("sending request for item {}", self.item);
        Outbound::Http(HttpRequest {
            method: "GET",
            url: &self.url,
            headers: &[],
            body: b"",
            timeout_ms: self.timeout_ms,
        })
    }

    fn on_payload(&mut self, payload: &[u8]) {
        match core::str::from_utf8(payload) {
            Ok(json) => info!("Message JSON:\n{json}"),
            Err(_) => error!("response body is not UTF-8 ({} bytes)", payload.len()),
        }
    }

    fn on_not_found(&mut self) {
        info!("resetting item counter");
        self.item = 0;
    }
}

/// Logs why the application started and which device it runs on.
pub fn log_startup_diagnostics<H: HostRuntime>(host: &mut H) {
    match host.get_wake_reason().ok().and_then(|reason| reason.describe()) {
        Some(text) => info!("Wake reason: {text}"),
        None => info!("Wake reason: Unknown"),
    }
    let mut id = [0u8; DEVICE_ID_MAX_LEN];
    match host.get_device_id(&mut id) {
        Ok(len) => {
            let id = core::str::from_utf8(&id[..len.min(DEVICE_ID_MAX_LEN)]).unwrap_or("?");
            info!("Device: {id}");
        }
        Err(status) => error!("device id read failed (status: {})", status.code()),
    }
    info!("   App: {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
}

/// Channel description over the given buffers.
pub fn channel_session(
    receive_buffer: &'static ChannelBuffer,
    send_buffer: &'static ChannelBuffer,
) -> ChannelSession {
    ChannelSession { kind: ChannelKind::Http, tag: 0, receive_buffer, send_buffer }
}

/// Controller over the application's static ring and buffers.
pub fn build_controller<H: HostRuntime, P: Platform>(
    host: H,
    platform: P,
    config: ControllerConfig,
) -> Result<Controller<H, P, TodoPoller>, ConfigError> {
    let poller = TodoPoller::new(ITEM_BASE_URL, config.request_timeout_ms);
    let session = channel_session(&RX_BUFFER, &TX_BUFFER);
    Controller::new(host, platform, poller, &IRQ_SHARED, config, session)
}
