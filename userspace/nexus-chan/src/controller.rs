// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Cooperative main loop driving the channel controller
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: tests/scenarios.rs (end-to-end loop behaviour)
//!
//! One `tick` is one main-loop iteration:
//!   1. read the host clock (on failure skip steps 2, 3 and 5); warn once if the ring head
//!      holds a record the interrupt handler cannot consume
//!   2. toggle the LED when the LED period has elapsed
//!   3. issue the next request when the send period has elapsed and no exchange is in flight
//!   4. consume `channel_dropped`: classify the closure, schedule a close
//!   5. check the exchange deadline, schedule a forced close when it passed
//!   6. consume `response_ready`: read and dispatch the response, then close
//!
//! Fatal errors are returned from `tick` and end the loop.

use core::convert::Infallible;

use log::{debug, error, info, warn};
use nexus_hal::Platform;
use nexus_hostcall::HostRuntime;

use crate::channel::{Channel, ChannelSession, ChannelState, Outbound};
use crate::config::{ConfigError, ControllerConfig};
use crate::error::ChanError;
use crate::handles::ResourceHandles;
use crate::response::{ClosureClass, ResponseOutcome, ResponseProcessor};
use crate::ring::IrqShared;
use crate::session::NetworkSession;

/// Application hooks: what to send and what to do with the answer.
pub trait ExchangePolicy {
    /// Request for the next send period.
    fn next_request(&mut self) -> Outbound<'_>;

    /// A 200 response with its complete body.
    fn on_payload(&mut self, payload: &[u8]);

    /// A 404 response.
    fn on_not_found(&mut self) {}
}

/// What happened during one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Host clock could not be read.
    pub clock_missed: bool,
    /// LED toggled.
    pub led_toggled: bool,
    /// A request was accepted by the host.
    pub sent: bool,
    /// Send attempted and failed (recoverable).
    pub send_error: Option<ChanError>,
    /// Closure reason, when a drop notification was consumed.
    pub dropped: Option<ClosureClass>,
    /// Event kind parked at the ring's consumer index, blocking later notifications.
    pub ring_stalled: Option<u32>,
    /// Exchange deadline passed.
    pub timed_out: bool,
    /// Response processed, when `response_ready` was consumed.
    pub response: Option<Result<ResponseOutcome, ChanError>>,
    /// Channel closed at the end of the tick.
    pub closed: bool,
}

/// Running totals, for logging and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Ticks run.
    pub ticks: u64,
    /// Requests accepted by the host.
    pub requests: u64,
    /// Responses read.
    pub responses: u64,
    /// Channels dropped by the host.
    pub drops: u64,
    /// Exchanges killed by the watchdog.
    pub timeouts: u64,
    /// Clock reads that failed.
    pub clock_misses: u64,
}

#[derive(Clone, Copy, Debug, Default)]
struct LoopTimers {
    last_led_us: u64,
    last_send_us: u64,
}

/// The channel controller.
pub struct Controller<H, P, A> {
    host: H,
    platform: P,
    policy: A,
    irq: &'static IrqShared,
    config: ControllerConfig,
    handles: ResourceHandles,
    session: NetworkSession,
    channel: Channel,
    processor: ResponseProcessor,
    timers: LoopTimers,
    stats: ControllerStats,
    stall_reported: bool,
}

impl<H: HostRuntime, P: Platform, A: ExchangePolicy> Controller<H, P, A> {
    /// Validates `config` and assembles a controller. No host calls are made.
    ///
    /// The channel's tag is taken from `config.channel_tag`.
    pub fn new(
        host: H,
        platform: P,
        policy: A,
        irq: &'static IrqShared,
        config: ControllerConfig,
        channel: ChannelSession,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let session = NetworkSession::new(config.irq, config.network_tag, config.connect.clone());
        let channel = Channel::new(
            ChannelSession { tag: config.channel_tag, ..channel },
            config.kill_period_us,
        );
        let processor = ResponseProcessor::new(config.body_chunk_bytes);
        Ok(Self {
            host,
            platform,
            policy,
            irq,
            config,
            handles: ResourceHandles::new(),
            session,
            channel,
            processor,
            timers: LoopTimers::default(),
            stats: ControllerStats::default(),
            stall_reported: false,
        })
    }

    /// Board bring-up, notification center and network. Blocks until connected.
    ///
    /// The send timer starts here, so the first request goes out one send period later.
    pub fn start(&mut self) -> Result<(), ChanError> {
        self.platform.init();
        self.session.open_network(&mut self.handles, &mut self.host, &mut self.platform, self.irq)?;
        if let Ok(now) = self.host.get_microseconds() {
            self.timers = LoopTimers { last_led_us: now, last_send_us: now };
        }
        Ok(())
    }

    /// One main-loop iteration.
    pub fn tick(&mut self) -> Result<TickReport, ChanError> {
        self.stats.ticks += 1;
        let mut report = TickReport::default();
        let mut close_channel = false;

        let now = match self.host.get_microseconds() {
            Ok(now) => Some(now),
            Err(status) => {
                debug!("clock read failed (status: {})", status.code());
                self.stats.clock_misses += 1;
                report.clock_missed = true;
                None
            }
        };

        report.ring_stalled = self.check_ring_stall();

        if let Some(now) = now {
            if now.saturating_sub(self.timers.last_led_us) > self.config.led_period_us {
                self.platform.toggle_led();
                self.timers.last_led_us = now;
                report.led_toggled = true;
            }
            if now.saturating_sub(self.timers.last_send_us) > self.config.send_period_us {
                self.timers.last_send_us = now;
                close_channel |= self.periodic_send(now, &mut report)?;
            }
        }

        if self.irq.flags().channel_dropped.take() {
            report.dropped = Some(self.on_channel_dropped());
            close_channel = true;
        }

        if let Some(now) = now {
            if self.channel.watchdog_expired(now) {
                error!("request timed out; closing channel {}", self.handles.channel());
                self.stats.timeouts += 1;
                report.timed_out = true;
                close_channel = true;
            }
        }

        if self.irq.flags().response_ready.take() {
            report.response = self.on_response_ready();
            close_channel = true;
        }

        if close_channel && self.handles.channel().is_live() {
            self.channel.close(&mut self.handles, &mut self.host)?;
            report.closed = true;
        }
        Ok(report)
    }

    /// Runs `tick` until a fatal error.
    pub fn run(&mut self) -> Result<Infallible, ChanError> {
        loop {
            self.tick()?;
        }
    }

    /// Closes the channel, releases the network and tears down the notification center.
    pub fn shutdown(&mut self) -> Result<(), ChanError> {
        self.channel.close(&mut self.handles, &mut self.host)?;
        self.handles.release_network(&mut self.host)?;
        self.handles.close_notification_center(&mut self.host)?;
        self.irq.flags().response_ready.lower();
        self.irq.flags().channel_dropped.lower();
        info!("controller shut down after {} tick(s)", self.stats.ticks);
        Ok(())
    }

    /// Returns whether the channel must be closed this tick.
    fn periodic_send(&mut self, now: u64, report: &mut TickReport) -> Result<bool, ChanError> {
        if self.channel.state() != ChannelState::Closed {
            warn!(
                "previous exchange still in flight on channel {}; skipping send",
                self.handles.channel()
            );
            return Ok(false);
        }
        let request = self.policy.next_request();
        match self.channel.send(&mut self.handles, &mut self.host, &request, now) {
            Ok(()) => {
                self.stats.requests += 1;
                report.sent = true;
                Ok(false)
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(_) if self.channel.state() == ChannelState::ClosedUnexpectedly => {
                self.stats.drops += 1;
                let reason = self.processor.closure_reason(&mut self.host, self.handles.channel());
                report.dropped = Some(reason);
                report.send_error = Some(ChanError::ClosedUnexpectedly { reason });
                Ok(true)
            }
            Err(err) => {
                report.send_error = Some(err);
                Ok(true)
            }
        }
    }

    /// Logs once per stall; the record stays where it is.
    fn check_ring_stall(&mut self) -> Option<u32> {
        let Some(record) = self.irq.stalled_record() else {
            self.stall_reported = false;
            return None;
        };
        if !self.stall_reported {
            warn!(
                "notification ring stalled at slot {} on event kind {} (handle {}, tag {})",
                self.irq.ring().index(),
                record.event_kind,
                record.handle,
                record.tag
            );
            self.stall_reported = true;
        }
        Some(record.event_kind)
    }

    fn on_channel_dropped(&mut self) -> ClosureClass {
        self.stats.drops += 1;
        let channel = self.handles.channel();
        if !channel.is_live() {
            debug!("drop notification with no live channel");
            return ClosureClass::Unknown;
        }
        self.channel.mark_dropped();
        self.processor.closure_reason(&mut self.host, channel)
    }

    fn on_response_ready(&mut self) -> Option<Result<ResponseOutcome, ChanError>> {
        let channel = self.handles.channel();
        if !channel.is_live() {
            debug!("response notification with no live channel");
            return None;
        }
        self.stats.responses += 1;
        let outcome = self.processor.process(&mut self.host, channel);
        match &outcome {
            Ok(ResponseOutcome::Success { payload, .. }) => self.policy.on_payload(payload),
            Ok(ResponseOutcome::NotFound) => self.policy.on_not_found(),
            Ok(ResponseOutcome::SuccessBodyUnreadable(_)) | Err(_) => {}
        }
        Some(outcome)
    }

    /// Host runtime.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Host runtime, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Board.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Exchange policy.
    pub fn policy(&self) -> &A {
        &self.policy
    }

    /// Handle set.
    pub fn handles(&self) -> &ResourceHandles {
        &self.handles
    }

    /// Data channel.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Effective configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Running totals.
    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    /// Interrupt-shared state.
    pub fn irq(&self) -> &'static IrqShared {
        self.irq
    }
}
