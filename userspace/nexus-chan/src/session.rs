// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Network bring-up on the startup path
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below; tests/scenarios.rs (first-boot path)
//!
//! The connect wait is the only place the firmware pauses. It polls the network status with a
//! doubling pause capped by the connect policy, and gives up once the optional timeout has
//! elapsed on the host clock.

use log::{debug, error, info};
use nexus_hal::Platform;
use nexus_hostcall::{HostRuntime, NetworkHandle, NetworkStatus, NotificationSetup};

use crate::config::ConnectPolicy;
use crate::error::ChanError;
use crate::handles::ResourceHandles;
use crate::ring::IrqShared;

/// Brings up the notification center and network, once.
#[derive(Clone, Debug)]
pub struct NetworkSession {
    irq_line: u32,
    tag: u32,
    policy: ConnectPolicy,
}

impl NetworkSession {
    /// Session binding notifications to `irq_line` and tagging the network request with `tag`.
    pub fn new(irq_line: u32, tag: u32, policy: ConnectPolicy) -> Self {
        Self { irq_line, tag, policy }
    }

    /// Returns the live network, acquiring it (and the notification center) on first use.
    pub fn open_network<H: HostRuntime, P: Platform>(
        &self,
        handles: &mut ResourceHandles,
        host: &mut H,
        platform: &mut P,
        irq: &'static IrqShared,
    ) -> Result<NetworkHandle, ChanError> {
        if handles.network().is_live() {
            return Ok(handles.network());
        }
        self.ensure_notification_center(handles, host, irq)?;
        let network = handles.acquire_network(host, self.tag)?;
        self.wait_connected(host, platform, network)?;
        info!("network connected");
        Ok(network)
    }

    /// Registers the ring if no center is live. The ring is zeroed first.
    pub fn ensure_notification_center<H: HostRuntime>(
        &self,
        handles: &mut ResourceHandles,
        host: &mut H,
        irq: &'static IrqShared,
    ) -> Result<(), ChanError> {
        if handles.notification().is_live() {
            return Ok(());
        }
        irq.ring().clear();
        let setup = NotificationSetup { irq: self.irq_line, buffer: irq.ring_slots() };
        handles.acquire_notification_center(host, &setup)?;
        Ok(())
    }

    fn wait_connected<H: HostRuntime, P: Platform>(
        &self,
        host: &mut H,
        platform: &mut P,
        network: NetworkHandle,
    ) -> Result<(), ChanError> {
        let started = host.get_microseconds().ok();
        let mut paused_us: u64 = 0;
        let mut interval = self.policy.poll_interval_us;
        let mut polls: u32 = 0;
        loop {
            polls = polls.saturating_add(1);
            match host.get_network_status(network) {
                Ok(NetworkStatus::Connected) => {
                    debug!("network connected after {polls} poll(s)");
                    return Ok(());
                }
                Ok(status) => debug!("network status: {status:?}"),
                Err(status) => debug!("network status read failed (status: {})", status.code()),
            }
            if let Some(timeout) = self.policy.timeout_us {
                let waited = match (started, host.get_microseconds()) {
                    (Some(start), Ok(now)) => now.saturating_sub(start),
                    _ => paused_us,
                };
                if waited >= timeout {
                    error!("network not connected after {waited} us");
                    return Err(ChanError::NetworkUnavailable { waited_us: waited });
                }
            }
            platform.pause_us(interval);
            paused_us = paused_us.saturating_add(interval);
            interval = self.policy.next_interval(interval);
        }
    }
}
