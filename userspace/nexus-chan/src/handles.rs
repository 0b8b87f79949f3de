// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Exclusive ownership of host resource handles
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below; tests/scenarios.rs (leak and teardown paths)
//!
//! Each resource class has one slot. A slot holds either the zero sentinel or the single live
//! handle the host issued. Closes are confirmed by the host writing the sentinel back; a
//! non-zero value after a close is a leak and is reported as fatal.

use log::{debug, error, info};
use nexus_hostcall::{
    ChannelHandle, HostError, HostRuntime, NetworkHandle, NotificationHandle, NotificationSetup,
    OpenChannelParams,
};

use crate::channel::ChannelSession;
use crate::error::{ChanError, ResourceClass};

/// The firmware's complete set of host handles.
#[derive(Debug, Default)]
pub struct ResourceHandles {
    notification: NotificationHandle,
    network: NetworkHandle,
    channel: ChannelHandle,
}

impl ResourceHandles {
    /// All slots empty.
    pub const fn new() -> Self {
        Self {
            notification: NotificationHandle::NONE,
            network: NetworkHandle::NONE,
            channel: ChannelHandle::NONE,
        }
    }

    /// Current notification center handle (sentinel when absent).
    pub fn notification(&self) -> NotificationHandle {
        self.notification
    }

    /// Current network handle (sentinel when absent).
    pub fn network(&self) -> NetworkHandle {
        self.network
    }

    /// Current channel handle (sentinel when absent).
    pub fn channel(&self) -> ChannelHandle {
        self.channel
    }

    /// Registers the notification ring. Failure is fatal.
    pub fn acquire_notification_center<H: HostRuntime>(
        &mut self,
        host: &mut H,
        setup: &NotificationSetup,
    ) -> Result<NotificationHandle, ChanError> {
        if self.notification.is_live() {
            return Err(ChanError::HandleInUse(ResourceClass::NotificationCenter));
        }
        let handle = host.setup_notifications(setup).map_err(|status| {
            error!("notification center setup failed (status: {})", status.code());
            ChanError::SetupFatal { resource: ResourceClass::NotificationCenter, status }
        })?;
        if !handle.is_live() {
            return Err(ChanError::SetupFatal {
                resource: ResourceClass::NotificationCenter,
                status: HostError::InvalidHandle,
            });
        }
        info!("notification center handle: {handle}");
        self.notification = handle;
        Ok(handle)
    }

    /// Requests a network. Does not wait for it to connect. Failure is fatal.
    pub fn acquire_network<H: HostRuntime>(
        &mut self,
        host: &mut H,
        tag: u32,
    ) -> Result<NetworkHandle, ChanError> {
        if self.network.is_live() {
            return Err(ChanError::HandleInUse(ResourceClass::Network));
        }
        let handle = host.request_network(self.notification, tag).map_err(|status| {
            error!("network request failed (status: {})", status.code());
            ChanError::SetupFatal { resource: ResourceClass::Network, status }
        })?;
        if !handle.is_live() {
            return Err(ChanError::SetupFatal {
                resource: ResourceClass::Network,
                status: HostError::InvalidHandle,
            });
        }
        info!("network handle: {handle}");
        self.network = handle;
        Ok(handle)
    }

    /// Opens the data channel described by `session` over the live network.
    pub fn open_channel<H: HostRuntime>(
        &mut self,
        host: &mut H,
        session: &ChannelSession,
    ) -> Result<ChannelHandle, ChanError> {
        if self.channel.is_live() {
            return Err(ChanError::HandleInUse(ResourceClass::Channel));
        }
        if !self.network.is_live() {
            return Err(ChanError::NoNetwork);
        }
        let params = OpenChannelParams {
            notification: self.notification,
            tag: session.tag,
            network: self.network,
            receive_buffer: session.receive_buffer,
            send_buffer: session.send_buffer,
            channel_type: session.kind.channel_type(),
            endpoint: session.kind.endpoint(),
        };
        let handle = host.open_channel(&params).map_err(ChanError::OpenRejected)?;
        if !handle.is_live() {
            return Err(ChanError::OpenRejected(HostError::InvalidHandle));
        }
        self.channel = handle;
        Ok(handle)
    }

    /// Closes the channel if one is live and confirms the sentinel came back.
    ///
    /// A close on a channel the host already dropped reports `ChannelClosed`; that still
    /// counts as a completed close.
    pub fn close_channel<H: HostRuntime>(&mut self, host: &mut H) -> Result<(), ChanError> {
        if !self.channel.is_live() {
            return Ok(());
        }
        let closing = self.channel;
        match host.close_channel(&mut self.channel) {
            Ok(()) => debug!("channel {closing} closed"),
            Err(HostError::ChannelClosed) => debug!("channel {closing} already closed by host"),
            Err(status) => {
                error!("channel {closing} close failed (status: {})", status.code());
                return Err(ChanError::CloseRejected { resource: ResourceClass::Channel, status });
            }
        }
        if self.channel.is_live() {
            error!("channel handle {} not zero after close", self.channel);
            return Err(ChanError::ResidualHandle {
                resource: ResourceClass::Channel,
                raw: self.channel.raw(),
            });
        }
        Ok(())
    }

    /// Releases the network. Any open channel must be closed first.
    pub fn release_network<H: HostRuntime>(&mut self, host: &mut H) -> Result<(), ChanError> {
        if !self.network.is_live() {
            return Ok(());
        }
        if self.channel.is_live() {
            return Err(ChanError::HandleInUse(ResourceClass::Channel));
        }
        host.release_network(&mut self.network).map_err(|status| ChanError::CloseRejected {
            resource: ResourceClass::Network,
            status,
        })?;
        if self.network.is_live() {
            return Err(ChanError::ResidualHandle {
                resource: ResourceClass::Network,
                raw: self.network.raw(),
            });
        }
        info!("network released");
        Ok(())
    }

    /// Tears down the notification center. The network must be released first.
    pub fn close_notification_center<H: HostRuntime>(
        &mut self,
        host: &mut H,
    ) -> Result<(), ChanError> {
        if !self.notification.is_live() {
            return Ok(());
        }
        if self.network.is_live() {
            return Err(ChanError::HandleInUse(ResourceClass::Network));
        }
        host.close_notifications(&mut self.notification).map_err(|status| {
            ChanError::CloseRejected { resource: ResourceClass::NotificationCenter, status }
        })?;
        if self.notification.is_live() {
            return Err(ChanError::ResidualHandle {
                resource: ResourceClass::NotificationCenter,
                raw: self.notification.raw(),
            });
        }
        info!("notification center closed");
        Ok(())
    }
}
