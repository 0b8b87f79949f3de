// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Notification-driven network channel controller for host-supervised firmware
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per module; tests/scenarios.rs, tests/properties.rs
//!
//! PUBLIC API:
//!   - ResourceHandles: exclusive owner of notification/network/channel handles
//!   - IrqShared: notification ring + cross-domain flags, interrupt entry point
//!   - NetworkSession: idempotent network bring-up with bounded connect wait
//!   - Channel: per-exchange state machine (open, send, close, watchdog deadline)
//!   - ResponseProcessor: metadata/body reads and closure classification
//!   - Controller: cooperative main loop (LED cadence, periodic send, watchdog, teardown)
//!   - ServerLogger: `log` backend that frames lines for the host log channel
//!   - ControllerConfig: timing and tag configuration (TOML on host builds)
//!
//! INVARIANTS:
//!   - At most one live handle per resource class at any time
//!   - Every channel close is confirmed by the host writing the zero sentinel back
//!   - Interrupt context only reads the ring and raises flags; all host calls run in the main loop

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

extern crate alloc;

pub mod channel;
pub mod config;
pub mod controller;
pub mod error;
pub mod handles;
pub mod logging;
pub mod response;
pub mod ring;
pub mod session;

pub use channel::{Channel, ChannelKind, ChannelSession, ChannelState, Outbound, PendingExchange};
pub use config::{ConfigError, ConnectPolicy, ControllerConfig};
pub use controller::{Controller, ControllerStats, ExchangePolicy, TickReport};
pub use error::{ChanError, ResourceClass};
pub use handles::ResourceHandles;
pub use logging::{LogSink, ServerLogger, LOG_MESSAGE_MAX_LEN};
pub use response::{ClosureClass, ResponseOutcome, ResponseProcessor};
pub use ring::{ConsumedEvent, CrossDomainFlags, IrqShared, NotificationRing, RING_SLOTS};
pub use session::NetworkSession;
