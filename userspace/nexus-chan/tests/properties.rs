// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Property-based tests for ring consumption, handle ownership and channel lifecycle
//! OWNERS: @runtime
//! NOTE: Tests only; drives the public API against the scripted host.
//!
//! TEST_SCOPE:
//!   - Consumer index arithmetic over arbitrary event sequences
//!   - Flag idempotence across repeated interrupts
//!   - Single live handle per class under arbitrary host behaviour
//!   - Bounded implicit re-open, idempotent close, watchdog threshold
//!
//! TEST_SCENARIOS:
//!   - ring_index_tracks_recognized_events(): +1 per recognized, +0 otherwise
//!   - readable_flag_survives_repeated_interrupts(): set stays set until taken
//!   - closure_codes_always_classify(): classification is total
//!   - handles_stay_exclusive_under_random_traffic(): never two live channels
//!   - send_opens_at_most_once(): one open attempt per send from Closed
//!   - close_is_idempotent(): sentinel after close, second close is free
//!   - watchdog_threshold_is_strict(): expires iff elapsed > kill period

use nexus_chan::{
    Channel, ChannelKind, ChannelSession, ClosureClass, Controller, ControllerConfig,
    ExchangePolicy, IrqShared, Outbound, ResourceHandles, RING_SLOTS,
};
use nexus_hal::Platform;
use nexus_hostcall::fake::{CannedResponse, FakeHost};
use nexus_hostcall::{
    event, ChannelBuffer, HostError, HttpRequest, NotificationRecord, NotificationSetup,
    NotificationSlot,
};
use nexus_sync::SpinLock;
use proptest::prelude::*;

const KILL_US: u64 = 15_000_000;

struct NullBoard;

impl Platform for NullBoard {
    fn init(&mut self) {}
    fn toggle_led(&mut self) {}
    fn pause_us(&mut self, _micros: u64) {}
}

struct FixedRequest;

impl ExchangePolicy for FixedRequest {
    fn next_request(&mut self) -> Outbound<'_> {
        Outbound::Http(request())
    }

    fn on_payload(&mut self, _payload: &[u8]) {}
}

fn request() -> HttpRequest<'static> {
    HttpRequest {
        method: "GET",
        url: "https://example.invalid/1",
        headers: &[],
        body: b"",
        timeout_ms: 10_000,
    }
}

fn leak_buffer() -> &'static ChannelBuffer {
    let buf: &'static SpinLock<[u8; 64]> = Box::leak(Box::new(SpinLock::new([0u8; 64])));
    buf
}

fn session() -> ChannelSession {
    ChannelSession {
        kind: ChannelKind::Http,
        tag: 3,
        receive_buffer: leak_buffer(),
        send_buffer: leak_buffer(),
    }
}

fn connected_handles(host: &mut FakeHost) -> ResourceHandles {
    let ring: &'static [NotificationSlot; 4] =
        Box::leak(Box::new([const { NotificationSlot::empty() }; 4]));
    let mut handles = ResourceHandles::new();
    handles
        .acquire_notification_center(host, &NotificationSetup { irq: 13, buffer: ring })
        .unwrap();
    handles.acquire_network(host, 1).unwrap();
    handles
}

fn record(kind: u32) -> NotificationRecord {
    NotificationRecord { handle: 5, event_kind: kind, result_code: 0, tag: 3 }
}

#[derive(Clone, Debug)]
enum Step {
    Advance(u64),
    FailNextOpen,
    FailNextSend,
    Respond(u32),
    Drop(u32),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1u64..40_000_000).prop_map(Step::Advance),
        Just(Step::FailNextOpen),
        Just(Step::FailNextSend),
        prop_oneof![Just(200u32), Just(404), Just(500)].prop_map(Step::Respond),
        (0u32..12).prop_map(Step::Drop),
    ]
}

proptest! {
    #[test]
    fn ring_index_tracks_recognized_events(kinds in proptest::collection::vec(0u32..6, 0..40)) {
        let irq: &'static IrqShared = Box::leak(Box::new(IrqShared::new()));
        let mut expected = 0usize;
        for kind in kinds {
            irq.ring_slots()[irq.ring().index()].publish(record(kind));
            let consumed = irq.on_interrupt().is_some();
            let recognized =
                kind == event::CHANNEL_DATA_READABLE || kind == event::CHANNEL_NOT_CONNECTED;
            prop_assert_eq!(consumed, recognized);
            if recognized {
                expected = (expected + 1) % RING_SLOTS;
            }
            prop_assert_eq!(irq.ring().index(), expected);
        }
    }

    #[test]
    fn readable_flag_survives_repeated_interrupts(fires in 1usize..20) {
        let irq: &'static IrqShared = Box::leak(Box::new(IrqShared::new()));
        for _ in 0..fires {
            irq.ring_slots()[irq.ring().index()].publish(record(event::CHANNEL_DATA_READABLE));
            irq.on_interrupt();
            prop_assert!(irq.flags().response_ready.is_raised());
        }
        prop_assert!(irq.flags().response_ready.take());
        prop_assert!(!irq.flags().response_ready.take());
    }

    #[test]
    fn closure_codes_always_classify(raw in any::<u32>()) {
        let class = ClosureClass::classify(raw);
        if (1..=8).contains(&raw) {
            prop_assert_ne!(class, ClosureClass::Unknown);
        } else {
            prop_assert_eq!(class, ClosureClass::Unknown);
        }
    }

    #[test]
    fn handles_stay_exclusive_under_random_traffic(steps in proptest::collection::vec(arb_step(), 1..60)) {
        let irq: &'static IrqShared = Box::leak(Box::new(IrqShared::new()));
        let mut ctrl = Controller::new(
            FakeHost::new(),
            NullBoard,
            FixedRequest,
            irq,
            ControllerConfig::default(),
            session(),
        )
        .unwrap();
        ctrl.start().unwrap();
        for step in steps {
            let host = ctrl.host_mut();
            match step {
                Step::Advance(us) => host.advance(us),
                Step::FailNextOpen => host.script_open(Err(HostError::Exhausted)),
                Step::FailNextSend => host.script_send(Err(HostError::Unavailable)),
                Step::Respond(status) => {
                    let response = match status {
                        200 => CannedResponse::ok(b"{}"),
                        other => CannedResponse::status(other),
                    };
                    host.stage_response(response);
                    host.notify_data_readable();
                }
                Step::Drop(reason) => {
                    host.drop_channel(reason);
                }
            }
            if ctrl.host_mut().take_irq() {
                irq.on_interrupt();
            }
            let tick = ctrl.tick();
            prop_assert!(tick.is_ok(), "unexpected fatal error: {:?}", tick);
            let live_on_host = ctrl.host().live_channels();
            prop_assert!(live_on_host <= 1);
            prop_assert_eq!(ctrl.handles().channel().is_live(), live_on_host == 1);
        }
        let peaks = ctrl.host().peaks;
        prop_assert!(peaks.notification <= 1 && peaks.network <= 1 && peaks.channel <= 1);
    }

    #[test]
    fn send_opens_at_most_once(open_fails in any::<bool>(), send_fails in any::<bool>()) {
        let mut host = FakeHost::new();
        let mut handles = connected_handles(&mut host);
        let mut channel = Channel::new(session(), KILL_US);
        if open_fails {
            host.script_open(Err(HostError::Exhausted));
            host.script_open(Err(HostError::Exhausted));
        }
        if send_fails {
            host.script_send(Err(HostError::ChannelClosed));
        }
        let _ = channel.send(&mut handles, &mut host, &Outbound::Http(request()), 0);
        prop_assert_eq!(host.calls.open_channel, 1);
        prop_assert!(host.calls.send_http_request <= 1);
        prop_assert_eq!(host.calls.send_http_request, usize::from(!open_fails));
    }

    #[test]
    fn close_is_idempotent(send_first in any::<bool>(), dropped in any::<bool>()) {
        let mut host = FakeHost::new();
        let mut handles = connected_handles(&mut host);
        let mut channel = Channel::new(session(), KILL_US);
        channel.open(&mut handles, &mut host).unwrap();
        if send_first {
            channel.send(&mut handles, &mut host, &Outbound::Http(request()), 0).unwrap();
        }
        if dropped {
            host.drop_channel(nexus_hostcall::closure::NETWORK_DOWN);
            channel.mark_dropped();
        }
        channel.close(&mut handles, &mut host).unwrap();
        prop_assert!(!handles.channel().is_live());
        let closes = host.calls.close_channel;
        channel.close(&mut handles, &mut host).unwrap();
        prop_assert_eq!(host.calls.close_channel, closes);
        prop_assert!(channel.pending().is_none());
    }

    #[test]
    fn watchdog_threshold_is_strict(issued in 0u64..1_000_000_000, elapsed in 0u64..40_000_000) {
        let mut host = FakeHost::new();
        let mut handles = connected_handles(&mut host);
        let mut channel = Channel::new(session(), KILL_US);
        channel.send(&mut handles, &mut host, &Outbound::Http(request()), issued).unwrap();
        prop_assert_eq!(channel.watchdog_expired(issued + elapsed), elapsed > KILL_US);
    }
}
