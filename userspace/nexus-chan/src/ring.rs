// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Notification ring consumer and interrupt-to-main-loop signalling
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below; tests/properties.rs (index arithmetic)
//!
//! The host writes records round-robin into a ring of [`RING_SLOTS`] slots and pends the IRQ.
//! The interrupt handler reads the slot at the consumer index, raises the matching flag,
//! advances the index and clears the slot. It makes no host calls.
//!
//! INVARIANTS:
//!   - The consumer index stays in `[0, RING_SLOTS)`
//!   - The index advances by one per recognized event and not at all otherwise
//!   - A consumed slot reads as `event::NONE` until the host writes it again

use core::sync::atomic::{AtomicUsize, Ordering};

use nexus_hostcall::{event, NotificationRecord, NotificationSlot};
use nexus_sync::IrqFlag;

/// Ring capacity in slots.
pub const RING_SLOTS: usize = 8;

/// Ring storage lent to the host plus the consumer index.
pub struct NotificationRing {
    slots: [NotificationSlot; RING_SLOTS],
    index: AtomicUsize,
}

impl NotificationRing {
    /// Zero-filled ring with the consumer at slot 0.
    pub const fn new() -> Self {
        Self { slots: [const { NotificationSlot::empty() }; RING_SLOTS], index: AtomicUsize::new(0) }
    }

    /// Storage handed to `setup_notifications`.
    pub fn slots(&'static self) -> &'static [NotificationSlot] {
        &self.slots
    }

    /// Next slot the consumer will read.
    pub fn index(&self) -> usize {
        self.index.load(Ordering::Acquire)
    }

    /// Zero-fills every slot and rewinds the consumer. Only valid while no center is registered.
    pub fn clear(&self) {
        for slot in &self.slots {
            slot.reset();
        }
        self.index.store(0, Ordering::Release);
    }

    fn current(&self) -> (usize, &NotificationSlot) {
        let idx = self.index() % RING_SLOTS;
        (idx, &self.slots[idx])
    }
}

impl Default for NotificationRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Flags raised in interrupt context and consumed by the main loop.
#[derive(Default)]
pub struct CrossDomainFlags {
    /// `CHANNEL_DATA_READABLE` observed.
    pub response_ready: IrqFlag,
    /// `CHANNEL_NOT_CONNECTED` observed.
    pub channel_dropped: IrqFlag,
}

impl CrossDomainFlags {
    /// Both flags lowered.
    pub const fn new() -> Self {
        Self { response_ready: IrqFlag::new(), channel_dropped: IrqFlag::new() }
    }
}

/// What the interrupt handler did with the record at the consumer index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumedEvent {
    /// Response data ready; `response_ready` raised.
    DataReadable(NotificationRecord),
    /// Channel dropped; `channel_dropped` raised.
    ChannelNotConnected(NotificationRecord),
}

/// State shared between the interrupt handler and the main loop.
///
/// Lives in a `static` on firmware; the ring address must stay valid for as long as the host
/// holds the notification center.
pub struct IrqShared {
    ring: NotificationRing,
    flags: CrossDomainFlags,
}

impl IrqShared {
    /// Empty ring, flags lowered.
    pub const fn new() -> Self {
        Self { ring: NotificationRing::new(), flags: CrossDomainFlags::new() }
    }

    /// The ring.
    pub fn ring(&self) -> &NotificationRing {
        &self.ring
    }

    /// The cross-domain flags.
    pub fn flags(&self) -> &CrossDomainFlags {
        &self.flags
    }

    /// Storage to register with the host.
    pub fn ring_slots(&'static self) -> &'static [NotificationSlot] {
        self.ring.slots()
    }

    /// Interrupt entry point. Bind this to the notification center's IRQ.
    pub fn on_interrupt(&self) -> Option<ConsumedEvent> {
        let (idx, slot) = self.ring.current();
        let record = slot.read();
        let consumed = match record.event_kind {
            event::CHANNEL_DATA_READABLE => {
                self.flags.response_ready.raise();
                ConsumedEvent::DataReadable(record)
            }
            event::CHANNEL_NOT_CONNECTED => {
                self.flags.channel_dropped.raise();
                ConsumedEvent::ChannelNotConnected(record)
            }
            _ => return None,
        };
        self.ring.index.store((idx + 1) % RING_SLOTS, Ordering::Release);
        slot.clear_event();
        Some(consumed)
    }

    /// Record parked at the consumer index that the interrupt handler will never consume.
    ///
    /// The index cannot move past it, so later channel events stay hidden behind it. Polled
    /// from the main loop; empty and consumable slots give `None`.
    pub fn stalled_record(&self) -> Option<NotificationRecord> {
        let (_, slot) = self.ring.current();
        let record = slot.read();
        match record.event_kind {
            event::NONE | event::CHANNEL_DATA_READABLE | event::CHANNEL_NOT_CONNECTED => None,
            _ => Some(record),
        }
    }
}

impl Default for IrqShared {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> &'static IrqShared {
        Box::leak(Box::new(IrqShared::new()))
    }

    fn record(kind: u32) -> NotificationRecord {
        NotificationRecord { handle: 7, event_kind: kind, result_code: 0, tag: 3 }
    }

    #[test]
    fn readable_raises_response_flag_and_clears_slot() {
        let irq = shared();
        irq.ring_slots()[0].publish(record(event::CHANNEL_DATA_READABLE));
        assert_eq!(irq.on_interrupt(), Some(ConsumedEvent::DataReadable(record(2))));
        assert!(irq.flags().response_ready.is_raised());
        assert!(!irq.flags().channel_dropped.is_raised());
        assert_eq!(irq.ring().index(), 1);
        assert_eq!(irq.ring_slots()[0].read().event_kind, event::NONE);
    }

    #[test]
    fn not_connected_raises_drop_flag() {
        let irq = shared();
        irq.ring_slots()[0].publish(record(event::CHANNEL_NOT_CONNECTED));
        assert!(matches!(irq.on_interrupt(), Some(ConsumedEvent::ChannelNotConnected(_))));
        assert!(irq.flags().channel_dropped.take());
    }

    #[test]
    fn unrecognized_and_empty_slots_leave_index() {
        let irq = shared();
        assert_eq!(irq.on_interrupt(), None);
        irq.ring_slots()[0].publish(record(event::NETWORK_STATUS_CHANGED));
        assert_eq!(irq.on_interrupt(), None);
        assert_eq!(irq.ring().index(), 0);
        assert!(!irq.flags().response_ready.is_raised());
    }

    #[test]
    fn unrecognized_head_hides_later_events() {
        let irq = shared();
        assert_eq!(irq.stalled_record(), None);
        irq.ring_slots()[0].publish(record(event::NETWORK_STATUS_CHANGED));
        irq.ring_slots()[1].publish(record(event::CHANNEL_DATA_READABLE));
        assert_eq!(irq.on_interrupt(), None);
        assert!(!irq.flags().response_ready.is_raised());
        assert_eq!(irq.stalled_record(), Some(record(event::NETWORK_STATUS_CHANGED)));
        irq.ring_slots()[0].reset();
        assert_eq!(irq.stalled_record(), None);
    }

    #[test]
    fn consumed_slot_is_not_replayed() {
        let irq = shared();
        irq.ring_slots()[0].publish(record(event::CHANNEL_DATA_READABLE));
        assert!(irq.on_interrupt().is_some());
        irq.flags().response_ready.lower();
        assert_eq!(irq.on_interrupt(), None);
        assert!(!irq.flags().response_ready.is_raised());
    }

    #[test]
    fn index_wraps_at_capacity() {
        let irq = shared();
        for i in 0..RING_SLOTS + 2 {
            irq.ring_slots()[i % RING_SLOTS].publish(record(event::CHANNEL_DATA_READABLE));
            assert!(irq.on_interrupt().is_some());
        }
        assert_eq!(irq.ring().index(), 2);
    }

    #[test]
    fn clear_rewinds_and_zero_fills() {
        let irq = shared();
        irq.ring_slots()[0].publish(record(event::CHANNEL_DATA_READABLE));
        irq.on_interrupt();
        irq.ring_slots()[3].publish(record(event::CHANNEL_NOT_CONNECTED));
        irq.ring().clear();
        assert_eq!(irq.ring().index(), 0);
        assert!(irq.ring_slots().iter().all(|s| s.read() == NotificationRecord::default()));
    }
}
