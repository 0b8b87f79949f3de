#![cfg_attr(not(test), no_std)]

//! CONTEXT: Board collaborator traits consumed by the channel controller
//! OWNERS: @runtime
//! PUBLIC API: Platform (bring-up, liveness LED, busy-wait pause)
//! NOTE: Clock/GPIO programming lives behind these traits; the controller never touches registers.

/// Board bring-up and the few peripherals the controller drives directly.
pub trait Platform {
    /// Clock tree + GPIO initialisation. Called once before any host resource is requested.
    fn init(&mut self);

    /// Flip the user LED used as a liveness indicator.
    fn toggle_led(&mut self);

    /// Busy-wait roughly `micros` microseconds. Only used on the startup connect path.
    fn pause_us(&mut self, micros: u64);
}

impl<P: Platform + ?Sized> Platform for &mut P {
    fn init(&mut self) {
        (**self).init()
    }

    fn toggle_led(&mut self) {
        (**self).toggle_led()
    }

    fn pause_us(&mut self, micros: u64) {
        (**self).pause_us(micros)
    }
}
