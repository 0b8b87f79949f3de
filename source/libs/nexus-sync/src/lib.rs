// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), no_std)]

//! CONTEXT: Single-core synchronization primitives for firmware without blocking calls
//! OWNERS: @runtime
//! PUBLIC API: SpinLock (host-lent buffers), IrqFlag (interrupt → main-loop signal)
//! INVARIANTS: IrqFlag is raised only from interrupt context and lowered only from the main loop

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A simple spin lock for environments without blocking primitives.
///
/// `T` may be unsized, so a `&'static SpinLock<[u8; N]>` coerces to `&'static SpinLock<[u8]>`.
pub struct SpinLock<T: ?Sized> {
    flag: AtomicBool,
    value: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for SpinLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            flag: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }
}

impl<T: ?Sized> SpinLock<T> {
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        while self
            .flag
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }
        SpinLockGuard { lock: self }
    }

    fn unlock(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct SpinLockGuard<'a, T: ?Sized> {
    lock: &'a SpinLock<T>,
}

impl<'a, T: ?Sized> Deref for SpinLockGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.lock.value.get() }
    }
}

impl<'a, T: ?Sized> DerefMut for SpinLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<'a, T: ?Sized> Drop for SpinLockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

/// Boolean signal crossing from interrupt context into the cooperative main loop.
///
/// Writes are partitioned: `raise` belongs to the interrupt handler, `take`/`lower` to the
/// main loop. Repeated raises before the main loop runs coalesce into one observation.
pub struct IrqFlag {
    raised: AtomicBool,
}

impl IrqFlag {
    pub const fn new() -> Self {
        Self { raised: AtomicBool::new(false) }
    }

    /// Interrupt side: mark the event as observed. Idempotent.
    #[inline]
    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Main-loop side: read without consuming.
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Main-loop side: consume the signal, returning whether it was raised.
    #[inline]
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    /// Main-loop side: drop the signal without inspecting it.
    #[inline]
    pub fn lower(&self) {
        self.raised.store(false, Ordering::Release);
    }
}

impl Default for IrqFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{IrqFlag, SpinLock};

    #[test]
    fn guard_provides_mut_access() {
        let lock = SpinLock::new(1_u32);
        {
            let mut guard = lock.lock();
            *guard += 1;
        }
        assert_eq!(*lock.lock(), 2);
    }

    #[test]
    fn unsized_lock_exposes_slice() {
        static BUF: SpinLock<[u8; 4]> = SpinLock::new([0; 4]);
        let shared: &'static SpinLock<[u8]> = &BUF;
        shared.lock()[1] = 7;
        assert_eq!(shared.lock().len(), 4);
        assert_eq!(BUF.lock()[1], 7);
    }

    #[test]
    fn flag_coalesces_repeated_raises() {
        let flag = IrqFlag::new();
        flag.raise();
        flag.raise();
        assert!(flag.is_raised());
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[test]
    fn lower_clears_without_reading() {
        let flag = IrqFlag::new();
        flag.raise();
        flag.lower();
        assert!(!flag.is_raised());
    }
}
