//! Interrupt dispatch.
//!
//! An interrupt vector can't carry a receiver, so the sampler that owns the
//! interrupt is published here by [`FastAdc::begin`](crate::FastAdc::begin)
//! and withdrawn by [`FastAdc::end`](crate::FastAdc::end). At most one is
//! armed at a time.
//!
//! ```ignore
//! #[interrupt]
//! fn ADC_IRQ_FIFO() {
//!     fast_adc::isr::dispatch();
//! }
//! ```

use core::cell::Cell;

use critical_section::Mutex;

use crate::error::AdcError;

/// Something the interrupt vector can call into.
pub trait InterruptTarget: Sync {
    fn on_interrupt(&self);

    /// Address identifying the instance.
    fn id(&self) -> *const ();
}

// Global armed sampler (Mutex protected for ISR access)
static ARMED: Mutex<Cell<Option<&'static dyn InterruptTarget>>> = Mutex::new(Cell::new(None));

/// Arm `target`. Re-arming the current target is fine; anything else while
/// armed is refused.
pub(crate) fn register(target: &'static dyn InterruptTarget) -> Result<(), AdcError> {
    let result = critical_section::with(|cs| {
        let slot = ARMED.borrow(cs);
        match slot.get() {
            Some(current) if current.id() != target.id() => Err(AdcError::AlreadyArmed),
            _ => {
                slot.set(Some(target));
                Ok(())
            }
        }
    });
    if result.is_err() {
        warn!("interrupt already owned by another sampler");
    }
    result
}

/// Disarm the target with this `id`. Returns whether it was armed.
pub(crate) fn unregister(id: *const ()) -> bool {
    critical_section::with(|cs| {
        let slot = ARMED.borrow(cs);
        match slot.get() {
            Some(current) if current.id() == id => {
                slot.set(None);
                true
            }
            _ => false,
        }
    })
}

/// Forward the interrupt to the armed sampler. Returns false if none is
/// armed.
pub fn dispatch() -> bool {
    // Copy the reference out; the target takes its own critical section.
    let target = critical_section::with(|cs| ARMED.borrow(cs).get());
    match target {
        Some(target) => {
            target.on_interrupt();
            true
        }
        None => false,
    }
}

pub fn is_armed() -> bool {
    critical_section::with(|cs| ARMED.borrow(cs).get().is_some())
}
