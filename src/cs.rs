//! # Critical Sections
//!
//! Scoped suppression of interrupts around state shared with an interrupt
//! handler.
//!
//! Acquiring a [`CsLock`] saves the platform's interrupt-enable state and then
//! disables interrupts. Dropping it restores the *saved* state rather than
//! unconditionally re-enabling, so nested sections compose: releasing an inner
//! lock leaves interrupts off if they were already off when it was taken.
//!
//! Which flag is used is a build-time choice (see [`DefaultFlag`]):
//!
//! - [`GlobalCs`]: whatever implementation is registered with the
//!   `critical-section` crate (the HAL's on target, `std` on host).
//! - `Primask`: the Cortex-M PRIMASK bit, with the `primask` feature. Single
//!   core parts only.
//! - [`SimFlag`]: an observable software flag for host simulation.
//!
//! A lock only ever guards this crate's own state. Data shared with other
//! contexts can be handed across threads or cores only when its flag is an
//! [`ExclusiveFlag`]; a [`SimFlag`] sampler stays on the thread that built it.
//!
//! # Usage
//! ```ignore
//! cs::with(&flag, |_lock| {
//!     // Access shared state safely
//! });
//! ```

use core::cell::{Cell, RefCell, RefMut};
use core::marker::PhantomData;

use critical_section::RestoreState;

/// A platform interrupt-enable flag.
pub trait InterruptFlag {
    /// Flag value captured at acquisition.
    type State: Copy;

    /// Capture the current flag, then disable interrupts.
    fn save_and_disable(&self) -> Self::State;

    /// Put the flag back to `state`.
    ///
    /// # Safety
    ///
    /// `state` must come from the matching `save_and_disable`, and sections
    /// must be restored in reverse order of acquisition.
    unsafe fn restore(&self, state: Self::State);
}

/// A flag whose sections exclude every other execution context.
///
/// # Safety
///
/// While any [`CsLock`] on a value of this type is held, no other thread, core
/// or interrupt handler may be inside a section on any value of the same type.
/// [`Guarded`] data is shared across contexts on the strength of this.
pub unsafe trait ExclusiveFlag: InterruptFlag {}

/// Scoped critical section. Interrupts stay disabled until this is dropped.
///
/// Guards nest; drop them in reverse order of acquisition (which plain
/// scoping does for you). Prefer [`with`] where a closure fits.
#[must_use = "interrupts are restored as soon as the lock is dropped"]
pub struct CsLock<'a, F: InterruptFlag + ?Sized> {
    flag: &'a F,
    saved: F::State,
    _not_send: PhantomData<*mut ()>,
}

impl<'a, F: InterruptFlag + ?Sized> CsLock<'a, F> {
    #[inline]
    pub fn acquire(flag: &'a F) -> Self {
        let saved = flag.save_and_disable();
        Self {
            flag,
            saved,
            _not_send: PhantomData,
        }
    }
}

impl<F: InterruptFlag + ?Sized> Drop for CsLock<'_, F> {
    #[inline]
    fn drop(&mut self) {
        // SAFETY: `saved` came from this lock's own acquisition.
        unsafe { self.flag.restore(self.saved) }
    }
}

/// Acquire a scoped critical section on `flag`.
#[inline]
pub fn acquire<F: InterruptFlag + ?Sized>(flag: &F) -> CsLock<'_, F> {
    CsLock::acquire(flag)
}

/// Run `f` with interrupts disabled, restoring the prior state afterwards on
/// every exit path.
#[inline]
pub fn with<F, R>(flag: &F, f: impl FnOnce(&CsLock<'_, F>) -> R) -> R
where
    F: InterruptFlag + ?Sized,
{
    let lock = CsLock::acquire(flag);
    f(&lock)
}

/// Data reachable only while a [`CsLock`] on an `F` flag is held.
///
/// Shareable between contexts only when `F` is an [`ExclusiveFlag`].
pub(crate) struct Guarded<T, F: ?Sized> {
    value: RefCell<T>,
    _flag: PhantomData<fn() -> *const F>,
}

impl<T, F: InterruptFlag + ?Sized> Guarded<T, F> {
    pub(crate) const fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            _flag: PhantomData,
        }
    }

    /// Mutable access for as long as `lock` is held.
    ///
    /// # Panics
    ///
    /// If already borrowed, i.e. on re-entry from an interrupt or a callback.
    pub(crate) fn borrow_mut<'a>(&'a self, _lock: &'a CsLock<'_, F>) -> RefMut<'a, T> {
        self.value.borrow_mut()
    }
}

// SAFETY: every borrow needs a live lock on an `F`, and `ExclusiveFlag` rules
// out two contexts holding one at the same time.
unsafe impl<T: Send, F: ExclusiveFlag + ?Sized> Sync for Guarded<T, F> {}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Delegates to the implementation registered with the `critical-section`
/// crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalCs;

impl InterruptFlag for GlobalCs {
    type State = RestoreState;

    #[inline]
    fn save_and_disable(&self) -> RestoreState {
        // SAFETY: paired with `release` in `restore`, in LIFO order.
        unsafe { critical_section::acquire() }
    }

    #[inline]
    unsafe fn restore(&self, state: RestoreState) {
        unsafe { critical_section::release(state) }
    }
}

// SAFETY: a registered `critical-section` implementation excludes every other
// thread, core and interrupt for the duration of a section.
unsafe impl ExclusiveFlag for GlobalCs {}

#[cfg(all(feature = "primask", target_arch = "arm"))]
pub use primask::Primask;

#[cfg(all(feature = "primask", target_arch = "arm"))]
mod primask {
    use cortex_m::interrupt;
    use cortex_m::register::primask;

    use super::{ExclusiveFlag, InterruptFlag};

    /// Cortex-M PRIMASK. Masks the current core only, so the `primask`
    /// feature is for single-core parts.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Primask;

    impl InterruptFlag for Primask {
        type State = bool;

        #[inline]
        fn save_and_disable(&self) -> bool {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        #[inline]
        unsafe fn restore(&self, was_active: bool) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }

    // SAFETY: the `primask` feature is only enabled for single-core targets,
    // where PRIMASK blocks every context that could touch guarded data.
    unsafe impl ExclusiveFlag for Primask {}
}

/// Flag used by [`FastAdc::new`](crate::FastAdc::new).
#[cfg(all(feature = "primask", target_arch = "arm"))]
pub type DefaultFlag = Primask;

/// Flag used by [`FastAdc::new`](crate::FastAdc::new).
#[cfg(not(all(feature = "primask", target_arch = "arm")))]
pub type DefaultFlag = GlobalCs;

/// Software interrupt-enable flag for host simulation.
///
/// Nothing is actually masked, so it is not an [`ExclusiveFlag`]: state it
/// guards can't be shared with another thread.
#[derive(Debug)]
pub struct SimFlag {
    enabled: Cell<bool>,
    acquisitions: Cell<u32>,
}

impl SimFlag {
    /// New flag with interrupts enabled.
    pub const fn new() -> Self {
        Self {
            enabled: Cell::new(true),
            acquisitions: Cell::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Force the flag, as firmware does with a bare enable/disable.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    /// Total number of sections entered on this flag.
    pub fn acquisitions(&self) -> u32 {
        self.acquisitions.get()
    }
}

impl Default for SimFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptFlag for SimFlag {
    type State = bool;

    fn save_and_disable(&self) -> bool {
        self.acquisitions.set(self.acquisitions.get().wrapping_add(1));
        self.enabled.replace(false)
    }

    unsafe fn restore(&self, state: bool) {
        self.enabled.set(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_disables_and_restores() {
        let flag = SimFlag::new();
        {
            let _cs = acquire(&flag);
            assert!(!flag.is_enabled());
        }
        assert!(flag.is_enabled());
        assert_eq!(flag.acquisitions(), 1);
    }

    #[test]
    fn release_does_not_enable_if_previously_disabled() {
        let flag = SimFlag::new();
        flag.set_enabled(false);
        {
            let _cs = acquire(&flag);
        }
        assert!(!flag.is_enabled());
    }

    #[test]
    fn inner_release_keeps_outer_section_closed() {
        let flag = SimFlag::new();
        let outer = acquire(&flag);
        {
            let _inner = acquire(&flag);
        }
        assert!(!flag.is_enabled());
        drop(outer);
        assert!(flag.is_enabled());
    }

    #[test]
    fn with_returns_closure_value() {
        let flag = SimFlag::new();
        let v = with(&flag, |_cs| 42);
        assert_eq!(v, 42);
        assert!(flag.is_enabled());
    }

    #[test]
    fn early_return_restores_state() {
        fn guarded(flag: &SimFlag, fail: bool) -> Result<u8, ()> {
            let _cs = acquire(flag);
            if fail {
                return Err(());
            }
            Ok(1)
        }

        let flag = SimFlag::new();
        assert_eq!(guarded(&flag, true), Err(()));
        assert!(flag.is_enabled());
        assert_eq!(guarded(&flag, false), Ok(1));
        assert!(flag.is_enabled());
    }

    #[test]
    fn guarded_value_is_reached_through_a_lock() {
        let flag = SimFlag::new();
        let cell: Guarded<u32, SimFlag> = Guarded::new(1);

        with(&flag, |lock| *cell.borrow_mut(lock) += 1);
        let lock = acquire(&flag);
        assert_eq!(*cell.borrow_mut(&lock), 2);
    }

    #[test]
    #[should_panic(expected = "already")]
    fn guarded_reentry_panics() {
        let flag = SimFlag::new();
        let cell: Guarded<u32, SimFlag> = Guarded::new(0);

        let outer = acquire(&flag);
        let _first = cell.borrow_mut(&outer);
        let inner = acquire(&flag);
        let _second = cell.borrow_mut(&inner);
    }
}
