//! ISR-safe driver wrapper using critical sections.
//!
//! Provides [`SharedPhy`] so one [`Phy`] can be placed in a `static` and
//! reached from both thread context and interrupt handlers. All access
//! goes through `critical_section::with()`, disabling interrupts for the
//! duration of the closure; the `critical-section` implementation comes
//! from the host MCU's HAL crate.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::driver::phy::Phy;
use crate::hal::{HwLock, NoLock, RegisterBus};

/// Cell providing interior mutability with critical section protection.
///
/// Combines `critical_section::Mutex` with `RefCell` for safe mutable
/// access from both normal code and interrupt handlers.
struct CriticalSectionCell<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> CriticalSectionCell<T> {
    const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    #[inline]
    fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| {
            let mut value = self.inner.borrow_ref_mut(cs);
            f(&mut value)
        })
    }

    #[inline]
    fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| {
            self.inner
                .borrow(cs)
                .try_borrow_mut()
                .ok()
                .map(|mut value| f(&mut value))
        })
    }
}

// SAFETY: CriticalSectionCell uses critical sections to protect all access.
unsafe impl<T> Sync for CriticalSectionCell<T> {}

/// ISR-safe driver wrapper using critical sections.
///
/// # Example
///
/// ```ignore
/// static PHY: StaticCell<SharedPhy<MyBus>> = StaticCell::new();
///
/// let phy = PHY.init(SharedPhy::new(Phy::new(bus, PhyConfig::default())));
/// phy.with(|phy| {
///     phy.fw_mode(die).ok();
/// });
/// ```
pub struct SharedPhy<B: RegisterBus, L: HwLock = NoLock> {
    inner: CriticalSectionCell<Phy<B, L>>,
}

impl<B: RegisterBus, L: HwLock> SharedPhy<B, L> {
    /// Wrap a driver for shared access (const, suitable for static
    /// initialization when the bus can be built in const context).
    pub const fn new(phy: Phy<B, L>) -> Self {
        Self {
            inner: CriticalSectionCell::new(phy),
        }
    }

    /// Execute a closure with exclusive access to the driver.
    ///
    /// Interrupts are disabled for the duration of the closure.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut Phy<B, L>) -> R,
    {
        self.inner.with(f)
    }

    /// Try to execute a closure, returning `None` if already borrowed.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Phy<B, L>) -> R,
    {
        self.inner.try_with(f)
    }

    /// Consume the wrapper and return the driver.
    pub fn into_inner(self) -> Phy<B, L> {
        self.inner.inner.into_inner().into_inner()
    }
}
