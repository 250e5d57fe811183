//! Snapshot-consistent sharing between two execution contexts.
//!
//! A control loop running on a second core or a timer interrupt owns the
//! write side of its channels; the main loop applies commands and reads
//! snapshots for status reports. Every access happens inside a critical
//! section, so the main loop never observes a half-updated channel.
//!
//! The contract is snapshot consistency, not fine-grained locking: keep
//! closures short and never block inside them.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::shared::Shared;
//!
//! let counter = Shared::new(0u32);
//! counter.with(|c| *c += 1);
//! assert_eq!(counter.with(|c| *c), 1);
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

/// A value accessed only under a critical section.
///
/// `Shared<T>` is `Sync` whenever `T: Send`, so it can live in a `static`
/// or be leaked to `&'static` and handed to another context.
pub struct Shared<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> Shared<T> {
    /// Wrap a value.
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Run `f` with exclusive access inside a critical section.
    ///
    /// # Panics
    ///
    /// If called re-entrantly from inside another `with` on the same value.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Unwrap the value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner().into_inner()
    }
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> core::fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Shared").finish_non_exhaustive()
    }
}
