//! Exclusive access to state shared with interrupt handlers

use core::cell::RefCell;

/// Run a closure with exclusive access to the shared value
///
/// Returns `None` while nothing has been installed.
pub trait Exclusive<T> {
    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R>;
}

/// Single-context access, used where no interrupt can intervene
impl<T> Exclusive<T> for RefCell<T> {
    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.try_borrow_mut().ok().map(|mut value| f(&mut value))
    }
}

#[cfg(target_arch = "avr")]
pub use self::avr::Shared;

#[cfg(target_arch = "avr")]
mod avr {
    use super::Exclusive;
    use avr_device::interrupt::{self, Mutex};
    use core::cell::RefCell;

    /// Global slot filled once at startup, borrowed inside critical sections
    pub struct Shared<T>(Mutex<RefCell<Option<T>>>);

    impl<T> Shared<T> {
        pub const fn new() -> Self {
            Self(Mutex::new(RefCell::new(None)))
        }

        pub fn install(&self, value: T) {
            interrupt::free(|cs| {
                self.0.borrow(cs).replace(Some(value));
            });
        }
    }

    impl<T> Exclusive<T> for Shared<T> {
        fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
            interrupt::free(|cs| {
                let mut slot = self.0.borrow(cs).try_borrow_mut().ok()?;
                slot.as_mut().map(f)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refcell_grants_access_once_at_a_time() {
        let shared = RefCell::new(1u8);
        assert_eq!(shared.with(|v| { *v += 1; *v }), Some(2));

        let nested = shared.with(|_| shared.with(|v| *v));
        assert_eq!(nested, Some(None));
    }
}
