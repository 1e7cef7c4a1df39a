//! # Pool Lock
//!
//! The single coarse lock around pool allocator state.
//!
//! With the `single-threaded` feature the mutex is compiled out and replaced
//! by a `RefCell`. That makes the pool `!Sync`, so an attempt to share it
//! between threads fails to compile instead of racing.

use std::ops::DerefMut;

/// Mutual exclusion over pool state.
#[cfg(not(feature = "single-threaded"))]
#[derive(Debug)]
pub(crate) struct PoolLock<T>(parking_lot::Mutex<T>);

#[cfg(not(feature = "single-threaded"))]
impl<T> PoolLock<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self(parking_lot::const_mutex(value))
    }

    #[inline]
    pub(crate) fn lock(&self) -> impl DerefMut<Target = T> + '_ {
        self.0.lock()
    }

    #[inline]
    pub(crate) fn get_mut(&mut self) -> &mut T {
        self.0.get_mut()
    }
}

/// Unsynchronized stand-in used by single-threaded builds.
#[cfg(feature = "single-threaded")]
#[derive(Debug)]
pub(crate) struct PoolLock<T>(std::cell::RefCell<T>);

#[cfg(feature = "single-threaded")]
impl<T> PoolLock<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self(std::cell::RefCell::new(value))
    }

    #[inline]
    pub(crate) fn lock(&self) -> impl DerefMut<Target = T> + '_ {
        self.0.borrow_mut()
    }

    #[inline]
    pub(crate) fn get_mut(&mut self) -> &mut T {
        self.0.get_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_guards_value() {
        let lock = PoolLock::new(vec![1u32]);
        lock.lock().push(2);
        assert_eq!(*lock.lock(), vec![1, 2]);
    }

    #[test]
    fn test_get_mut_without_locking() {
        let mut lock = PoolLock::new(0u32);
        *lock.get_mut() += 5;
        assert_eq!(*lock.lock(), 5);
    }
}
