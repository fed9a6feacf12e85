#[cfg(not(loom))]
pub(crate) mod export {
  pub(crate) mod sync {
    pub(crate) use parking_lot::Mutex;

    pub(crate) mod atomic {
      pub(crate) use std::sync::atomic::AtomicUsize;
      pub(crate) use std::sync::atomic::Ordering;
    }
  }
}

#[cfg(loom)]
pub(crate) mod export {
  pub(crate) mod sync {
    use loom::sync::MutexGuard;
    use std::sync::PoisonError;

    /// A loom mutex with the `parking_lot` locking signature.
    #[derive(Debug)]
    pub(crate) struct Mutex<T> {
      inner: loom::sync::Mutex<T>,
    }

    impl<T> Mutex<T> {
      #[inline]
      pub(crate) fn new(value: T) -> Self {
        Self {
          inner: loom::sync::Mutex::new(value),
        }
      }

      #[inline]
      pub(crate) fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
      }
    }

    pub(crate) mod atomic {
      pub(crate) use loom::sync::atomic::AtomicUsize;
      pub(crate) use loom::sync::atomic::Ordering;
    }
  }
}

#[doc(inline)]
pub(crate) use self::export::*;
