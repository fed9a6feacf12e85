use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use crate::error::Exception;
use crate::runtime::Deferred;
use crate::runtime::FutureFlags;
use crate::runtime::Task;
use crate::runtime::Value;
use crate::runtime::execute;

/// A deferred task that runs inline when first awaited.
pub struct SyncFuture<T>
where
  T: Value,
{
  task: Option<Task<T>>,
  flags: FutureFlags,
}

impl<T> SyncFuture<T>
where
  T: Value,
{
  #[inline]
  pub(crate) fn new(task: Task<T>) -> Self {
    Self {
      task: Some(task),
      flags: FutureFlags::empty(),
    }
  }
}

impl<T> Deferred<T> for SyncFuture<T>
where
  T: Value,
{
  fn wait(&mut self) -> Result<T, Exception> {
    self.flags.begin_wait()?;

    match self.task.take() {
      Some(task) => execute(task),
      None => Err(Exception::sysinv("future already awaited")),
    }
  }

  fn cancel(&mut self) -> bool {
    if !self.flags.begin_cancel() {
      return false;
    }

    self.task = None;

    true
  }

  #[inline]
  fn is_awaited(&self) -> bool {
    self.flags.contains(FutureFlags::AWAITED)
  }

  #[inline]
  fn is_ready(&mut self) -> bool {
    true
  }
}

impl<T> Debug for SyncFuture<T>
where
  T: Value,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("SyncFuture")
      .field("pending", &self.task.is_some())
      .field("flags", &self.flags)
      .finish()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::sync::atomic::AtomicUsize;
  use std::sync::atomic::Ordering;

  use crate::error::Exception;
  use crate::error::ExceptionGroup;
  use crate::runtime::Deferred;
  use crate::runtime::Settle;
  use crate::runtime::SyncFuture;

  fn counting(count: &Arc<AtomicUsize>) -> SyncFuture<usize> {
    let count: Arc<AtomicUsize> = Arc::clone(count);

    SyncFuture::new(Box::new(move || -> Result<Settle<usize>, Exception> {
      Ok(Settle::Value(count.fetch_add(1, Ordering::SeqCst) + 1))
    }))
  }

  #[test]
  fn test_lazy_execution() {
    let count: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    let mut future: SyncFuture<usize> = counting(&count);

    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(future.is_ready());
    assert_eq!(future.wait().unwrap(), 1);
    assert!(future.is_awaited());
  }

  #[test]
  fn test_wait_twice() {
    let count: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    let mut future: SyncFuture<usize> = counting(&count);

    assert_eq!(future.wait().unwrap(), 1);
    assert_eq!(future.wait().unwrap_err().group(), ExceptionGroup::SysInv);
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_cancel_before_wait() {
    let count: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    let mut future: SyncFuture<usize> = counting(&count);

    assert!(future.cancel());
    assert!(!future.cancel());
    assert_eq!(future.wait().unwrap_err().group(), ExceptionGroup::SysInv);
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn test_panic_becomes_exception() {
    let mut future: SyncFuture<u8> =
      SyncFuture::new(Box::new(|| -> Result<Settle<u8>, Exception> { panic!("boom") }));
    let error = future.wait().unwrap_err();

    assert_eq!(error.error(), "boom");
  }
}
