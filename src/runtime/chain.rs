use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use crate::error::Exception;
use crate::runtime::Deferred;
use crate::runtime::FutureFlags;
use crate::runtime::Settle;
use crate::runtime::Value;
use crate::runtime::execute;

/// A step applied to the outcome of an already deferred task.
pub(crate) type Step<T, U> =
  Box<dyn FnOnce(Result<T, Exception>) -> Result<Settle<U>, Exception> + Send + 'static>;

/// A deferred handle followed by a step that runs in the awaiting process.
///
/// Readiness and cancellation are those of the wrapped handle, so a chained
/// fork task still races on when its child finishes.
pub(crate) struct ChainFuture<T, U>
where
  U: Value,
{
  inner: Box<dyn Deferred<T>>,
  step: Option<Step<T, U>>,
  flags: FutureFlags,
}

impl<T, U> ChainFuture<T, U>
where
  T: Value,
  U: Value,
{
  #[inline]
  pub(crate) fn new(inner: Box<dyn Deferred<T>>, step: Step<T, U>) -> Self {
    Self {
      inner,
      step: Some(step),
      flags: FutureFlags::empty(),
    }
  }
}

impl<T, U> Deferred<U> for ChainFuture<T, U>
where
  T: Value,
  U: Value,
{
  fn wait(&mut self) -> Result<U, Exception> {
    self.flags.begin_wait()?;

    let Some(step) = self.step.take() else {
      return Err(Exception::sysinv("future already awaited"));
    };

    let outcome: Result<T, Exception> = self.inner.wait();

    execute(Box::new(move || step(outcome)))
  }

  fn cancel(&mut self) -> bool {
    if !self.flags.begin_cancel() {
      return false;
    }

    self.step = None;
    self.inner.cancel()
  }

  #[inline]
  fn is_awaited(&self) -> bool {
    self.flags.contains(FutureFlags::AWAITED)
  }

  #[inline]
  fn is_ready(&mut self) -> bool {
    !self.flags.is_empty() || self.inner.is_ready()
  }
}

impl<T, U> Debug for ChainFuture<T, U>
where
  U: Value,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("ChainFuture")
      .field("pending", &self.step.is_some())
      .field("flags", &self.flags)
      .finish()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
