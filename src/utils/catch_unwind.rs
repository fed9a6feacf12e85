use std::panic;
use std::panic::AssertUnwindSafe;

use crate::error::Exception;

/// Invokes `f`, converting a panic into an [`Exception`].
///
/// Exceptions raised with [`raise!`] are returned unchanged.
///
/// Task closures are treated as unwind safe: a panic abandons the task, and
/// nothing it captured is observed again.
///
/// [`raise!`]: crate::raise
#[inline]
pub(crate) fn catch_unwind<F, R>(f: F) -> Result<R, Exception>
where
  F: FnOnce() -> Result<R, Exception>,
{
  match panic::catch_unwind(AssertUnwindSafe(f)) {
    Ok(result) => result,
    Err(payload) => Err(Exception::from_panic(payload)),
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::error::Exception;
  use crate::error::ExceptionClass;
  use crate::error::ExceptionGroup;
  use crate::raise;
  use crate::utils::catch_unwind;

  #[test]
  fn test_ok() {
    assert_eq!(catch_unwind(|| Ok::<_, Exception>(1)).unwrap(), 1);
  }

  #[test]
  fn test_raised() {
    let error: Exception = catch_unwind(|| -> Result<(), Exception> {
      raise!(Error, BadArg, "bad input");
    })
    .unwrap_err();

    assert_eq!(error.class(), ExceptionClass::Error);
    assert_eq!(error.group(), ExceptionGroup::BadArg);
  }

  #[test]
  fn test_panic() {
    let error: Exception = catch_unwind(|| -> Result<(), Exception> {
      panic!("oops");
    })
    .unwrap_err();

    assert_eq!(error.class(), ExceptionClass::Panic);
    assert_eq!(error.error(), "oops");
  }
}
