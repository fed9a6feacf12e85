use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;

/// Exception origin classification.
///
/// The class records *how* a failure reached the awaiting process, which
/// the group alone cannot tell apart: a returned error, a panic unwinding
/// out of the task, or a child that vanished without writing a result.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ExceptionClass {
  /// Failure returned from (or raised by) a task or the runtime.
  Error,
  /// A panic without an [`Exception`] payload caught at a task boundary.
  ///
  /// [`Exception`]: crate::error::Exception
  Panic,
  /// A forked child terminated without producing a result.
  Exit,
}

impl ExceptionClass {
  #[inline]
  pub(crate) const fn label(&self) -> &'static str {
    match self {
      Self::Error => "error",
      Self::Panic => "panic",
      Self::Exit => "exit",
    }
  }
}

impl Display for ExceptionClass {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    f.write_str(self.label())
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
