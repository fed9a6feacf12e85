use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;

/// Exception category indicating the nature of the error.
///
/// Groups form a closed set that [`Catch`] filters match against, so
/// recovery is decided by ordinary pattern matching rather than by
/// inspecting the concrete error type.
///
/// [`Catch`]: crate::error::Catch
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ExceptionGroup {
  /// Failure of a user task.
  ///
  /// User failures carry their own [`kind`] label.
  ///
  /// [`kind`]: crate::error::Exception::kind
  Task,
  /// Invalid function argument or parameter.
  BadArg,
  /// System capacity limit exceeded.
  ///
  /// Indicates limits such as the maximum nesting depth or frame size.
  SysCap,
  /// Invalid operation for the current state.
  ///
  /// Awaiting twice, awaiting a cancelled promise, or using a closed
  /// channel end all report this group.
  SysInv,
  /// A required OS resource could not be set up.
  ///
  /// Raised synchronously when a transport, a child process, or an
  /// encryption key cannot be obtained.
  Setup,
  /// Data could not be moved across a process boundary.
  ///
  /// Covers truncated frames, undecodable payloads, and payloads that
  /// fail authentication.
  Transport,
  /// Every candidate of a combinator failed.
  Aggregate,
}

impl ExceptionGroup {
  #[inline]
  pub(crate) const fn label(&self) -> &'static str {
    match self {
      Self::Task => "task",
      Self::BadArg => "badarg",
      Self::SysCap => "syscap",
      Self::SysInv => "sysinv",
      Self::Setup => "setup",
      Self::Transport => "transport",
      Self::Aggregate => "aggregate",
    }
  }
}

impl Display for ExceptionGroup {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    match self {
      Self::Task => f.write_str("(Task) the task failed"),
      Self::BadArg => f.write_str("(BadArg) errors were found with the given argument(s)"),
      Self::SysCap => f.write_str("(SysCap) a system limit has been reached"),
      Self::SysInv => f.write_str("(SysInv) the operation is invalid in the current state"),
      Self::Setup => f.write_str("(Setup) a required resource could not be created"),
      Self::Transport => f.write_str("(Transport) data could not cross the process boundary"),
      Self::Aggregate => f.write_str("(Aggregate) every candidate failed"),
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
