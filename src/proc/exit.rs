use crate::consts;

/// Status code a forked child reports to its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(transparent)]
pub(crate) struct ExitCode(i32);

impl ExitCode {
  /// The result was written to the transport.
  pub(crate) const SUCCESS: ExitCode = ExitCode(consts::E_CODE_SUCCESS);

  /// The result could not be written to the transport.
  pub(crate) const FAILURE_WRITE: ExitCode = ExitCode(consts::E_CODE_FAILURE_WRITE);

  /// Terminates the calling child process immediately.
  ///
  /// No destructors, `atexit` handlers, or stdio flushes run: everything in
  /// the child's address space is a copy of parent state that must not be
  /// released twice.
  #[inline]
  pub(crate) fn exit_child(self) -> ! {
    // SAFETY: `_exit` is async-signal-safe and never returns.
    unsafe { libc::_exit(self.0) }
  }

  #[inline]
  pub(crate) const fn to_i32(self) -> i32 {
    self.0
  }
}
