use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::io;
use std::io::Write;

use crate::error::Exception;

// -----------------------------------------------------------------------------
// Process Exit
// -----------------------------------------------------------------------------

/// The decoded wait status of a reaped child process.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[repr(transparent)]
pub struct ProcessExit {
  status: libc::c_int,
}

impl ProcessExit {
  #[inline]
  pub(crate) const fn from_raw(status: libc::c_int) -> Self {
    Self { status }
  }

  /// Returns the exit code if the child exited normally.
  #[inline]
  pub fn code(&self) -> Option<i32> {
    if libc::WIFEXITED(self.status) {
      Some(libc::WEXITSTATUS(self.status))
    } else {
      None
    }
  }

  /// Returns the terminating signal if the child was killed by one.
  #[inline]
  pub fn signal(&self) -> Option<i32> {
    if libc::WIFSIGNALED(self.status) {
      Some(libc::WTERMSIG(self.status))
    } else {
      None
    }
  }

  /// Returns `true` if the child exited normally with status zero.
  #[inline]
  pub fn success(&self) -> bool {
    self.code() == Some(0)
  }
}

impl Display for ProcessExit {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    match (self.code(), self.signal()) {
      (Some(code), _) => write!(f, "exited with status {code}"),
      (None, Some(signal)) => write!(f, "killed by signal {signal}"),
      (None, None) => write!(f, "terminated with raw status {}", self.status),
    }
  }
}

// -----------------------------------------------------------------------------
// Process Control
// -----------------------------------------------------------------------------

/// Which side of a `fork` the caller is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Fork {
  Child,
  Parent(libc::pid_t),
}

/// Duplicates the calling process.
///
/// Buffered stdio is flushed first so the child does not replay output
/// the parent already produced.
pub(crate) fn fork() -> Result<Fork, Exception> {
  let _ignore: io::Result<()> = io::stdout().flush();
  let _ignore: io::Result<()> = io::stderr().flush();

  // SAFETY: The child only runs the task closure and then calls `_exit`,
  //         it never returns into the caller's stack.
  match unsafe { libc::fork() } {
    -1 => Err(Exception::setup(format_args!(
      "failed to fork process: {}",
      io::Error::last_os_error(),
    ))),
    0 => Ok(Fork::Child),
    pid => Ok(Fork::Parent(pid)),
  }
}

/// Blocks until the child `pid` terminates and reaps it.
pub(crate) fn wait(pid: libc::pid_t) -> Result<ProcessExit, Exception> {
  'wait: loop {
    match waitpid(pid, 0) {
      Ok(Some(exit)) => break 'wait Ok(exit),
      Ok(None) => continue 'wait,
      Err(error) if error.kind() == io::ErrorKind::Interrupted => continue 'wait,
      Err(error) => break 'wait Err(wait_error(pid, error)),
    }
  }
}

/// Reaps the child `pid` if it has already terminated.
pub(crate) fn try_wait(pid: libc::pid_t) -> Result<Option<ProcessExit>, Exception> {
  'wait: loop {
    match waitpid(pid, libc::WNOHANG) {
      Ok(exit) => break 'wait Ok(exit),
      Err(error) if error.kind() == io::ErrorKind::Interrupted => continue 'wait,
      Err(error) => break 'wait Err(wait_error(pid, error)),
    }
  }
}

/// Sends `SIGTERM` to the child `pid`.
///
/// Returns `false` if the signal could not be delivered, which includes a
/// child that already exited and was reaped.
#[inline]
pub(crate) fn terminate(pid: libc::pid_t) -> bool {
  // SAFETY: `kill` has no memory-safety preconditions.
  unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

fn waitpid(pid: libc::pid_t, options: libc::c_int) -> io::Result<Option<ProcessExit>> {
  let mut status: libc::c_int = 0;

  // SAFETY: `status` is a valid, writable `c_int`.
  match unsafe { libc::waitpid(pid, &mut status, options) } {
    -1 => Err(io::Error::last_os_error()),
    0 => Ok(None),
    _ => Ok(Some(ProcessExit::from_raw(status))),
  }
}

#[cold]
fn wait_error(pid: libc::pid_t, error: io::Error) -> Exception {
  Exception::sysinv(format_args!("failed to wait for child {pid}: {error}"))
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::proc::ProcessExit;

  #[test]
  fn test_exit_code() {
    // Exit status 3: `status = 3 << 8`.
    let exit: ProcessExit = ProcessExit::from_raw(3 << 8);

    assert_eq!(exit.code(), Some(3));
    assert_eq!(exit.signal(), None);
    assert!(!exit.success());
    assert_eq!(exit.to_string(), "exited with status 3");
  }

  #[test]
  fn test_exit_signal() {
    let exit: ProcessExit = ProcessExit::from_raw(libc::SIGKILL);

    assert_eq!(exit.code(), None);
    assert_eq!(exit.signal(), Some(libc::SIGKILL));
    assert_eq!(exit.to_string(), format!("killed by signal {}", libc::SIGKILL));
  }

  #[test]
  fn test_exit_success() {
    assert!(ProcessExit::from_raw(0).success());
  }
}
