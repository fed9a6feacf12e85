//! Inter-process result transports.
//!
//! A forked child hands its serialized outcome back to the parent through
//! exactly one transport resource, created before the fork:
//!
//! - [`TransportKind::File`]: a uniquely named temporary file.
//! - [`TransportKind::Pipe`]: an anonymous pipe, drained before the child
//!   is reaped so large payloads never deadlock.
//! - [`TransportKind::Shm`]: a System V shared-memory segment keyed by a
//!   random 31-bit identifier.
//!
//! Every transport has a single writer (the child) and a single reader (the
//! parent), and its resource is released exactly once: after the payload
//! is consumed, on cancellation, or when the owning handle is dropped.
//! Copies inherited by other processes never release anything.
//!
//! Payloads may be sealed with a [`Cipher`] before they are written.

mod cipher;
mod file;
mod keys;
mod pipe;
mod shm;

use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::str::FromStr;

use crate::error::Exception;

pub use self::cipher::Cipher;
pub use self::keys::KeySource;
pub use self::keys::KeyStatus;
pub use self::keys::SecurityLevel;
pub use self::keys::validate_setup;

pub(crate) use self::file::FileIpc;
pub(crate) use self::keys::resolve;
pub(crate) use self::pipe::PipeIpc;
pub(crate) use self::shm::ShmIpc;

// -----------------------------------------------------------------------------
// Transport Kind
// -----------------------------------------------------------------------------

/// The transport used to carry results out of forked children.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
  /// Temporary file in the system temp directory.
  #[default]
  File,
  /// Anonymous pipe.
  Pipe,
  /// System V shared-memory segment.
  Shm,
}

impl TransportKind {
  /// Returns the lowercase name of the transport.
  #[inline]
  pub const fn as_str(&self) -> &'static str {
    match self {
      Self::File => "file",
      Self::Pipe => "pipe",
      Self::Shm => "shm",
    }
  }
}

impl Display for TransportKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.write_str(self.as_str())
  }
}

impl FromStr for TransportKind {
  type Err = Exception;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value.trim().to_ascii_lowercase().as_str() {
      "file" => Ok(Self::File),
      "pipe" => Ok(Self::Pipe),
      "shm" => Ok(Self::Shm),
      _ => Err(Exception::badarg(format_args!("unknown transport: {value:?}"))),
    }
  }
}

// -----------------------------------------------------------------------------
// IPC Handle
// -----------------------------------------------------------------------------

/// A transport resource shared by one forked child and its parent.
#[derive(Debug)]
pub(crate) enum Ipc {
  File(FileIpc),
  Pipe(PipeIpc),
  Shm(ShmIpc),
}

impl Ipc {
  /// Allocates a fresh transport resource of the given kind.
  pub(crate) fn create(kind: TransportKind) -> Result<Self, Exception> {
    match kind {
      TransportKind::File => FileIpc::create().map(Self::File),
      TransportKind::Pipe => PipeIpc::create().map(Self::Pipe),
      TransportKind::Shm => ShmIpc::create().map(Self::Shm),
    }
  }

  #[inline]
  pub(crate) const fn kind(&self) -> TransportKind {
    match self {
      Self::File(_) => TransportKind::File,
      Self::Pipe(_) => TransportKind::Pipe,
      Self::Shm(_) => TransportKind::Shm,
    }
  }

  /// Returns `true` if the payload must be read before the child is reaped.
  ///
  /// A pipe has bounded capacity: a child writing more than the kernel
  /// buffer blocks until the parent reads.
  #[inline]
  pub(crate) const fn drain_before_reap(&self) -> bool {
    matches!(self, Self::Pipe(_))
  }

  /// Releases the parent's copy of the child-only side of the resource.
  #[inline]
  pub(crate) fn parent_after_fork(&mut self) {
    if let Self::Pipe(pipe) = self {
      pipe.close_writer();
    }
  }

  /// Writes the payload. Called exactly once, in the child.
  pub(crate) fn put(&mut self, payload: &[u8]) -> Result<(), Exception> {
    match self {
      Self::File(file) => file.put(payload),
      Self::Pipe(pipe) => pipe.put(payload),
      Self::Shm(shm) => shm.put(payload),
    }
  }

  /// Reads the payload and releases the resource. Called in the parent.
  ///
  /// Returns an empty buffer if the child never wrote anything.
  pub(crate) fn pop(&mut self) -> Result<Vec<u8>, Exception> {
    match self {
      Self::File(file) => file.pop(),
      Self::Pipe(pipe) => pipe.pop(),
      Self::Shm(shm) => shm.pop(),
    }
  }

  /// Returns `Some(true)` if a blocking [`pop`] would return immediately.
  ///
  /// Transports that can only be read after the child exits return `None`;
  /// callers probe the child process instead.
  ///
  /// [`pop`]: Self::pop
  pub(crate) fn poll_ready(&self) -> Option<bool> {
    match self {
      Self::File(_) => None,
      Self::Pipe(pipe) => Some(pipe.poll_ready()),
      Self::Shm(_) => None,
    }
  }

  /// Releases the resource without reading it.
  pub(crate) fn cleanup(&mut self) {
    match self {
      Self::File(file) => file.cleanup(),
      Self::Pipe(pipe) => pipe.cleanup(),
      Self::Shm(shm) => shm.cleanup(),
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::error::ExceptionGroup;
  use crate::ipc::Ipc;
  use crate::ipc::TransportKind;
  use crate::proc;
  use crate::proc::ExitCode;
  use crate::proc::Fork;

  #[test]
  fn test_transport_kind_parse() {
    assert_eq!("file".parse::<TransportKind>().unwrap(), TransportKind::File);
    assert_eq!(" Pipe ".parse::<TransportKind>().unwrap(), TransportKind::Pipe);
    assert_eq!("SHM".parse::<TransportKind>().unwrap(), TransportKind::Shm);
  }

  #[test]
  fn test_transport_kind_parse_unknown() {
    let error = "socket".parse::<TransportKind>().unwrap_err();
    assert_eq!(error.group(), ExceptionGroup::BadArg);
  }

  #[test]
  fn test_transport_kind_display() {
    assert_eq!(TransportKind::File.to_string(), "file");
    assert_eq!(TransportKind::Pipe.to_string(), "pipe");
    assert_eq!(TransportKind::Shm.to_string(), "shm");
  }

  #[test]
  fn test_handoff_from_child() {
    for kind in [TransportKind::File, TransportKind::Pipe, TransportKind::Shm] {
      let mut ipc: Ipc = Ipc::create(kind).unwrap();

      assert_eq!(ipc.kind(), kind);

      match proc::fork().unwrap() {
        Fork::Child => match ipc.put(b"hello") {
          Ok(()) => ExitCode::SUCCESS.exit_child(),
          Err(_) => ExitCode::FAILURE_WRITE.exit_child(),
        },
        Fork::Parent(pid) => {
          ipc.parent_after_fork();

          let payload: Vec<u8> = if ipc.drain_before_reap() {
            let payload: Vec<u8> = ipc.pop().unwrap();
            assert!(proc::wait(pid).unwrap().success());
            payload
          } else {
            assert!(proc::wait(pid).unwrap().success());
            ipc.pop().unwrap()
          };

          assert_eq!(payload, b"hello", "{kind}");
        }
      }
    }
  }

  #[test]
  fn test_pipe_put_without_reader() {
    let mut ipc: Ipc = Ipc::create(TransportKind::Pipe).unwrap();

    // The writer drops its own read end, as a forked child does.
    let error = ipc.put(b"hello").unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::Transport);
  }

  #[test]
  fn test_empty_payload() {
    for kind in [TransportKind::File, TransportKind::Pipe, TransportKind::Shm] {
      let mut ipc: Ipc = Ipc::create(kind).unwrap();

      ipc.parent_after_fork();

      assert!(ipc.pop().unwrap().is_empty());
    }
  }
}
