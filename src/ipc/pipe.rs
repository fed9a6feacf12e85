use std::io;
use std::io::PipeReader;
use std::io::PipeWriter;
use std::io::Read;
use std::io::Write;
use std::os::fd::AsRawFd;
use tracing::debug;

use crate::error::Exception;

/// Anonymous-pipe transport.
///
/// The parent closes its copy of the write end right after the fork, so
/// reading to end-of-file completes exactly when the child (and anything
/// it forked) has closed the pipe.
#[derive(Debug)]
pub(crate) struct PipeIpc {
  reader: Option<PipeReader>,
  writer: Option<PipeWriter>,
}

impl PipeIpc {
  pub(crate) fn create() -> Result<Self, Exception> {
    let (reader, writer): (PipeReader, PipeWriter) = io::pipe()
      .map_err(|error| Exception::setup(format_args!("failed to create IPC pipe: {error}")))?;

    debug!(target: "splinter", fd = reader.as_raw_fd(), "ipc pipe created");

    Ok(Self {
      reader: Some(reader),
      writer: Some(writer),
    })
  }

  #[inline]
  pub(crate) fn close_writer(&mut self) {
    self.writer = None;
  }

  pub(crate) fn put(&mut self, payload: &[u8]) -> Result<(), Exception> {
    // The reader is not used on this side.
    self.reader = None;

    let Some(mut writer) = self.writer.take() else {
      return Err(Exception::sysinv("IPC pipe write end already closed"));
    };

    writer
      .write_all(payload)
      .and_then(|()| writer.flush())
      .map_err(|error| Exception::transport(format_args!("failed to write IPC pipe: {error}")))
  }

  pub(crate) fn pop(&mut self) -> Result<Vec<u8>, Exception> {
    self.close_writer();

    let Some(mut reader) = self.reader.take() else {
      return Err(Exception::sysinv("IPC pipe already consumed"));
    };

    let mut payload: Vec<u8> = Vec::new();

    'read: loop {
      match reader.read_to_end(&mut payload) {
        Ok(_) => break 'read Ok(payload),
        Err(error) if error.kind() == io::ErrorKind::Interrupted => continue 'read,
        Err(error) => {
          break 'read Err(Exception::transport(format_args!(
            "failed to read IPC pipe: {error}"
          )));
        }
      }
    }
  }

  pub(crate) fn poll_ready(&self) -> bool {
    let Some(reader) = self.reader.as_ref() else {
      return true;
    };

    let mut pollfd: libc::pollfd = libc::pollfd {
      fd: reader.as_raw_fd(),
      events: libc::POLLIN,
      revents: 0,
    };

    // The child writes only once its task has settled, so any readable data
    // (or a hang-up without data) means the outcome is on its way.
    //
    // SAFETY: `pollfd` is a valid array of length one.
    let ready: libc::c_int = unsafe { libc::poll(&mut pollfd, 1, 0) };

    ready > 0 && pollfd.revents & (libc::POLLIN | libc::POLLHUP) != 0
  }

  pub(crate) fn cleanup(&mut self) {
    self.reader = None;
    self.writer = None;
  }
}
