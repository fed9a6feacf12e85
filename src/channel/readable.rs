use serde::de::DeserializeOwned;
use std::os::fd::AsRawFd;
use std::os::fd::RawFd;
use std::os::unix::net::UnixStream;

use crate::channel::channel::clone;
use crate::channel::frame;
use crate::channel::select::Select;
use crate::channel::select::sealed;
use crate::error::Exception;

/// The receive end of a split [`Channel`].
///
/// [`Channel`]: crate::channel::Channel
#[derive(Debug)]
pub struct ReadableChannel {
  rx: Option<UnixStream>,
}

impl ReadableChannel {
  #[inline]
  pub(crate) const fn new(rx: UnixStream) -> Self {
    Self { rx: Some(rx) }
  }

  /// Blocks until a frame arrives and decodes it.
  pub fn recv<T>(&self) -> Result<T, Exception>
  where
    T: DeserializeOwned,
  {
    let Some(rx) = self.rx.as_ref() else {
      return Err(Exception::sysinv("cannot receive on a closed channel"));
    };

    frame::read(rx)
  }

  /// Closes the receive end.
  #[inline]
  pub fn close(&mut self) {
    self.rx = None;
  }

  /// Returns `true` if this end is closed.
  #[inline]
  pub fn is_closed(&self) -> bool {
    self.rx.is_none()
  }

  /// Creates a new handle to the same receive end.
  pub fn try_clone(&self) -> Result<Self, Exception> {
    let Some(rx) = self.rx.as_ref() else {
      return Err(Exception::sysinv("cannot clone a closed channel"));
    };

    clone(rx).map(Self::new)
  }
}

impl sealed::Sealed for ReadableChannel {}

impl Select for ReadableChannel {
  #[inline]
  fn readable_fd(&self) -> Option<RawFd> {
    self.rx.as_ref().map(AsRawFd::as_raw_fd)
  }
}
