use serde::Serialize;
use std::os::unix::net::UnixStream;

use crate::channel::channel::clone;
use crate::channel::frame;
use crate::error::Exception;

/// The send end of a split [`Channel`].
///
/// [`Channel`]: crate::channel::Channel
#[derive(Debug)]
pub struct WritableChannel {
  tx: Option<UnixStream>,
}

impl WritableChannel {
  #[inline]
  pub(crate) const fn new(tx: UnixStream) -> Self {
    Self { tx: Some(tx) }
  }

  /// Sends `value` as a single frame.
  pub fn send<T>(&self, value: &T) -> Result<(), Exception>
  where
    T: Serialize + ?Sized,
  {
    let Some(tx) = self.tx.as_ref() else {
      return Err(Exception::sysinv("cannot send on a closed channel"));
    };

    frame::write(tx, value)
  }

  /// Closes the send end. Readers observe end-of-stream once every copy of
  /// the end is closed.
  #[inline]
  pub fn close(&mut self) {
    self.tx = None;
  }

  /// Returns `true` if this end is closed.
  #[inline]
  pub fn is_closed(&self) -> bool {
    self.tx.is_none()
  }

  /// Creates a new handle to the same send end.
  pub fn try_clone(&self) -> Result<Self, Exception> {
    let Some(tx) = self.tx.as_ref() else {
      return Err(Exception::sysinv("cannot clone a closed channel"));
    };

    clone(tx).map(Self::new)
  }
}
