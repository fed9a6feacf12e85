use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::os::fd::AsRawFd;
use std::os::fd::RawFd;
use std::os::unix::net::UnixStream;
use tracing::debug;

use crate::channel::ReadableChannel;
use crate::channel::WritableChannel;
use crate::channel::frame;
use crate::channel::select::Select;
use crate::channel::select::sealed;
use crate::error::Exception;

/// A bidirectional message channel backed by a connected socket pair.
///
/// Messages written with [`send`] are read back, in order, by [`recv`]. A
/// channel created before a task is spawned is shared with the forked
/// child, which makes it a simple way to stream values out of a running
/// task.
///
/// [`send`]: Self::send
/// [`recv`]: Self::recv
pub struct Channel {
  rx: Option<UnixStream>,
  tx: Option<UnixStream>,
}

impl Channel {
  /// Creates a new open channel.
  pub fn new() -> Result<Self, Exception> {
    let (tx, rx): (UnixStream, UnixStream) = UnixStream::pair()
      .map_err(|error| Exception::setup(format_args!("failed to create channel: {error}")))?;

    debug!(target: "splinter", tx = tx.as_raw_fd(), rx = rx.as_raw_fd(), "channel created");

    Ok(Self {
      rx: Some(rx),
      tx: Some(tx),
    })
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

  /// Splits the channel into its send and receive ends.
  ///
  /// Fails if the channel is closed.
  pub fn split(mut self) -> Result<(WritableChannel, ReadableChannel), Exception> {
    match (self.tx.take(), self.rx.take()) {
      (Some(tx), Some(rx)) => Ok((WritableChannel::new(tx), ReadableChannel::new(rx))),
      _ => Err(Exception::sysinv("cannot split a closed channel")),
    }
  }

  /// Closes both ends. Closing twice is a no-op.
  #[inline]
  pub fn close(&mut self) {
    self.tx = None;
    self.rx = None;
  }

  /// Returns `true` if the channel is closed.
  #[inline]
  pub fn is_closed(&self) -> bool {
    self.tx.is_none() && self.rx.is_none()
  }

  /// Creates a new handle to the same channel.
  ///
  /// Both handles read from and write to the same underlying pair.
  pub fn try_clone(&self) -> Result<Self, Exception> {
    let (Some(tx), Some(rx)) = (self.tx.as_ref(), self.rx.as_ref()) else {
      return Err(Exception::sysinv("cannot clone a closed channel"));
    };

    Ok(Self {
      rx: Some(clone(rx)?),
      tx: Some(clone(tx)?),
    })
  }
}

impl Debug for Channel {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("Channel")
      .field("closed", &self.is_closed())
      .finish()
  }
}

impl sealed::Sealed for Channel {}

impl Select for Channel {
  #[inline]
  fn readable_fd(&self) -> Option<RawFd> {
    self.rx.as_ref().map(AsRawFd::as_raw_fd)
  }
}

pub(crate) fn clone(stream: &UnixStream) -> Result<UnixStream, Exception> {
  stream
    .try_clone()
    .map_err(|error| Exception::setup(format_args!("failed to clone channel: {error}")))
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::channel::Channel;
  use crate::channel::ReadableChannel;
  use crate::channel::WritableChannel;
  use crate::error::ExceptionGroup;

  #[test]
  fn test_fifo() {
    let channel: Channel = Channel::new().unwrap();

    channel.send("m1").unwrap();
    channel.send("m2").unwrap();
    channel.send("m3").unwrap();

    assert_eq!(channel.recv::<String>().unwrap(), "m1");
    assert_eq!(channel.recv::<String>().unwrap(), "m2");
    assert_eq!(channel.recv::<String>().unwrap(), "m3");
  }

  #[test]
  fn test_structured_values() {
    let channel: Channel = Channel::new().unwrap();

    channel.send(&(1_u8, "two", vec![3.0_f64])).unwrap();

    let value: (u8, String, Vec<f64>) = channel.recv().unwrap();

    assert_eq!(value, (1, "two".to_owned(), vec![3.0]));
  }

  #[test]
  fn test_split() {
    let channel: Channel = Channel::new().unwrap();
    let (writer, reader): (WritableChannel, ReadableChannel) = channel.split().unwrap();

    writer.send(&42_i32).unwrap();

    assert_eq!(reader.recv::<i32>().unwrap(), 42);
  }

  #[test]
  fn test_closed() {
    let mut channel: Channel = Channel::new().unwrap();

    channel.close();
    channel.close();

    assert!(channel.is_closed());
    assert_eq!(channel.send(&1).unwrap_err().group(), ExceptionGroup::SysInv);
    assert_eq!(channel.recv::<i32>().unwrap_err().group(), ExceptionGroup::SysInv);
    assert_eq!(channel.split().unwrap_err().group(), ExceptionGroup::SysInv);
  }

  #[test]
  fn test_try_clone() {
    let channel: Channel = Channel::new().unwrap();
    let other: Channel = channel.try_clone().unwrap();

    other.send(&"shared").unwrap();

    assert_eq!(channel.recv::<String>().unwrap(), "shared");
  }

  #[test]
  fn test_recv_after_writer_closed() {
    let channel: Channel = Channel::new().unwrap();
    let (writer, reader): (WritableChannel, ReadableChannel) = channel.split().unwrap();

    writer.send(&7_u8).unwrap();
    drop(writer);

    assert_eq!(reader.recv::<u8>().unwrap(), 7);

    let error = reader.recv::<u8>().unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::Transport);
    assert_eq!(error.error(), "channel closed");
  }
}
