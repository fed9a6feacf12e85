use std::io;
use std::os::fd::RawFd;
use std::time::Duration;
use std::time::Instant;

use crate::error::Exception;

pub(crate) mod sealed {
  pub trait Sealed {}
}

/// A channel end that can be waited on with [`select`].
///
/// Implemented by [`Channel`] and [`ReadableChannel`].
///
/// [`Channel`]: crate::channel::Channel
/// [`ReadableChannel`]: crate::channel::ReadableChannel
pub trait Select: sealed::Sealed {
  /// Returns the receive end's descriptor, or `None` if it is closed.
  #[doc(hidden)]
  fn readable_fd(&self) -> Option<RawFd>;
}

/// Blocks until one of `channels` is ready to receive.
///
/// Returns the index of the first ready channel, or `None` if `timeout`
/// elapses first. A channel whose writers have all closed counts as ready;
/// receiving from it reports the closure.
///
/// Fails with a [`BadArg`] exception if `channels` is empty, or a
/// [`SysInv`] exception if any of them is closed.
///
/// [`BadArg`]: crate::error::ExceptionGroup::BadArg
/// [`SysInv`]: crate::error::ExceptionGroup::SysInv
pub fn select(
  channels: &[&dyn Select],
  timeout: Option<Duration>,
) -> Result<Option<usize>, Exception> {
  if channels.is_empty() {
    return Err(Exception::badarg("cannot select on an empty list of channels"));
  }

  let mut fds: Vec<libc::pollfd> = Vec::with_capacity(channels.len());

  for channel in channels {
    let Some(fd) = channel.readable_fd() else {
      return Err(Exception::sysinv("cannot select on a closed channel"));
    };

    fds.push(libc::pollfd {
      fd,
      events: libc::POLLIN,
      revents: 0,
    });
  }

  let deadline: Option<Instant> = timeout.map(|timeout| Instant::now() + timeout);

  'poll: loop {
    let millis: libc::c_int = match deadline {
      Some(deadline) => {
        let left: Duration = deadline.saturating_duration_since(Instant::now());
        // Round up so a sub-millisecond remainder does not spin.
        let millis: u128 = left.as_nanos().div_ceil(1_000_000);
        libc::c_int::try_from(millis).unwrap_or(libc::c_int::MAX)
      }
      None => -1,
    };

    // SAFETY: `fds` is a valid, initialized array of `fds.len()` entries.
    let ready: libc::c_int =
      unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, millis) };

    if ready == 0 {
      return Ok(None);
    }

    if ready < 0 {
      let error: io::Error = io::Error::last_os_error();

      if error.kind() == io::ErrorKind::Interrupted {
        continue 'poll;
      }

      return Err(Exception::transport(format_args!("failed to poll channels: {error}")));
    }

    let mask: libc::c_short = libc::POLLIN | libc::POLLHUP | libc::POLLERR;

    return Ok(fds.iter().position(|fd| fd.revents & mask != 0));
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use crate::channel::Channel;
  use crate::channel::ReadableChannel;
  use crate::channel::WritableChannel;
  use crate::channel::select;
  use crate::error::ExceptionGroup;

  #[test]
  fn test_select_ready_first() {
    let c1: Channel = Channel::new().unwrap();
    let c2: Channel = Channel::new().unwrap();

    c1.send("pending").unwrap();

    assert_eq!(select(&[&c1, &c2], None).unwrap(), Some(0));
  }

  #[test]
  fn test_select_ready_second() {
    let c1: Channel = Channel::new().unwrap();
    let c2: Channel = Channel::new().unwrap();

    c2.send("pending").unwrap();

    assert_eq!(select(&[&c1, &c2], Some(Duration::from_secs(1))).unwrap(), Some(1));
  }

  #[test]
  fn test_select_timeout() {
    let c1: Channel = Channel::new().unwrap();

    assert_eq!(select(&[&c1], Some(Duration::from_millis(10))).unwrap(), None);
  }

  #[test]
  fn test_select_mixed_views() {
    let c1: Channel = Channel::new().unwrap();
    let (writer, reader): (WritableChannel, ReadableChannel) =
      Channel::new().unwrap().split().unwrap();

    writer.send(&1).unwrap();

    assert_eq!(select(&[&c1, &reader], Some(Duration::ZERO)).unwrap(), Some(1));
  }

  #[test]
  fn test_select_empty() {
    let error = select(&[], None).unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::BadArg);
  }

  #[test]
  fn test_select_closed() {
    let mut c1: Channel = Channel::new().unwrap();

    c1.close();

    assert_eq!(select(&[&c1], None).unwrap_err().group(), ExceptionGroup::SysInv);
  }
}
