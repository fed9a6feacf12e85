//! Execution strategies for deferred work.
//!
//! A [`Runtime`] turns a task into a [`Deferred`] handle:
//!
//! - [`Runtime::Sync`] runs the task inline, the first time it is awaited.
//! - [`Runtime::Fork`] forks a child process immediately; the child runs
//!   the task and ships the outcome back through an IPC transport.
//!
//! Either way the task's outcome is flattened: a task may settle with
//! another [`Promise`] ([`Settle::Nested`]), which is unwrapped in a loop
//! until a plain value is reached.

mod chain;
mod flatten;
mod fork;
mod sync;

use bitflags::bitflags;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::str::FromStr;

use crate::env::Environment;
use crate::error::Exception;
use crate::promise::Promise;

pub(crate) use self::chain::ChainFuture;
pub(crate) use self::chain::Step;
pub(crate) use self::flatten::execute;

pub use self::fork::ForkFuture;
pub use self::sync::SyncFuture;

// -----------------------------------------------------------------------------
// Value
// -----------------------------------------------------------------------------

/// A type that can be produced by a task.
///
/// Values may cross a process boundary, so they must round-trip through
/// `serde`.
pub trait Value: Serialize + DeserializeOwned + Send + 'static {}

impl<T> Value for T where T: Serialize + DeserializeOwned + Send + 'static {}

// -----------------------------------------------------------------------------
// Settle
// -----------------------------------------------------------------------------

/// The result of running a task body once.
pub enum Settle<T>
where
  T: Value,
{
  /// The task produced a plain value.
  Value(T),
  /// The task produced another promise that must be resolved in turn.
  Nested(Promise<T>),
}

impl<T> From<Promise<T>> for Settle<T>
where
  T: Value,
{
  #[inline]
  fn from(other: Promise<T>) -> Self {
    Self::Nested(other)
  }
}

/// A boxed task body.
pub(crate) type Task<T> = Box<dyn FnOnce() -> Result<Settle<T>, Exception> + Send + 'static>;

// -----------------------------------------------------------------------------
// Deferred
// -----------------------------------------------------------------------------

/// A handle to the eventual outcome of one deferred task.
pub trait Deferred<T>: Send {
  /// Blocks until the outcome is available and takes it.
  ///
  /// A handle yields its outcome once: awaiting again, or awaiting a
  /// cancelled handle, fails with a [`SysInv`] exception.
  ///
  /// [`SysInv`]: crate::error::ExceptionGroup::SysInv
  fn wait(&mut self) -> Result<T, Exception>;

  /// Cancels the task if it has not been awaited.
  ///
  /// Returns `false` if the handle was already awaited or cancelled.
  fn cancel(&mut self) -> bool;

  /// Returns `true` once [`wait`][Self::wait] has been called.
  fn is_awaited(&self) -> bool;

  /// Returns `true` if [`wait`][Self::wait] would not block on the task.
  fn is_ready(&mut self) -> bool;
}

bitflags! {
  #[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
  pub(crate) struct FutureFlags: u8 {
    const AWAITED = 1 << 0;
    const CANCELLED = 1 << 1;
  }
}

impl FutureFlags {
  /// Marks the handle awaited, failing if it cannot be awaited.
  pub(crate) fn begin_wait(&mut self) -> Result<(), Exception> {
    if self.contains(Self::CANCELLED) {
      return Err(Exception::sysinv("cannot await a cancelled future"));
    }

    if self.contains(Self::AWAITED) {
      return Err(Exception::sysinv("future already awaited"));
    }

    self.insert(Self::AWAITED);

    Ok(())
  }

  /// Marks the handle cancelled, returning `false` if it is settled.
  pub(crate) fn begin_cancel(&mut self) -> bool {
    if self.intersects(Self::AWAITED | Self::CANCELLED) {
      return false;
    }

    self.insert(Self::CANCELLED);

    true
  }
}

// -----------------------------------------------------------------------------
// Runtime
// -----------------------------------------------------------------------------

/// The strategy used to execute deferred tasks.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
  /// Run tasks inline in the awaiting process.
  Sync,
  /// Run each task in its own forked child process.
  Fork,
}

impl Runtime {
  /// Returns the preferred runtime for this platform.
  #[inline]
  pub fn detect() -> Self {
    if Self::fork_supported() {
      Self::Fork
    } else {
      Self::Sync
    }
  }

  /// Returns `true` if tasks can be run in forked processes.
  #[inline]
  pub const fn fork_supported() -> bool {
    cfg!(all(unix, not(miri), not(loom)))
  }

  /// Returns the lowercase name of the runtime.
  #[inline]
  pub const fn as_str(&self) -> &'static str {
    match self {
      Self::Sync => "sync",
      Self::Fork => "fork",
    }
  }

  /// Defers `task` according to this strategy.
  ///
  /// Setup failures (no transport, no fork) are reported here, before any
  /// handle exists.
  pub(crate) fn defer<T>(
    self,
    env: &Environment,
    task: Task<T>,
  ) -> Result<Box<dyn Deferred<T>>, Exception>
  where
    T: Value,
  {
    match self {
      Self::Sync => Ok(Box::new(SyncFuture::new(task))),
      Self::Fork => Ok(Box::new(fork::defer(env, task)?)),
    }
  }
}

impl Display for Runtime {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.write_str(self.as_str())
  }
}

impl FromStr for Runtime {
  type Err = Exception;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value.trim().to_ascii_lowercase().as_str() {
      "sync" => Ok(Self::Sync),
      "fork" => Ok(Self::Fork),
      _ => Err(Exception::badarg(format_args!("unknown runtime: {value:?}"))),
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
