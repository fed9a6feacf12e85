use std::collections::VecDeque;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::mem;
use std::time::Duration;
use tracing::debug;
use tracing::info;
use tracing::warn;
use triomphe::Arc;

use crate::error::Exception;
use crate::loom::sync::Mutex;
use crate::loom::sync::atomic::AtomicUsize;
use crate::loom::sync::atomic::Ordering;
use crate::proc::Owner;
use crate::runtime::Deferred;
use crate::runtime::Value;
use crate::utils;
use crate::utils::measure_fn;

// -----------------------------------------------------------------------------
// Unwaited Future Manager
// -----------------------------------------------------------------------------

/// Reaps futures whose promises were dropped without being awaited.
///
/// Every scheduled future is awaited (and its outcome discarded) when the
/// manager is [`run`]. This completes the side effects of fire-and-forget
/// tasks, reaps their child processes, and releases their transports.
///
/// The manager belongs to an [`Environment`]; `init::run` flushes the
/// global environment's manager on exit, and a forked child flushes its
/// own before reporting its result. A manager dropped while entries remain
/// flushes them.
///
/// [`run`]: Self::run
/// [`Environment`]: crate::env::Environment
pub struct UnwaitedFutureManager {
  owner: Owner,
  queue: Mutex<VecDeque<Entry>>,
  live: LiveCount,
}

impl UnwaitedFutureManager {
  /// Creates an empty manager.
  pub fn new() -> Self {
    Self {
      owner: Owner::current(),
      queue: Mutex::new(VecDeque::new()),
      live: LiveCount::new(),
    }
  }

  /// Schedules `future` to be awaited on the next flush.
  ///
  /// Futures that were already awaited are discarded.
  pub fn schedule<T>(&self, future: Box<dyn Deferred<T>>)
  where
    T: Value,
  {
    if future.is_awaited() {
      return;
    }

    let entry: Entry = Entry {
      owner: Owner::current(),
      future: Box::new(Discard(future)),
    };

    let queued: usize = {
      let mut queue = self.queue.lock();
      queue.push_back(entry);
      queue.len()
    };

    debug!(target: "splinter", queued, "unwaited future scheduled");
  }

  /// Awaits every scheduled future in scheduling order.
  ///
  /// Futures scheduled while the flush is running are awaited too. A
  /// failing future does not stop the flush: every failure is logged and
  /// returned.
  pub fn run(&self) -> Vec<Exception> {
    let mut reaped: usize = 0;

    let (failures, elapsed): (Vec<Exception>, Duration) = measure_fn(|| {
      let mut failures: Vec<Exception> = Vec::new();

      'flush: loop {
        let Some(mut entry) = self.queue.lock().pop_front() else {
          break 'flush;
        };

        if !entry.owner.is_current() {
          // Inherited from the parent process, which will reap it.
          mem::forget(entry);
          continue 'flush;
        }

        reaped += 1;

        if let Err(error) = utils::catch_unwind(|| entry.future.reap()) {
          warn!(target: "splinter", %error, "unwaited future failed");
          failures.push(error);
        }
      }

      failures
    });

    if reaped != 0 {
      info!(
        target: "splinter",
        reaped,
        failed = failures.len(),
        elapsed = ?elapsed,
        "unwaited futures flushed",
      );
    }

    failures
  }

  /// Returns the number of scheduled futures.
  #[inline]
  pub fn len(&self) -> usize {
    self.queue.lock().len()
  }

  /// Returns `true` if no futures are scheduled.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.queue.lock().is_empty()
  }

  /// Returns the number of forked children not yet reaped.
  #[inline]
  pub fn live_processes(&self) -> usize {
    self.live.get()
  }

  #[inline]
  pub(crate) fn live_count(&self) -> LiveCount {
    self.live.clone()
  }

  /// Forgets everything inherited from the parent process.
  ///
  /// Called first thing in a forked child: the entries belong to the
  /// parent, and releasing them here would release the parent's resources.
  pub(crate) fn detach_inherited(&self) {
    let inherited: VecDeque<Entry> = mem::take(&mut *self.queue.lock());

    mem::forget(inherited);

    self.live.reset();
  }
}

impl Default for UnwaitedFutureManager {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl Debug for UnwaitedFutureManager {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("UnwaitedFutureManager")
      .field("queued", &self.len())
      .field("live", &self.live_processes())
      .finish()
  }
}

impl Drop for UnwaitedFutureManager {
  fn drop(&mut self) {
    if self.owner.is_current() {
      let _failures: Vec<Exception> = self.run();
    } else {
      self.detach_inherited();
    }
  }
}

// -----------------------------------------------------------------------------
// Entries
// -----------------------------------------------------------------------------

struct Entry {
  owner: Owner,
  future: Box<dyn Reap>,
}

/// A type-erased future whose outcome is discarded.
trait Reap: Send {
  fn reap(&mut self) -> Result<(), Exception>;
}

struct Discard<T>(Box<dyn Deferred<T>>);

impl<T> Reap for Discard<T>
where
  T: Value,
{
  #[inline]
  fn reap(&mut self) -> Result<(), Exception> {
    self.0.wait().map(drop)
  }
}

// -----------------------------------------------------------------------------
// Live Count
// -----------------------------------------------------------------------------

/// Shared count of forked children that have not been reaped.
#[derive(Clone)]
pub(crate) struct LiveCount {
  inner: Arc<AtomicUsize>,
}

impl LiveCount {
  #[inline]
  fn new() -> Self {
    Self {
      inner: Arc::new(AtomicUsize::new(0)),
    }
  }

  #[inline]
  pub(crate) fn increment(&self) {
    self.inner.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn decrement(&self) {
    let _ignore: Result<usize, usize> = self
      .inner
      .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| count.checked_sub(1));
  }

  #[inline]
  fn get(&self) -> usize {
    self.inner.load(Ordering::Relaxed)
  }

  #[inline]
  fn reset(&self) {
    self.inner.store(0, Ordering::Relaxed);
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
