use std::cell::Cell;

use crate::consts;
use crate::error::Exception;
use crate::runtime::Settle;
use crate::runtime::Task;
use crate::runtime::Value;
use crate::utils;

thread_local! {
  // Nested promises currently being unwrapped on this thread. A forked
  // child inherits the count of the thread that forked it.
  static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Runs `task` and unwraps nested promises until a plain value remains.
///
/// Panics raised by the task (or by any nested task run inline) are caught
/// and returned as exceptions.
pub(crate) fn execute<T>(task: Task<T>) -> Result<T, Exception>
where
  T: Value,
{
  let base: usize = DEPTH.get();
  let _reset: Reset = Reset(base);

  let mut depth: usize = base;
  let mut next: Result<Settle<T>, Exception> = utils::catch_unwind(task);

  'flatten: loop {
    match next? {
      Settle::Value(value) => break 'flatten Ok(value),
      Settle::Nested(promise) => {
        depth += 1;

        if depth > consts::MAX_NESTING_DEPTH {
          break 'flatten Err(Exception::syscap(format_args!(
            "promise nesting exceeds {} levels",
            consts::MAX_NESTING_DEPTH,
          )));
        }

        DEPTH.set(depth);

        next = promise.step();
      }
    }
  }
}

/// Returns the nesting depth of the calling thread.
#[inline]
pub(crate) fn depth() -> usize {
  DEPTH.get()
}

struct Reset(usize);

impl Drop for Reset {
  fn drop(&mut self) {
    DEPTH.set(self.0);
  }
}
