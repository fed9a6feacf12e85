//! Promises and their combinators.
//!
//! # Examples
//!
//! ```no_run
//! let a = splinter::spawn(|| Ok(1 + 2));
//! let b = splinter::spawn(|| Ok(3 + 4));
//!
//! assert_eq!(splinter::wait_all(vec![a, b]).unwrap(), vec![3, 7]);
//!
//! let handled = splinter::spawn(|| -> Result<String, _> { splinter::raise!("boom" => "failed") })
//!   .catch("boom", |_| Ok("handled".to_owned()));
//!
//! assert_eq!(splinter::wait(handled).unwrap(), "handled");
//! ```

mod combinators;
mod promise;

pub use self::promise::Promise;

use crate::env::Environment;
use crate::error::Exception;
use crate::runtime::Value;

/// Creates a promise in the global environment and defers it immediately.
///
/// # Panics
///
/// Panics with a [`Setup`] exception if the task cannot be deferred; use
/// [`try_spawn`] to handle that case.
///
/// [`Setup`]: crate::error::ExceptionGroup::Setup
#[inline]
pub fn spawn<T, F>(f: F) -> Promise<T>
where
  T: Value,
  F: FnOnce() -> Result<T, Exception> + Send + 'static,
{
  Environment::global().spawn(f)
}

/// Creates a promise in the global environment and defers it immediately.
#[inline]
pub fn try_spawn<T, F>(f: F) -> Result<Promise<T>, Exception>
where
  T: Value,
  F: FnOnce() -> Result<T, Exception> + Send + 'static,
{
  Environment::global().try_spawn(f)
}

/// Resolves `promise`.
#[inline]
pub fn wait<T>(mut promise: Promise<T>) -> Result<T, Exception>
where
  T: Value,
{
  promise.resolve()
}

/// Resolves every promise in order, stopping at the first failure.
///
/// Promises after a failure are handed to the unwaited-future manager.
pub fn wait_all<T>(promises: Vec<Promise<T>>) -> Result<Vec<T>, Exception>
where
  T: Value,
{
  promises.into_iter().map(wait).collect()
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::sync::atomic::AtomicUsize;
  use std::sync::atomic::Ordering;

  use crate::env::Environment;
  use crate::error::Exception;
  use crate::error::ExceptionClass;
  use crate::error::ExceptionGroup;
  use crate::promise::Promise;
  use crate::promise::wait;
  use crate::promise::wait_all;
  use crate::raise;
  use crate::runtime::Runtime;
  use crate::runtime::Settle;

  fn sync() -> Environment {
    Environment::new(Runtime::Sync)
  }

  fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
  }

  #[test]
  fn test_resolve_value() {
    let env: Environment = sync();
    let promise: Promise<i32> = env.promise(|| Ok(1 + 2));

    assert_eq!(wait(promise).unwrap(), 3);
  }

  #[test]
  fn test_resolve_twice() {
    let env: Environment = sync();
    let mut promise: Promise<i32> = env.spawn(|| Ok(42));

    assert_eq!(promise.resolve().unwrap(), 42);
    assert!(promise.is_settled());
    assert_eq!(promise.resolve().unwrap_err().group(), ExceptionGroup::SysInv);
  }

  #[test]
  fn test_raised_error() {
    let env: Environment = sync();
    let promise: Promise<i32> = env.promise(|| raise!("boom" => "failed"));
    let error: Exception = wait(promise).unwrap_err();

    assert_eq!(error.kind(), "boom");
    assert_eq!(error.error(), "failed");
  }

  #[test]
  fn test_then() {
    let env: Environment = sync();
    let promise: Promise<String> = env
      .promise(|| Ok(2))
      .then(|value| Ok(value * 10))
      .then(|value| Ok(format!("{value}")));

    assert_eq!(wait(promise).unwrap(), "20");
  }

  #[test]
  fn test_then_skipped_on_error() {
    let env: Environment = sync();
    let count: Arc<AtomicUsize> = counter();
    let seen: Arc<AtomicUsize> = Arc::clone(&count);

    let promise: Promise<i32> = env
      .promise(|| Err(Exception::task("boom", "failed")))
      .then(move |value: i32| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(value)
      });

    assert_eq!(wait(promise).unwrap_err().kind(), "boom");
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn test_nested_flatten() {
    let env: Environment = sync();
    let inner: Environment = env.clone();

    let promise: Promise<i32> = env
      .nested(move || {
        let innermost: Environment = inner.clone();
        Ok(Settle::Nested(inner.nested(move || {
          Ok(Settle::Nested(innermost.promise(|| Ok(5_i32))))
        })))
      })
      .then(|value| Ok(value + 1));

    assert_eq!(wait(promise).unwrap(), 6);
  }

  #[test]
  fn test_and_then() {
    let env: Environment = sync();
    let inner: Environment = env.clone();
    let promise: Promise<i32> = env
      .promise(|| Ok(4))
      .and_then(move |value| inner.promise(move || Ok(value * value)));

    assert_eq!(wait(promise).unwrap(), 16);
  }

  #[test]
  fn test_nesting_limit() {
    fn deep(env: Environment, levels: usize) -> Promise<usize> {
      let next: Environment = env.clone();

      env.nested(move || {
        if levels == 0 {
          Ok(Settle::Value(0))
        } else {
          Ok(Settle::Nested(deep(next, levels - 1)))
        }
      })
    }

    let env: Environment = sync();

    assert_eq!(wait(deep(env.clone(), 100)).unwrap(), 0);
    assert_eq!(wait(deep(env, 1_000)).unwrap_err().group(), ExceptionGroup::SysCap);
  }

  #[test]
  fn test_catch_matching() {
    let env: Environment = sync();
    let promise: Promise<String> = env
      .promise(|| raise!("boom" => "failed"))
      .catch("boom", |_| Ok("handled".to_owned()));

    assert_eq!(wait(promise).unwrap(), "handled");
  }

  #[test]
  fn test_catch_not_matching() {
    let env: Environment = sync();
    let promise: Promise<String> = env
      .promise(|| raise!("boom" => "failed"))
      .catch(ExceptionGroup::Transport, |_| Ok("handled".to_owned()));

    let error: Exception = wait(promise).unwrap_err();

    assert_eq!(error.kind(), "boom");
  }

  #[test]
  fn test_catch_panic_class() {
    let env: Environment = sync();
    let promise: Promise<i32> = env
      .promise(|| panic!("unexpected"))
      .catch(ExceptionClass::Panic, |error| Ok(error.error().len() as i32));

    assert_eq!(wait(promise).unwrap(), 10);
  }

  #[test]
  fn test_finally_runs_once() {
    let env: Environment = sync();
    let count: Arc<AtomicUsize> = counter();

    let ok: Arc<AtomicUsize> = Arc::clone(&count);
    let promise: Promise<i32> = env.promise(|| Ok(1)).finally(move || {
      ok.fetch_add(1, Ordering::SeqCst);
      Ok(())
    });

    assert_eq!(wait(promise).unwrap(), 1);

    let err: Arc<AtomicUsize> = Arc::clone(&count);
    let promise: Promise<i32> = env.promise(|| raise!("boom" => "failed")).finally(move || {
      err.fetch_add(1, Ordering::SeqCst);
      Ok(())
    });

    assert_eq!(wait(promise).unwrap_err().kind(), "boom");
    assert_eq!(count.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn test_finally_error_supersedes() {
    let env: Environment = sync();
    let promise: Promise<i32> = env
      .promise(|| Ok(1))
      .finally(|| Err(Exception::task("cleanup", "failed")));

    assert_eq!(wait(promise).unwrap_err().kind(), "cleanup");
  }

  #[test]
  fn test_chain_after_defer() {
    let env: Environment = sync();
    let mut promise: Promise<i32> = env.promise(|| Ok(20));

    promise.defer().unwrap();

    assert!(promise.is_deferred());
    assert_eq!(wait(promise.then(|value| Ok(value + 1))).unwrap(), 21);
  }

  #[test]
  fn test_cancel_before_defer() {
    let env: Environment = sync();
    let count: Arc<AtomicUsize> = counter();
    let seen: Arc<AtomicUsize> = Arc::clone(&count);

    let mut promise: Promise<()> = env.promise(move || {
      seen.fetch_add(1, Ordering::SeqCst);
      Ok(())
    });

    assert!(promise.cancel());
    assert!(!promise.cancel());
    assert!(promise.is_cancelled());
    assert_eq!(promise.resolve().unwrap_err().group(), ExceptionGroup::SysInv);

    drop(promise);

    assert!(env.flush().is_empty());
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn test_cancel_after_resolve() {
    let env: Environment = sync();
    let mut promise: Promise<i32> = env.spawn(|| Ok(1));

    assert_eq!(promise.resolve().unwrap(), 1);
    assert!(!promise.cancel());
  }

  #[test]
  fn test_dropped_promise_runs_on_flush() {
    let env: Environment = sync();
    let count: Arc<AtomicUsize> = counter();
    let seen: Arc<AtomicUsize> = Arc::clone(&count);

    drop(env.spawn(move || {
      seen.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }));

    assert_eq!(env.manager().len(), 1);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(env.flush().is_empty());
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_all() {
    let env: Environment = sync();
    let promises: Vec<Promise<i32>> = vec![
      env.spawn(|| Ok(1)),
      env.spawn(|| Ok(2)),
      env.spawn(|| Ok(3)),
    ];

    assert_eq!(wait(Promise::all(promises)).unwrap(), vec![1, 2, 3]);
  }

  #[test]
  fn test_all_first_error() {
    let env: Environment = sync();
    let count: Arc<AtomicUsize> = counter();
    let seen: Arc<AtomicUsize> = Arc::clone(&count);

    let promises: Vec<Promise<i32>> = vec![
      env.spawn(|| Ok(1)),
      env.spawn(|| raise!("first" => "failed")),
      env.spawn(|| raise!("second" => "failed")),
      env.spawn(move || {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(4)
      }),
    ];

    let error: Exception = wait(Promise::all(promises)).unwrap_err();

    assert_eq!(error.kind(), "first");

    // The rest were handed to the manager.
    assert_eq!(env.manager().len(), 2);
    assert_eq!(env.flush().len(), 1);
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_any() {
    let env: Environment = sync();
    let promises: Vec<Promise<i32>> = vec![
      env.spawn(|| raise!("first" => "failed")),
      env.spawn(|| Ok(2)),
      env.spawn(|| Ok(3)),
    ];

    assert_eq!(wait(Promise::any(promises)).unwrap(), 2);
  }

  #[test]
  fn test_any_all_rejected() {
    let env: Environment = sync();
    let promises: Vec<Promise<i32>> = vec![
      env.spawn(|| raise!("first" => "failed")),
      env.spawn(|| raise!("second" => "failed")),
    ];

    let error: Exception = wait(Promise::any(promises)).unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::Aggregate);
    assert_eq!(error.cause().map(Exception::kind), Some("first"));
  }

  #[test]
  fn test_race_empty() {
    let error: Exception = wait(Promise::<i32>::race(Vec::new())).unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::BadArg);
  }

  #[test]
  fn test_race_sync_order() {
    let env: Environment = sync();
    let promises: Vec<Promise<i32>> = vec![env.spawn(|| Ok(1)), env.spawn(|| Ok(2))];

    assert_eq!(wait(Promise::race(promises)).unwrap(), 1);
  }

  #[test]
  fn test_wait_all() {
    let env: Environment = sync();
    let promises: Vec<Promise<i32>> = vec![env.spawn(|| Ok(1 + 2)), env.spawn(|| Ok(3 + 4))];

    assert_eq!(wait_all(promises).unwrap(), vec![3, 7]);
  }
}
