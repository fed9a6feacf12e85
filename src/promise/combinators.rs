use crossbeam_utils::Backoff;
use std::thread;

use crate::consts;
use crate::env::Environment;
use crate::error::Exception;
use crate::error::ExceptionClass;
use crate::error::ExceptionGroup;
use crate::promise::Promise;
use crate::runtime::Runtime;
use crate::runtime::Settle;
use crate::runtime::Value;

impl<T> Promise<T>
where
  T: Value,
{
  /// Resolves to every value, in input order.
  ///
  /// The first failure (in input order) rejects the combined promise; the
  /// remaining inputs are handed to the unwaited-future manager.
  ///
  /// Inputs are deferred immediately, so forked tasks run concurrently.
  /// The combined promise always resolves in the awaiting process.
  pub fn all(mut promises: Vec<Promise<T>>) -> Promise<Vec<T>> {
    let (env, setup): (Environment, Option<Exception>) = start(&mut promises);

    Promise::from_task(
      env,
      Some(Runtime::Sync),
      Box::new(move || {
        if let Some(error) = setup {
          return Err(error);
        }

        let mut values: Vec<T> = Vec::with_capacity(promises.len());

        for mut promise in promises {
          values.push(promise.resolve()?);
        }

        Ok(Settle::Value(values))
      }),
    )
  }

  /// Resolves to the first success, in input order.
  ///
  /// If every input fails the combined promise is rejected with an
  /// [`Aggregate`] exception caused by the first failure.
  ///
  /// [`Aggregate`]: ExceptionGroup::Aggregate
  pub fn any(mut promises: Vec<Promise<T>>) -> Promise<T> {
    let (env, setup): (Environment, Option<Exception>) = start(&mut promises);

    Promise::from_task(
      env,
      Some(Runtime::Sync),
      Box::new(move || {
        if let Some(error) = setup {
          return Err(error);
        }

        let count: usize = promises.len();
        let mut first: Option<Exception> = None;

        for mut promise in promises {
          match promise.resolve() {
            Ok(value) => return Ok(Settle::Value(value)),
            Err(error) => {
              first.get_or_insert(error);
            }
          }
        }

        let error: Exception = Exception::new(
          ExceptionClass::Error,
          ExceptionGroup::Aggregate,
          format_args!("all {count} promises were rejected"),
        );

        match first {
          Some(cause) => Err(error.with_cause(cause)),
          None => Err(error),
        }
      }),
    )
  }

  /// Settles like whichever input settles first.
  ///
  /// Forked inputs are polled for readiness; inputs that run inline are
  /// always ready, so among those the earliest in input order wins. Racing
  /// an empty list fails with a [`BadArg`] exception. The losers are handed
  /// to the unwaited-future manager.
  ///
  /// [`BadArg`]: ExceptionGroup::BadArg
  pub fn race(mut promises: Vec<Promise<T>>) -> Promise<T> {
    let (env, setup): (Environment, Option<Exception>) = start(&mut promises);

    Promise::from_task(
      env,
      Some(Runtime::Sync),
      Box::new(move || {
        let mut promises: Vec<Promise<T>> = promises;

        if promises.is_empty() {
          return Err(Exception::badarg("cannot race an empty list of promises"));
        }

        if let Some(error) = setup {
          return Err(error);
        }

        let backoff: Backoff = Backoff::new();

        'poll: loop {
          if let Some(index) = promises.iter_mut().position(|promise| promise.is_ready()) {
            break 'poll promises.swap_remove(index).resolve().map(Settle::Value);
          }

          if backoff.is_completed() {
            thread::sleep(consts::RACE_POLL_INTERVAL);
          } else {
            backoff.snooze();
          }
        }
      }),
    )
  }
}

/// Picks the environment for a combinator and defers its inputs.
///
/// Returns the first setup failure, which rejects the combined promise.
fn start<T>(promises: &mut [Promise<T>]) -> (Environment, Option<Exception>)
where
  T: Value,
{
  let env: Environment = match promises.first() {
    Some(promise) => promise.env().clone(),
    None => Environment::global(),
  };

  let setup: Option<Exception> = promises.iter_mut().find_map(|promise| promise.defer().err());

  (env, setup)
}
