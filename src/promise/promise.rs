use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::mem;
use tracing::warn;

use crate::env::Environment;
use crate::error::Catch;
use crate::error::Exception;
use crate::proc::Owner;
use crate::runtime::ChainFuture;
use crate::runtime::Deferred;
use crate::runtime::Runtime;
use crate::runtime::Settle;
use crate::runtime::Step;
use crate::runtime::Task;
use crate::runtime::Value;
use crate::runtime::execute;
use crate::utils;

enum State<T>
where
  T: Value,
{
  /// Not yet handed to a runtime.
  Pending(Task<T>),
  /// Handed to a runtime; the outcome is not yet taken.
  Deferred(Box<dyn Deferred<T>>),
  /// The outcome was taken by `resolve`.
  Settled,
  /// Cancelled before the outcome was taken.
  Cancelled,
  /// Moved into another promise.
  Taken,
}

/// A handle to the eventual result of a task.
///
/// A promise starts out pending and is deferred to its environment's
/// [`Runtime`] either explicitly ([`defer`], [`spawn`]) or when it is first
/// resolved. Resolving blocks until the task has settled and takes its
/// value; a promise yields its value once.
///
/// # Chaining
///
/// [`then`], [`catch`], and [`finally`] consume the promise and return a new
/// one. Steps chained onto a pending promise become part of its task and run
/// wherever the task runs (for the fork runtime, in the child process).
/// Steps chained onto a promise that was already deferred run in the
/// process that resolves the new promise; the new promise is ready as soon
/// as the original task is.
///
/// # Dropping
///
/// A promise dropped before its value was taken is not lost: it is deferred
/// if necessary and handed to its environment's [`UnwaitedFutureManager`],
/// which awaits it when flushed. Dropping a promise in a process other than
/// the one that created it does nothing.
///
/// [`defer`]: Self::defer
/// [`spawn`]: crate::spawn
/// [`then`]: Self::then
/// [`catch`]: Self::catch
/// [`finally`]: Self::finally
/// [`UnwaitedFutureManager`]: crate::env::UnwaitedFutureManager
pub struct Promise<T>
where
  T: Value,
{
  env: Environment,
  owner: Owner,
  runtime: Option<Runtime>,
  state: State<T>,
}

impl<T> Promise<T>
where
  T: Value,
{
  // ---------------------------------------------------------------------------
  // Construction
  // ---------------------------------------------------------------------------

  /// Creates a pending promise in the global environment.
  #[inline]
  pub fn new<F>(f: F) -> Self
  where
    F: FnOnce() -> Result<T, Exception> + Send + 'static,
  {
    Self::from_task(Environment::global(), None, Box::new(move || f().map(Settle::Value)))
  }

  /// Creates a pending promise whose task may settle with another promise.
  ///
  /// Nested promises are unwrapped in a loop, up to
  /// [`MAX_NESTING_DEPTH`] levels.
  ///
  /// [`MAX_NESTING_DEPTH`]: crate::consts::MAX_NESTING_DEPTH
  #[inline]
  pub fn nested<F>(f: F) -> Self
  where
    F: FnOnce() -> Result<Settle<T>, Exception> + Send + 'static,
  {
    Self::from_task(Environment::global(), None, Box::new(f))
  }

  /// Wraps an already deferred handle.
  #[inline]
  pub fn deferred(future: Box<dyn Deferred<T>>) -> Self {
    Self::from_state(Environment::global(), None, State::Deferred(future))
  }

  #[inline]
  pub(crate) fn from_task(env: Environment, runtime: Option<Runtime>, task: Task<T>) -> Self {
    Self::from_state(env, runtime, State::Pending(task))
  }

  #[inline]
  fn from_state(env: Environment, runtime: Option<Runtime>, state: State<T>) -> Self {
    Self {
      env,
      owner: Owner::current(),
      runtime,
      state,
    }
  }

  // ---------------------------------------------------------------------------
  // State
  // ---------------------------------------------------------------------------

  /// Returns the environment this promise runs in.
  #[inline]
  pub fn env(&self) -> &Environment {
    &self.env
  }

  /// Returns the runtime the task is (or will be) deferred to.
  #[inline]
  pub fn runtime(&self) -> Runtime {
    self.runtime.unwrap_or_else(|| self.env.runtime())
  }

  /// Returns `true` if the task has not been handed to a runtime.
  #[inline]
  pub fn is_pending(&self) -> bool {
    matches!(self.state, State::Pending(_))
  }

  /// Returns `true` if the task was deferred and its value not yet taken.
  #[inline]
  pub fn is_deferred(&self) -> bool {
    matches!(self.state, State::Deferred(_))
  }

  /// Returns `true` if the value was taken by [`resolve`][Self::resolve].
  #[inline]
  pub fn is_settled(&self) -> bool {
    matches!(self.state, State::Settled)
  }

  /// Returns `true` if the promise was cancelled.
  #[inline]
  pub fn is_cancelled(&self) -> bool {
    matches!(self.state, State::Cancelled)
  }

  /// Returns `true` if [`resolve`][Self::resolve] would not block on the
  /// task.
  ///
  /// Pending promises are ready only when they will run inline.
  pub fn is_ready(&mut self) -> bool {
    match &mut self.state {
      State::Pending(_) => self.runtime.unwrap_or_else(|| self.env.runtime()) == Runtime::Sync,
      State::Deferred(future) => future.is_ready(),
      State::Settled | State::Cancelled | State::Taken => true,
    }
  }

  // ---------------------------------------------------------------------------
  // Execution
  // ---------------------------------------------------------------------------

  /// Hands the task to the runtime if it has not been already.
  ///
  /// With the fork runtime this starts the child process. Setup failures
  /// are returned here; the task is then discarded.
  pub fn defer(&mut self) -> Result<(), Exception> {
    match mem::replace(&mut self.state, State::Settled) {
      State::Pending(task) => {
        self.state = State::Deferred(self.runtime().defer(&self.env, task)?);
      }
      state => {
        self.state = state;
      }
    }

    Ok(())
  }

  /// Blocks until the task settles and takes its value.
  ///
  /// Failures of the task (including those of chained steps) are returned
  /// as they were raised. Resolving a cancelled promise, or one whose value
  /// was already taken, fails with a [`SysInv`] exception.
  ///
  /// [`SysInv`]: crate::error::ExceptionGroup::SysInv
  pub fn resolve(&mut self) -> Result<T, Exception> {
    match mem::replace(&mut self.state, State::Settled) {
      State::Pending(task) => self.runtime().defer(&self.env, task)?.wait(),
      State::Deferred(mut future) => future.wait(),
      State::Cancelled => {
        self.state = State::Cancelled;
        Err(Exception::sysinv("cannot resolve a cancelled promise"))
      }
      State::Settled | State::Taken => Err(Exception::sysinv("promise already awaited")),
    }
  }

  /// Cancels the promise.
  ///
  /// A pending task never runs. A deferred task is cancelled through its
  /// runtime: a forked child is terminated and its transport released.
  /// Returns `false` if the promise was already settled or cancelled.
  pub fn cancel(&mut self) -> bool {
    let cancelled: bool = match &mut self.state {
      State::Pending(_) => true,
      State::Deferred(future) => future.cancel(),
      State::Settled | State::Cancelled | State::Taken => false,
    };

    if cancelled {
      self.state = State::Cancelled;
    }

    cancelled
  }

  /// Runs the promise one step for the flattening loop.
  ///
  /// Tasks that would run inline are run here, so a chain of nested inline
  /// promises unwinds iteratively.
  pub(crate) fn step(mut self) -> Result<Settle<T>, Exception> {
    match mem::replace(&mut self.state, State::Taken) {
      State::Pending(task) if self.runtime() == Runtime::Sync => utils::catch_unwind(task),
      State::Pending(task) => self.runtime().defer(&self.env, task)?.wait().map(Settle::Value),
      State::Deferred(mut future) => future.wait().map(Settle::Value),
      State::Cancelled => Err(Exception::sysinv("cannot resolve a cancelled promise")),
      State::Settled | State::Taken => Err(Exception::sysinv("promise already awaited")),
    }
  }

  // ---------------------------------------------------------------------------
  // Chaining
  // ---------------------------------------------------------------------------

  /// Maps the value with `f` once the task succeeds.
  pub fn then<U, F>(self, f: F) -> Promise<U>
  where
    U: Value,
    F: FnOnce(T) -> Result<U, Exception> + Send + 'static,
  {
    self.chain(move |result| result.and_then(f).map(Settle::Value))
  }

  /// Continues with the promise returned by `f` once the task succeeds.
  pub fn and_then<U, F>(self, f: F) -> Promise<U>
  where
    U: Value,
    F: FnOnce(T) -> Promise<U> + Send + 'static,
  {
    self.chain(move |result| result.map(|value| Settle::Nested(f(value))))
  }

  /// Recovers from failures matching `filter`.
  ///
  /// Failures that do not match are propagated unchanged.
  pub fn catch<C, F>(self, filter: C, f: F) -> Promise<T>
  where
    C: Into<Catch>,
    F: FnOnce(Exception) -> Result<T, Exception> + Send + 'static,
  {
    let filter: Catch = filter.into();

    self.chain(move |result| match result {
      Ok(value) => Ok(Settle::Value(value)),
      Err(error) if filter.matches(&error) => f(error).map(Settle::Value),
      Err(error) => Err(error),
    })
  }

  /// Runs `f` once the task settles, whatever the outcome.
  ///
  /// The outcome is passed through unchanged unless `f` itself fails, in
  /// which case its failure replaces the outcome.
  pub fn finally<F>(self, f: F) -> Promise<T>
  where
    F: FnOnce() -> Result<(), Exception> + Send + 'static,
  {
    self.chain(move |result| {
      f()?;
      result.map(Settle::Value)
    })
  }

  fn chain<U, F>(mut self, step: F) -> Promise<U>
  where
    U: Value,
    F: FnOnce(Result<T, Exception>) -> Result<Settle<U>, Exception> + Send + 'static,
  {
    let env: Environment = self.env.clone();

    match mem::replace(&mut self.state, State::Taken) {
      State::Pending(task) => {
        Promise::from_task(env, self.runtime, Box::new(move || step(execute(task))))
      }
      State::Deferred(future) => {
        let step: Step<T, U> = Box::new(step);
        let future: Box<dyn Deferred<U>> = Box::new(ChainFuture::new(future, step));

        Promise::from_state(env, Some(Runtime::Sync), State::Deferred(future))
      }
      State::Cancelled => Promise::from_task(
        env,
        Some(Runtime::Sync),
        Box::new(move || step(Err(Exception::sysinv("cannot resolve a cancelled promise")))),
      ),
      State::Settled | State::Taken => Promise::from_task(
        env,
        Some(Runtime::Sync),
        Box::new(move || step(Err(Exception::sysinv("promise already awaited")))),
      ),
    }
  }
}

impl<T> Drop for Promise<T>
where
  T: Value,
{
  fn drop(&mut self) {
    if !self.owner.is_current() {
      return;
    }

    let future: Box<dyn Deferred<T>> = match mem::replace(&mut self.state, State::Taken) {
      State::Pending(task) => match self.runtime().defer(&self.env, task) {
        Ok(future) => future,
        Err(error) => {
          warn!(target: "splinter", %error, "failed to defer dropped promise");
          return;
        }
      },
      State::Deferred(future) => future,
      State::Settled | State::Cancelled | State::Taken => return,
    };

    self.env.manager().schedule(future);
  }
}

impl<T> Debug for Promise<T>
where
  T: Value,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    let state: &str = match self.state {
      State::Pending(_) => "pending",
      State::Deferred(_) => "deferred",
      State::Settled => "settled",
      State::Cancelled => "cancelled",
      State::Taken => "taken",
    };

    f.debug_struct("Promise")
      .field("runtime", &self.runtime())
      .field("state", &state)
      .finish()
  }
}
