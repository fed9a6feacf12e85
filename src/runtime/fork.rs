use serde::Deserialize;
use serde::Serialize;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::marker::PhantomData;
use tracing::Level;
use tracing::Span;
use tracing::debug;
use tracing::error;
use tracing::span;
use tracing::warn;

use crate::env::Environment;
use crate::env::LiveCount;
use crate::error::Exception;
use crate::error::ExceptionClass;
use crate::error::ExceptionGroup;
use crate::ipc::Cipher;
use crate::ipc::Ipc;
use crate::proc;
use crate::proc::ExitCode;
use crate::proc::Fork;
use crate::proc::Owner;
use crate::proc::ProcessExit;
use crate::runtime::Deferred;
use crate::runtime::FutureFlags;
use crate::runtime::Task;
use crate::runtime::Value;
use crate::runtime::execute;
use crate::runtime::flatten;
use crate::utils;

/// The outcome a child process writes to its transport.
#[derive(Serialize, Deserialize)]
enum Outcome<T> {
  Value(T),
  Error(Exception),
}

type OnReap = Box<dyn FnOnce(libc::pid_t, ProcessExit) + Send + 'static>;

// -----------------------------------------------------------------------------
// Fork Future
// -----------------------------------------------------------------------------

/// A task running in a forked child process.
///
/// Only the process that forked the child may await, cancel, or reap it; a
/// copy of this handle observed in any other process is inert.
pub struct ForkFuture<T> {
  pid: libc::pid_t,
  owner: Owner,
  ipc: Ipc,
  cipher: Option<Cipher>,
  flags: FutureFlags,
  exit: Option<ProcessExit>,
  on_reap: Option<OnReap>,
  marker: PhantomData<fn() -> T>,
}

impl<T> ForkFuture<T>
where
  T: Value,
{
  /// Returns the process id of the child.
  #[inline]
  pub const fn pid(&self) -> libc::pid_t {
    self.pid
  }

  /// Returns the child's wait status once it has been reaped.
  #[inline]
  pub const fn exit(&self) -> Option<ProcessExit> {
    self.exit
  }

  fn reap(&mut self) -> Result<ProcessExit, Exception> {
    if let Some(exit) = self.exit {
      return Ok(exit);
    }

    let exit: ProcessExit = proc::wait(self.pid)?;

    self.reaped(exit);

    Ok(exit)
  }

  fn reaped(&mut self, exit: ProcessExit) {
    self.exit = Some(exit);

    if let Some(on_reap) = self.on_reap.take() {
      on_reap(self.pid, exit);
    }
  }

  fn collect(&mut self) -> Result<Vec<u8>, Exception> {
    if self.ipc.drain_before_reap() {
      let payload: Result<Vec<u8>, Exception> = self.ipc.pop();
      self.reap()?;
      payload
    } else {
      self.reap()?;
      self.ipc.pop()
    }
  }

  fn decode(&self, payload: Vec<u8>) -> Result<T, Exception> {
    let payload: Vec<u8> = match self.cipher.as_ref() {
      Some(cipher) => cipher.decrypt(payload)?,
      None => payload,
    };

    let outcome: Outcome<T> = serde_json::from_slice(&payload).map_err(|error| {
      Exception::transport(format_args!("failed to decode task outcome: {error}"))
    })?;

    match outcome {
      Outcome::Value(value) => Ok(value),
      Outcome::Error(error) => Err(error),
    }
  }
}

impl<T> Deferred<T> for ForkFuture<T>
where
  T: Value,
{
  fn wait(&mut self) -> Result<T, Exception> {
    if !self.owner.is_current() {
      return Err(Exception::sysinv(format_args!(
        "cannot await child {} from a process that did not fork it",
        self.pid,
      )));
    }

    self.flags.begin_wait()?;

    let payload: Vec<u8> = self.collect()?;

    if payload.is_empty() {
      // The child died before writing anything.
      let exit: String = self.exit.map_or_else(|| "unknown".to_owned(), |exit| exit.to_string());

      return Err(
        Exception::new(
          ExceptionClass::Exit,
          ExceptionGroup::Transport,
          format_args!("child {} produced no result ({exit})", self.pid),
        )
        .with_kind("exit"),
      );
    }

    self.decode(payload)
  }

  fn cancel(&mut self) -> bool {
    if !self.owner.is_current() || !self.flags.begin_cancel() {
      return false;
    }

    if self.exit.is_none() {
      if !proc::terminate(self.pid) {
        warn!(target: "splinter", pid = self.pid, "failed to signal child");
      }

      if let Err(error) = self.reap() {
        warn!(target: "splinter", pid = self.pid, %error, "failed to reap cancelled child");
      }
    }

    self.ipc.cleanup();

    debug!(target: "splinter", pid = self.pid, exit = ?self.exit, "child cancelled");

    true
  }

  #[inline]
  fn is_awaited(&self) -> bool {
    self.flags.contains(FutureFlags::AWAITED)
  }

  fn is_ready(&mut self) -> bool {
    if self.exit.is_some() || !self.flags.is_empty() || !self.owner.is_current() {
      return true;
    }

    if let Some(ready) = self.ipc.poll_ready() {
      return ready;
    }

    match proc::try_wait(self.pid) {
      Ok(Some(exit)) => {
        self.reaped(exit);
        true
      }
      Ok(None) => false,
      // Let `wait` report the failure.
      Err(_) => true,
    }
  }
}

impl<T> Drop for ForkFuture<T> {
  fn drop(&mut self) {
    if !self.owner.is_current() || !self.flags.is_empty() {
      return;
    }

    // Dropped without being awaited: nothing will read the outcome.
    if self.exit.is_none() {
      let _ignore: bool = proc::terminate(self.pid);

      if let Ok(exit) = proc::wait(self.pid) {
        self.exit = Some(exit);

        if let Some(on_reap) = self.on_reap.take() {
          on_reap(self.pid, exit);
        }
      }
    }

    self.ipc.cleanup();
  }
}

impl<T> Debug for ForkFuture<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("ForkFuture")
      .field("pid", &self.pid)
      .field("transport", &self.ipc.kind())
      .field("encrypted", &self.cipher.is_some())
      .field("flags", &self.flags)
      .field("exit", &self.exit)
      .finish()
  }
}

// -----------------------------------------------------------------------------
// Fork Runtime
// -----------------------------------------------------------------------------

/// Forks a child process that runs `task`.
pub(crate) fn defer<T>(env: &Environment, task: Task<T>) -> Result<ForkFuture<T>, Exception>
where
  T: Value,
{
  let span: Span = span!(target: "splinter", Level::DEBUG, "fork::defer");
  let cipher: Option<Cipher> = env.cipher();
  let mut ipc: Ipc = Ipc::create(env.transport())?;

  match proc::fork()? {
    Fork::Child => child(env, ipc, cipher.as_ref(), task),
    Fork::Parent(pid) => {
      ipc.parent_after_fork();

      let live: LiveCount = env.manager().live_count();

      live.increment();

      debug!(
        target: "splinter",
        parent: &span,
        pid,
        transport = %ipc.kind(),
        encrypted = cipher.is_some(),
        depth = flatten::depth(),
        "child forked",
      );

      Ok(ForkFuture {
        pid,
        owner: Owner::current(),
        ipc,
        cipher,
        flags: FutureFlags::empty(),
        exit: None,
        on_reap: Some(Box::new(move |pid, exit| {
          live.decrement();
          debug!(target: "splinter", pid, %exit, "child reaped");
        })),
        marker: PhantomData,
      })
    }
  }
}

/// Runs `task` in the freshly forked child and exits.
fn child<T>(env: &Environment, mut ipc: Ipc, cipher: Option<&Cipher>, task: Task<T>) -> !
where
  T: Value,
{
  env.manager().detach_inherited();

  if let Some(global) = Environment::try_installed() {
    global.manager().detach_inherited();
  }

  let outcome: Outcome<T> = match execute(task) {
    Ok(value) => Outcome::Value(value),
    Err(error) => Outcome::Error(error),
  };

  // Reap anything the task left running before reporting.
  let _failures: Vec<Exception> = env.manager().run();

  if let Some(global) = Environment::try_installed() {
    if !global.ptr_eq(env) {
      let _failures: Vec<Exception> = global.manager().run();
    }
  }

  let result: Result<(), Exception> = utils::catch_unwind(|| {
    let payload: Vec<u8> = encode(outcome)?;

    match cipher {
      Some(cipher) => ipc.put(cipher.encrypt(&payload)?.as_bytes()),
      None => ipc.put(&payload),
    }
  });

  match result {
    Ok(()) => ExitCode::SUCCESS.exit_child(),
    Err(error) => {
      error!(
        target: "splinter",
        status = ExitCode::FAILURE_WRITE.to_i32(),
        %error,
        "failed to write task outcome",
      );

      ExitCode::FAILURE_WRITE.exit_child()
    }
  }
}

/// Serializes `outcome`, reporting a value that cannot be serialized as an
/// error outcome instead.
fn encode<T>(outcome: Outcome<T>) -> Result<Vec<u8>, Exception>
where
  T: Value,
{
  match serde_json::to_vec(&outcome) {
    Ok(payload) => Ok(payload),
    Err(error) => {
      let error: Exception =
        Exception::transport(format_args!("failed to encode task outcome: {error}"));

      serde_json::to_vec(&Outcome::<T>::Error(error))
        .map_err(|error| Exception::transport(format_args!("failed to encode task error: {error}")))
    }
  }
}
