//! Execution environments.
//!
//! An [`Environment`] bundles everything needed to defer a task: the
//! active [`Runtime`], the IPC transport, the optional [`Cipher`], and the
//! [`UnwaitedFutureManager`] that reaps abandoned futures. Promises keep a
//! handle to the environment they were created in.
//!
//! Most code uses the process-wide environment returned by
//! [`Environment::global`], which is built from [`EnvConfig::from_env`] on
//! first use. Independent environments can be created freely, which keeps
//! tests and embedded uses isolated from one another.

mod config;
mod manager;

use parking_lot::RwLock;
use parking_lot::const_rwlock;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::panic;
use tracing::debug;
use tracing::error;
use triomphe::Arc;

use crate::error::Exception;
use crate::ipc;
use crate::ipc::Cipher;
use crate::ipc::TransportKind;
use crate::promise::Promise;
use crate::runtime::Runtime;
use crate::runtime::Settle;
use crate::runtime::Value;

pub use self::config::EnvConfig;
pub use self::manager::UnwaitedFutureManager;

pub(crate) use self::manager::LiveCount;

static GLOBAL: RwLock<Option<Environment>> = const_rwlock(None);

// -----------------------------------------------------------------------------
// Environment
// -----------------------------------------------------------------------------

struct Inner {
  runtime: RwLock<Runtime>,
  transport: RwLock<TransportKind>,
  cipher: RwLock<Option<Cipher>>,
  manager: UnwaitedFutureManager,
}

/// A shared handle to an execution environment.
///
/// Cloning is cheap; clones refer to the same environment.
#[derive(Clone)]
pub struct Environment {
  inner: Arc<Inner>,
}

impl Environment {
  /// Creates an environment using `runtime`, the file transport, and no
  /// encryption.
  pub fn new(runtime: Runtime) -> Self {
    Self {
      inner: Arc::new(Inner {
        runtime: RwLock::new(runtime),
        transport: RwLock::new(TransportKind::File),
        cipher: RwLock::new(None),
        manager: UnwaitedFutureManager::new(),
      }),
    }
  }

  /// Creates an environment from `config`.
  ///
  /// Fails with a [`Setup`] exception if the fork runtime is requested but
  /// unsupported, or if encryption is required and no key is available.
  ///
  /// [`Setup`]: crate::error::ExceptionGroup::Setup
  pub fn from_config(config: &EnvConfig) -> Result<Self, Exception> {
    let runtime: Runtime = config.runtime.unwrap_or_else(Runtime::detect);
    let this: Self = Self::new(Runtime::Sync);

    this.set_runtime(runtime)?;
    this.set_transport(config.transport);

    *this.inner.cipher.write() = ipc::resolve(config)?;

    debug!(
      target: "splinter",
      %runtime,
      transport = %config.transport,
      encrypted = this.is_encrypted(),
      "environment created",
    );

    Ok(this)
  }

  // ---------------------------------------------------------------------------
  // Global Environment
  // ---------------------------------------------------------------------------

  /// Returns the process-wide environment, creating it on first use.
  ///
  /// If the configuration from the process environment cannot be applied,
  /// the error is logged and a synchronous environment is used instead, so
  /// no payload is ever sent over an unencrypted transport that was
  /// required to be encrypted.
  pub fn global() -> Self {
    if let Some(env) = GLOBAL.read().as_ref() {
      return env.clone();
    }

    let mut global = GLOBAL.write();

    if let Some(env) = global.as_ref() {
      return env.clone();
    }

    let env: Self = match Self::from_config(&EnvConfig::from_env()) {
      Ok(env) => env,
      Err(error) => {
        error!(
          target: "splinter",
          %error,
          "failed to configure environment, falling back to the sync runtime",
        );

        Self::new(Runtime::Sync)
      }
    };

    *global = Some(env.clone());

    env
  }

  /// Replaces the process-wide environment, returning the previous one.
  pub fn install(env: Self) -> Option<Self> {
    GLOBAL.write().replace(env)
  }

  /// Returns the installed process-wide environment without creating one.
  ///
  /// Returns `None` if the lock is held, which in a forked child means it
  /// was held by a thread that no longer exists.
  pub(crate) fn try_installed() -> Option<Self> {
    GLOBAL.try_read().and_then(|global| global.clone())
  }

  /// Returns `true` if both handles refer to the same environment.
  #[inline]
  pub fn ptr_eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  /// Removes the process-wide environment, returning it.
  ///
  /// The next call to [`global`][Self::global] creates a fresh one.
  pub fn reset() -> Option<Self> {
    GLOBAL.write().take()
  }

  // ---------------------------------------------------------------------------
  // Runtime
  // ---------------------------------------------------------------------------

  /// Returns the active runtime.
  #[inline]
  pub fn runtime(&self) -> Runtime {
    *self.inner.runtime.read()
  }

  /// Switches to `runtime`.
  ///
  /// Fails with a [`Setup`] exception if forking is unsupported.
  ///
  /// [`Setup`]: crate::error::ExceptionGroup::Setup
  pub fn set_runtime(&self, runtime: Runtime) -> Result<(), Exception> {
    if runtime == Runtime::Fork && !Runtime::fork_supported() {
      return Err(Exception::setup("the fork runtime is not supported on this platform"));
    }

    *self.inner.runtime.write() = runtime;

    Ok(())
  }

  /// Switches to the sync runtime.
  #[inline]
  pub fn use_sync(&self) {
    *self.inner.runtime.write() = Runtime::Sync;
  }

  /// Switches to the fork runtime.
  #[inline]
  pub fn use_fork(&self) -> Result<(), Exception> {
    self.set_runtime(Runtime::Fork)
  }

  // ---------------------------------------------------------------------------
  // Transport
  // ---------------------------------------------------------------------------

  /// Returns the transport used by forked tasks.
  #[inline]
  pub fn transport(&self) -> TransportKind {
    *self.inner.transport.read()
  }

  /// Switches the transport used by subsequently forked tasks.
  #[inline]
  pub fn set_transport(&self, transport: TransportKind) {
    *self.inner.transport.write() = transport;
  }

  /// Derives the IPC encryption key from `secret`.
  pub fn set_encryption_key(&self, secret: &str) {
    *self.inner.cipher.write() = Some(Cipher::from_secret(secret));
  }

  /// Disables IPC encryption.
  pub fn clear_encryption_key(&self) {
    *self.inner.cipher.write() = None;
  }

  /// Returns `true` if IPC payloads are encrypted.
  #[inline]
  pub fn is_encrypted(&self) -> bool {
    self.inner.cipher.read().is_some()
  }

  #[inline]
  pub(crate) fn cipher(&self) -> Option<Cipher> {
    self.inner.cipher.read().clone()
  }

  // ---------------------------------------------------------------------------
  // Unwaited Futures
  // ---------------------------------------------------------------------------

  /// Returns the manager reaping this environment's abandoned futures.
  #[inline]
  pub fn manager(&self) -> &UnwaitedFutureManager {
    &self.inner.manager
  }

  /// Awaits every abandoned future, returning their failures.
  #[inline]
  pub fn flush(&self) -> Vec<Exception> {
    self.inner.manager.run()
  }

  // ---------------------------------------------------------------------------
  // Promises
  // ---------------------------------------------------------------------------

  /// Creates a pending promise in this environment.
  #[inline]
  pub fn promise<T, F>(&self, f: F) -> Promise<T>
  where
    T: Value,
    F: FnOnce() -> Result<T, Exception> + Send + 'static,
  {
    Promise::from_task(self.clone(), None, Box::new(move || f().map(Settle::Value)))
  }

  /// Creates a pending promise whose task may settle with another promise.
  #[inline]
  pub fn nested<T, F>(&self, f: F) -> Promise<T>
  where
    T: Value,
    F: FnOnce() -> Result<Settle<T>, Exception> + Send + 'static,
  {
    Promise::from_task(self.clone(), None, Box::new(f))
  }

  /// Creates a promise in this environment and defers it immediately.
  ///
  /// # Panics
  ///
  /// Panics with a [`Setup`] exception if the task cannot be deferred.
  ///
  /// [`Setup`]: crate::error::ExceptionGroup::Setup
  pub fn spawn<T, F>(&self, f: F) -> Promise<T>
  where
    T: Value,
    F: FnOnce() -> Result<T, Exception> + Send + 'static,
  {
    match self.try_spawn(f) {
      Ok(promise) => promise,
      Err(error) => panic::panic_any(error),
    }
  }

  /// Creates a promise in this environment and defers it immediately.
  pub fn try_spawn<T, F>(&self, f: F) -> Result<Promise<T>, Exception>
  where
    T: Value,
    F: FnOnce() -> Result<T, Exception> + Send + 'static,
  {
    let mut promise: Promise<T> = self.promise(f);

    promise.defer()?;

    Ok(promise)
  }
}

impl Debug for Environment {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("Environment")
      .field("runtime", &self.runtime())
      .field("transport", &self.transport())
      .field("encrypted", &self.is_encrypted())
      .field("manager", self.manager())
      .finish()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
