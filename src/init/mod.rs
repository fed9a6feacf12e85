//! Program entry points.
//!
//! [`run`] wraps a program body: it installs the tracing subscriber, builds
//! the process-wide [`Environment`] from the process environment, runs the
//! body, and flushes every promise the body abandoned before returning.

use std::panic;
use std::panic::AssertUnwindSafe;
use std::sync::Once;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use tracing::Level;
use tracing::Span;
use tracing::debug;
use tracing::info;
use tracing::span;

use crate::env::EnvConfig;
use crate::env::Environment;
use crate::error::Exception;
use crate::utils::measure_fn;

static INIT: AtomicBool = AtomicBool::new(false);
static TRACING: Once = Once::new();

/// Runs `f` with the process-wide environment configured from the process
/// environment.
///
/// This is the same as calling `run_opts(f, EnvConfig::from_env())`.
#[inline]
pub fn run<F, R>(f: F) -> Result<R, Exception>
where
  F: FnOnce() -> R,
{
  run_opts(f, EnvConfig::from_env())
}

/// Runs `f` with a process-wide environment built from `config`.
///
/// Promises dropped by `f` without being awaited are flushed before this
/// returns, so their side effects are complete and their children reaped.
/// The previous process-wide environment is restored afterwards.
///
/// Fails with a [`SysInv`] exception if called while already running, or a
/// [`Setup`] exception if the environment cannot be built. A panic in `f`
/// resumes once the flush is done.
///
/// [`SysInv`]: crate::error::ExceptionGroup::SysInv
/// [`Setup`]: crate::error::ExceptionGroup::Setup
pub fn run_opts<F, R>(f: F, config: EnvConfig) -> Result<R, Exception>
where
  F: FnOnce() -> R,
{
  if INIT.swap(true, Ordering::SeqCst) {
    return Err(Exception::sysinv("splinter is already running"));
  }

  let _guard: Running = Running;

  TRACING.call_once(|| {
    if let Err(error) = init_tracing_subscriber(&config) {
      eprintln!("failed to set tracing subscriber:");
      eprintln!("    {}", error.error());
    }
  });

  let span: Span = span!(target: "splinter", Level::DEBUG, "init::run");
  let env: Environment = Environment::from_config(&config)?;
  let previous: Option<Environment> = Environment::install(env.clone());

  debug!(
    target: "splinter",
    parent: &span,
    runtime = %env.runtime(),
    transport = %env.transport(),
    encrypted = env.is_encrypted(),
    "running",
  );

  let result: thread::Result<R> = panic::catch_unwind(AssertUnwindSafe(f));

  let (failures, elapsed): (Vec<Exception>, Duration) = measure_fn(|| env.flush());

  info!(
    target: "splinter",
    parent: &span,
    failed = failures.len(),
    elapsed = ?elapsed,
    "system stopped",
  );

  match previous {
    Some(previous) => {
      let _current: Option<Environment> = Environment::install(previous);
    }
    None => {
      let _current: Option<Environment> = Environment::reset();
    }
  }

  match result {
    Ok(output) => Ok(output),
    Err(payload) => panic::resume_unwind(payload),
  }
}

/// Clears the running flag on every exit path.
struct Running;

impl Drop for Running {
  fn drop(&mut self) {
    INIT.store(false, Ordering::SeqCst);
  }
}

/// Builds the global tracing subscriber configuration.
#[cfg(feature = "tracing")]
fn init_tracing_subscriber(config: &EnvConfig) -> Result<(), Exception> {
  use tracing_subscriber::FmtSubscriber;
  use tracing_subscriber::fmt::format;
  use tracing_subscriber::util::SubscriberInitExt;

  FmtSubscriber::builder()
    .event_format(format().compact())
    .log_internal_errors(true)
    .with_ansi(true)
    .with_file(config.tracing_source_file)
    .with_level(true)
    .with_line_number(config.tracing_source_line)
    .with_max_level(config.tracing_filter())
    .with_target(config.tracing_source_name)
    .with_thread_ids(config.tracing_thread_info)
    .with_thread_names(config.tracing_thread_info)
    .finish()
    .try_init()
    .map_err(Exception::sysinv)
}

#[cfg(not(feature = "tracing"))]
fn init_tracing_subscriber(_config: &EnvConfig) -> Result<(), Exception> {
  Ok(())
}
