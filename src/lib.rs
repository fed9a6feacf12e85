//! Splinter - process-backed promises for Rust.
//!
//! Splinter runs closures in forked child processes and hands back
//! [`Promise`]s for their results. A child ships its outcome (a value or an
//! [`Exception`]) back through an IPC transport, optionally sealed with
//! authenticated encryption, and the awaiting process observes it as if
//! the closure had run inline.
//!
//! # Quick Start
//!
//! ```no_run
//! use splinter::Promise;
//!
//! splinter::init::run(|| {
//!   let a: Promise<i32> = splinter::spawn(|| Ok(1 + 2));
//!   let b: Promise<i32> = splinter::spawn(|| Ok(3 + 4));
//!
//!   assert_eq!(splinter::wait_all(vec![a, b]).unwrap(), vec![3, 7]);
//! })
//! .unwrap();
//! ```
//!
//! # Core Modules
//!
//! - [`init`]: Program entry points
//! - [`promise`]: Promises, chaining and combinators
//! - [`runtime`]: Sync and fork execution strategies
//! - [`env`]: Execution environments and configuration
//! - [`channel`]: Framed message channels
//! - [`ipc`]: Transports and payload encryption
//! - [`error`]: Exception system
//! - [`consts`]: Limits and configuration constants

#[cfg(not(unix))]
compile_error!("splinter requires a unix platform");

mod loom;
mod proc;
mod utils;

pub mod channel;
pub mod consts;
pub mod env;
pub mod error;
pub mod init;
pub mod ipc;
pub mod promise;
pub mod runtime;

pub use self::channel::Channel;
pub use self::channel::ReadableChannel;
pub use self::channel::WritableChannel;
pub use self::channel::select;
pub use self::env::EnvConfig;
pub use self::env::Environment;
pub use self::env::UnwaitedFutureManager;
pub use self::error::Exception;
pub use self::proc::ProcessExit;
pub use self::promise::Promise;
pub use self::promise::spawn;
pub use self::promise::try_spawn;
pub use self::promise::wait;
pub use self::promise::wait_all;
pub use self::runtime::Deferred;
pub use self::runtime::Runtime;
pub use self::runtime::Settle;
pub use self::runtime::Value;
