//! Exception handling and error types.
//!
//! Every fallible operation in this crate reports an [`Exception`]. Tasks
//! report failures the same way, either by returning `Err(exception)` or by
//! raising one with [`raise!`]; the runtime captures the failure where the
//! task ran (possibly a forked child) and re-raises it in the awaiting
//! process.
//!
//! # Exception Model
//!
//! Exceptions carry four pieces of information:
//!
//! 1. **Class**: How the failure arrived ([`Error`], [`Panic`], [`Exit`])
//! 2. **Group**: The error category ([`Task`], [`SysInv`], [`Transport`], ...)
//! 3. **Kind**: A free-form label, user-defined for task failures
//! 4. **Description**: A human-readable error message
//!
//! [`Catch`] filters select exceptions by any of the first three.
//!
//! # Raising Exceptions
//!
//! ```
//! use splinter::raise;
//!
//! fn count_hedgehogs(count: i32) -> i32 {
//!   if count < 0 {
//!     raise!(Error, BadArg, "count must be non-negative");
//!   }
//!
//!   if count == 0 {
//!     raise!("hedgehog" => "not enough hedgehogs");
//!   }
//!
//!   count
//! }
//! ```
//!
//! [`Error`]: ExceptionClass::Error
//! [`Panic`]: ExceptionClass::Panic
//! [`Exit`]: ExceptionClass::Exit
//! [`Task`]: ExceptionGroup::Task
//! [`SysInv`]: ExceptionGroup::SysInv
//! [`Transport`]: ExceptionGroup::Transport
//!
//! [`raise!`]: crate::raise!

mod catch;
mod exception;
mod exception_class;
mod exception_group;

pub use self::catch::Catch;
pub use self::exception::Exception;
pub use self::exception_class::ExceptionClass;
pub use self::exception_group::ExceptionGroup;

// -----------------------------------------------------------------------------
// raise!
// -----------------------------------------------------------------------------

/// Raises an exception by panicking with it as the payload.
///
/// Task boundaries recover the payload unchanged, so a raised exception is
/// observed by the awaiting process exactly as if the task had returned it.
///
/// Two forms are accepted:
///
/// - `raise!(Class, Group, message)` for a runtime-style exception
/// - `raise!(kind => message)` for a user task failure labelled `kind`
///
/// # Examples
///
/// ```
/// # use splinter::raise;
/// fn register_name(name: &str) {
///   if name.is_empty() {
///     raise!(Error, BadArg, "name cannot be empty");
///   }
/// }
/// ```
#[macro_export]
macro_rules! raise {
  ($class:ident, $group:ident, $error:expr $(,)?) => {
    ::std::panic::panic_any($crate::error::Exception::new(
      $crate::error::ExceptionClass::$class,
      $crate::error::ExceptionGroup::$group,
      $error,
    ))
  };
  ($kind:expr => $error:expr $(,)?) => {
    ::std::panic::panic_any($crate::error::Exception::task($kind, $error))
  };
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
