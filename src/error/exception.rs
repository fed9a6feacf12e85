use serde::Deserialize;
use serde::Serialize;
use std::any::Any;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;

use crate::error::ExceptionClass;
use crate::error::ExceptionGroup;

/// A structured exception with class, group, kind, message, and backtrace.
///
/// Exceptions are plain values: tasks return them as `Err`, or raise them
/// with the [`raise!`] macro, and the runtime carries them back to the
/// awaiting process. They serialize without their backtrace, which is
/// re-captured (disabled) on the receiving side.
///
/// # Display Format
///
/// Exceptions format as: `{class}:{kind} - {message}`
///
/// Example: `error:hedgehog - not enough hedgehogs`
///
/// [`raise!`]: crate::raise
#[derive(Serialize, Deserialize)]
pub struct Exception {
  class: ExceptionClass,
  group: ExceptionGroup,
  kind: String,
  error: String,
  cause: Option<Box<Exception>>,
  #[serde(skip, default = "Backtrace::disabled")]
  trace: Backtrace,
}

impl Exception {
  /// Creates a new exception with the given class, group, and message.
  ///
  /// The kind defaults to the group label. A backtrace is captured at the
  /// call site.
  ///
  /// # Examples
  ///
  /// ```
  /// use splinter::error::{Exception, ExceptionClass, ExceptionGroup};
  ///
  /// let exception = Exception::new(
  ///   ExceptionClass::Error,
  ///   ExceptionGroup::BadArg,
  ///   "invalid input",
  /// );
  ///
  /// assert_eq!(exception.kind(), "badarg");
  /// ```
  #[inline]
  pub fn new<T>(class: ExceptionClass, group: ExceptionGroup, error: T) -> Self
  where
    T: Display,
  {
    Self {
      class,
      group,
      kind: group.label().to_owned(),
      error: error.to_string(),
      cause: None,
      trace: Backtrace::capture(),
    }
  }

  /// Creates a user task failure labelled with `kind`.
  ///
  /// # Examples
  ///
  /// ```
  /// use splinter::error::{Exception, ExceptionGroup};
  ///
  /// let exception = Exception::task("hedgehog", "not enough hedgehogs");
  ///
  /// assert_eq!(exception.group(), ExceptionGroup::Task);
  /// assert_eq!(exception.kind(), "hedgehog");
  /// ```
  #[inline]
  pub fn task<K, T>(kind: K, error: T) -> Self
  where
    K: Into<String>,
    T: Display,
  {
    Self::new(ExceptionClass::Error, ExceptionGroup::Task, error).with_kind(kind)
  }

  /// Replaces the kind label of the exception.
  #[inline]
  pub fn with_kind<K>(mut self, kind: K) -> Self
  where
    K: Into<String>,
  {
    self.kind = kind.into();
    self
  }

  /// Attaches the exception that caused this one.
  #[inline]
  pub fn with_cause(mut self, cause: Exception) -> Self {
    self.cause = Some(Box::new(cause));
    self
  }

  /// Returns the exception's origin class.
  #[inline]
  pub const fn class(&self) -> ExceptionClass {
    self.class
  }

  /// Returns the exception's error category.
  #[inline]
  pub const fn group(&self) -> ExceptionGroup {
    self.group
  }

  /// Returns the exception's kind label.
  #[inline]
  pub fn kind(&self) -> &str {
    self.kind.as_str()
  }

  /// Returns the human-readable error message.
  #[inline]
  pub fn error(&self) -> &str {
    self.error.as_str()
  }

  /// Returns the exception that caused this one, if any.
  #[inline]
  pub fn cause(&self) -> Option<&Exception> {
    self.cause.as_deref()
  }

  /// Returns the captured backtrace.
  ///
  /// Backtrace availability depends on the `RUST_BACKTRACE` environment
  /// variable and platform support. Exceptions received from a forked
  /// child never carry a backtrace.
  #[inline]
  pub const fn trace(&self) -> &Backtrace {
    &self.trace
  }

  /// Converts a caught panic payload into an exception.
  ///
  /// Payloads raised with [`raise!`] are recovered unchanged; anything else
  /// becomes a [`Panic`]-class task failure.
  ///
  /// [`raise!`]: crate::raise
  /// [`Panic`]: ExceptionClass::Panic
  pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    let payload: Box<dyn Any + Send> = match payload.downcast::<Self>() {
      Ok(exception) => return *exception,
      Err(payload) => payload,
    };

    let error: &str = if let Some(error) = payload.downcast_ref::<&'static str>() {
      error
    } else if let Some(error) = payload.downcast_ref::<String>() {
      error.as_str()
    } else {
      "opaque panic payload"
    };

    Self::new(ExceptionClass::Panic, ExceptionGroup::Task, error).with_kind("panic")
  }

  // ---------------------------------------------------------------------------
  // Runtime Exceptions
  // ---------------------------------------------------------------------------

  #[cold]
  pub(crate) fn badarg<T>(error: T) -> Self
  where
    T: Display,
  {
    Self::new(ExceptionClass::Error, ExceptionGroup::BadArg, error)
  }

  #[cold]
  pub(crate) fn syscap<T>(error: T) -> Self
  where
    T: Display,
  {
    Self::new(ExceptionClass::Error, ExceptionGroup::SysCap, error)
  }

  #[cold]
  pub(crate) fn sysinv<T>(error: T) -> Self
  where
    T: Display,
  {
    Self::new(ExceptionClass::Error, ExceptionGroup::SysInv, error)
  }

  #[cold]
  pub(crate) fn setup<T>(error: T) -> Self
  where
    T: Display,
  {
    Self::new(ExceptionClass::Error, ExceptionGroup::Setup, error)
  }

  #[cold]
  pub(crate) fn transport<T>(error: T) -> Self
  where
    T: Display,
  {
    Self::new(ExceptionClass::Error, ExceptionGroup::Transport, error)
  }
}

impl Debug for Exception {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    Display::fmt(self, f)
  }
}

impl Display for Exception {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    write!(f, "{}:{} - {}", self.class, self.kind, self.error)?;

    if let Some(cause) = self.cause.as_deref() {
      write!(f, " (caused by {cause})")?;
    }

    Ok(())
  }
}

impl Error for Exception {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    self.cause.as_deref().map(|cause| cause as &(dyn Error + 'static))
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::error::Error;
  use std::panic;

  use crate::error::Exception;
  use crate::error::ExceptionClass;
  use crate::error::ExceptionGroup;

  #[test]
  fn test_display() {
    let exception: Exception = Exception::task("hedgehog", "not enough hedgehogs");
    assert_eq!(exception.to_string(), "error:hedgehog - not enough hedgehogs");
  }

  #[test]
  fn test_display_builtin_uses_group() {
    let exception: Exception = Exception::transport("channel closed");
    assert_eq!(exception.to_string(), "error:transport - channel closed");
  }

  #[test]
  fn test_display_cause() {
    let cause: Exception = Exception::task("boom", "first");
    let exception: Exception = Exception::badarg("outer").with_cause(cause);

    assert_eq!(exception.to_string(), "error:badarg - outer (caused by error:boom - first)");
    assert!(exception.source().is_some());
  }

  #[test]
  fn test_serde_keeps_fields() {
    let cause: Exception = Exception::task("inner", "first");
    let exception: Exception = Exception::task("outer", "second").with_cause(cause);

    let json: String = serde_json::to_string(&exception).unwrap();
    let value: Exception = serde_json::from_str(&json).unwrap();

    assert_eq!(value.class(), ExceptionClass::Error);
    assert_eq!(value.group(), ExceptionGroup::Task);
    assert_eq!(value.kind(), "outer");
    assert_eq!(value.error(), "second");
    assert_eq!(value.cause().map(Exception::kind), Some("inner"));
  }

  #[test]
  fn test_from_panic_exception_payload() {
    let payload = panic::catch_unwind(|| {
      panic::panic_any(Exception::task("hedgehog", "raised"));
    })
    .unwrap_err();

    let exception: Exception = Exception::from_panic(payload);

    assert_eq!(exception.class(), ExceptionClass::Error);
    assert_eq!(exception.kind(), "hedgehog");
  }

  #[test]
  fn test_from_panic_message_payload() {
    let payload = panic::catch_unwind(|| panic!("plain {}", "panic")).unwrap_err();
    let exception: Exception = Exception::from_panic(payload);

    assert_eq!(exception.class(), ExceptionClass::Panic);
    assert_eq!(exception.kind(), "panic");
    assert_eq!(exception.error(), "plain panic");
  }
}
