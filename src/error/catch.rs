use std::borrow::Cow;

use crate::error::Exception;
use crate::error::ExceptionClass;
use crate::error::ExceptionGroup;

/// Filter deciding which exceptions a [`Promise::catch`] handler recovers.
///
/// Non-matching exceptions propagate unchanged.
///
/// # Examples
///
/// ```
/// use splinter::error::{Catch, Exception, ExceptionGroup};
///
/// let exception = Exception::task("hedgehog", "not enough hedgehogs");
///
/// assert!(Catch::All.matches(&exception));
/// assert!(Catch::from(ExceptionGroup::Task).matches(&exception));
/// assert!(Catch::from("hedgehog").matches(&exception));
/// assert!(!Catch::from("badger").matches(&exception));
/// ```
///
/// [`Promise::catch`]: crate::promise::Promise::catch
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Catch {
  /// Matches every exception.
  All,
  /// Matches exceptions of the given class.
  Class(ExceptionClass),
  /// Matches exceptions of the given group.
  Group(ExceptionGroup),
  /// Matches exceptions with the given kind label.
  Kind(Cow<'static, str>),
}

impl Catch {
  /// Returns `true` if `exception` is recovered by this filter.
  #[inline]
  pub fn matches(&self, exception: &Exception) -> bool {
    match self {
      Self::All => true,
      Self::Class(class) => exception.class() == *class,
      Self::Group(group) => exception.group() == *group,
      Self::Kind(kind) => exception.kind() == kind,
    }
  }
}

impl From<ExceptionClass> for Catch {
  #[inline]
  fn from(other: ExceptionClass) -> Self {
    Self::Class(other)
  }
}

impl From<ExceptionGroup> for Catch {
  #[inline]
  fn from(other: ExceptionGroup) -> Self {
    Self::Group(other)
  }
}

impl From<&'static str> for Catch {
  #[inline]
  fn from(other: &'static str) -> Self {
    Self::Kind(Cow::Borrowed(other))
  }
}

impl From<String> for Catch {
  #[inline]
  fn from(other: String) -> Self {
    Self::Kind(Cow::Owned(other))
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
