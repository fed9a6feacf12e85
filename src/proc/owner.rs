use std::process;

/// The process that created a resource.
///
/// Memory is copied into forked children, so a handle may be observed from
/// a process that does not own the underlying child, file, or segment.
/// Only the owner may act on it.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct Owner {
  pid: u32,
}

impl Owner {
  /// Returns an owner stamp for the calling process.
  #[inline]
  pub(crate) fn current() -> Self {
    Self { pid: process::id() }
  }

  /// Returns `true` if the calling process is the owner.
  #[inline]
  pub(crate) fn is_current(&self) -> bool {
    self.pid == process::id()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::process;

  use crate::proc::Owner;

  #[test]
  fn test_current() {
    let owner: Owner = Owner::current();

    assert!(owner.is_current());
    assert_eq!(owner.pid, process::id());
  }

  #[test]
  fn test_foreign() {
    let owner: Owner = Owner {
      pid: process::id().wrapping_add(1),
    };

    assert!(!owner.is_current());
  }
}
