use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use tempfile::Builder;
use tempfile::PathPersistError;
use tempfile::TempPath;
use tracing::debug;
use tracing::warn;

use crate::consts;
use crate::error::Exception;
use crate::proc::Owner;

/// Temporary-file transport.
///
/// The file is created empty (mode `0600`) before the fork; the child
/// overwrites it and the parent reads it once the child has exited.
#[derive(Debug)]
pub(crate) struct FileIpc {
  owner: Owner,
  path: Option<TempPath>,
}

impl FileIpc {
  pub(crate) fn create() -> Result<Self, Exception> {
    let path: TempPath = Builder::new()
      .prefix(consts::IPC_FILE_PREFIX)
      .tempfile()
      .map_err(|error| Exception::setup(format_args!("failed to create IPC file: {error}")))?
      .into_temp_path();

    debug!(target: "splinter", path = %path.display(), "ipc file created");

    Ok(Self {
      owner: Owner::current(),
      path: Some(path),
    })
  }

  pub(crate) fn put(&mut self, payload: &[u8]) -> Result<(), Exception> {
    fs::write(self.path()?, payload)
      .map_err(|error| Exception::transport(format_args!("failed to write IPC file: {error}")))
  }

  pub(crate) fn pop(&mut self) -> Result<Vec<u8>, Exception> {
    let payload: io::Result<Vec<u8>> = fs::read(self.path()?);

    self.cleanup();

    match payload {
      Ok(payload) => Ok(payload),
      Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
      Err(error) => Err(Exception::transport(format_args!(
        "failed to read IPC file: {error}"
      ))),
    }
  }

  pub(crate) fn cleanup(&mut self) {
    let Some(path) = self.path.take() else {
      return;
    };

    if !self.owner.is_current() {
      // Only the creating process removes the file.
      let _ignore: Result<PathBuf, PathPersistError> = path.keep();
      return;
    }

    let shown: String = path.display().to_string();

    if let Err(error) = path.close() {
      warn!(target: "splinter", path = %shown, %error, "failed to remove ipc file");
    } else {
      debug!(target: "splinter", path = %shown, "ipc file removed");
    }
  }

  fn path(&self) -> Result<&Path, Exception> {
    match self.path.as_deref() {
      Some(path) => Ok(path),
      None => Err(Exception::sysinv("IPC file already consumed")),
    }
  }
}

impl Drop for FileIpc {
  fn drop(&mut self) {
    self.cleanup();
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use crate::error::ExceptionGroup;
  use crate::ipc::FileIpc;

  #[test]
  fn test_removed_after_pop() {
    let mut ipc: FileIpc = FileIpc::create().unwrap();
    let path: PathBuf = ipc.path().unwrap().to_path_buf();

    assert!(path.exists());

    ipc.put(b"payload").unwrap();

    assert_eq!(ipc.pop().unwrap(), b"payload");
    assert!(!path.exists());
  }

  #[test]
  fn test_removed_on_drop() {
    let ipc: FileIpc = FileIpc::create().unwrap();
    let path: PathBuf = ipc.path().unwrap().to_path_buf();

    drop(ipc);

    assert!(!path.exists());
  }

  #[test]
  fn test_pop_twice() {
    let mut ipc: FileIpc = FileIpc::create().unwrap();

    let _ignore: Vec<u8> = ipc.pop().unwrap();

    assert_eq!(ipc.pop().unwrap_err().group(), ExceptionGroup::SysInv);
  }

  #[test]
  fn test_file_prefix() {
    let ipc: FileIpc = FileIpc::create().unwrap();
    let name: String = ipc.path().unwrap().file_name().unwrap().to_string_lossy().into_owned();

    assert!(name.starts_with(crate::consts::IPC_FILE_PREFIX));
  }
}
