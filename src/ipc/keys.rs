//! Encryption key resolution and persistence.

use rand::RngCore;
use rand::rngs::OsRng;
use std::fs;
use std::fs::DirBuilder;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::os::unix::fs::DirBuilderExt;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;
use tracing::info;
use tracing::warn;

use crate::consts;
use crate::env::EnvConfig;
use crate::error::Exception;
use crate::ipc::Cipher;

// -----------------------------------------------------------------------------
// Key Status
// -----------------------------------------------------------------------------

/// Where the active encryption secret came from.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum KeySource {
  /// Supplied through [`EnvConfig::encryption_key`].
  Configured,
  /// Read from the persisted key file.
  KeyFile,
  /// Generated and persisted on first use.
  Generated,
  /// No key is available; payloads travel in plaintext.
  None,
}

/// Coarse rating of an encryption setup.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
  Low,
  Medium,
  High,
}

/// A report on the encryption key a configuration would use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyStatus {
  pub source: KeySource,
  pub key_length: usize,
  pub key_file: PathBuf,
  pub key_file_exists: bool,
  pub key_file_secure: bool,
  pub level: SecurityLevel,
}

/// Inspects the key setup described by `config` without generating a key.
pub fn validate_setup(config: &EnvConfig) -> KeyStatus {
  let key_file: PathBuf = key_file_path(config);

  let mut status: KeyStatus = KeyStatus {
    source: KeySource::None,
    key_length: 0,
    key_file_exists: false,
    key_file_secure: false,
    key_file: key_file.clone(),
    level: SecurityLevel::Low,
  };

  if let Some(secret) = configured_secret(config) {
    status.source = KeySource::Configured;
    status.key_length = secret.len();
    status.level = SecurityLevel::High;
  }

  if let Ok(metadata) = fs::metadata(&key_file) {
    status.key_file_exists = true;
    status.key_file_secure = metadata.permissions().mode() & 0o177 == 0;

    if status.source == KeySource::None {
      if let Some(secret) = read_key_file(&key_file) {
        status.source = KeySource::KeyFile;
        status.key_length = secret.len();
        status.level = if status.key_file_secure {
          SecurityLevel::Medium
        } else {
          SecurityLevel::Low
        };
      }
    }
  }

  status
}

// -----------------------------------------------------------------------------
// Key Resolution
// -----------------------------------------------------------------------------

/// Resolves the IPC cipher for `config`.
///
/// Sources are tried in order: the configured secret, the key file, and
/// finally a freshly generated key when auto-generation is enabled. With no
/// key available payloads are sent in plaintext, unless encryption is
/// required, in which case this fails.
pub(crate) fn resolve(config: &EnvConfig) -> Result<Option<Cipher>, Exception> {
  let key_file: PathBuf = key_file_path(config);

  let found: Option<(KeySource, String)> = if let Some(secret) = configured_secret(config) {
    Some((KeySource::Configured, secret.to_owned()))
  } else if let Some(secret) = read_key_file(&key_file) {
    Some((KeySource::KeyFile, secret))
  } else if config.auto_generate_key {
    Some((KeySource::Generated, generate(&key_file)))
  } else {
    None
  };

  if let Some((source, secret)) = found {
    info!(target: "splinter", ?source, key_length = secret.len(), "ipc encryption enabled");
    return Ok(Some(Cipher::from_secret(&secret)));
  }

  if config.require_encryption {
    return Err(Exception::setup(format_args!(
      "no encryption key available: set {} or enable {}",
      consts::ENV_ENCRYPTION_KEY,
      consts::ENV_AUTO_GENERATE_KEY,
    )));
  }

  warn!(
    target: "splinter",
    "no encryption key available, ipc payloads are not encrypted",
  );

  Ok(None)
}

/// Returns the path of the persisted key file.
#[inline]
pub(crate) fn key_file_path(config: &EnvConfig) -> PathBuf {
  config.key_dir.join(consts::KEY_FILE_NAME)
}

fn configured_secret(config: &EnvConfig) -> Option<&str> {
  let secret: &str = config.encryption_key.as_deref()?;

  if secret.len() < consts::MIN_SECRET_LEN {
    warn!(
      target: "splinter",
      length = secret.len(),
      minimum = consts::MIN_SECRET_LEN,
      "configured encryption key is too short, ignoring",
    );

    return None;
  }

  Some(secret)
}

fn read_key_file(path: &Path) -> Option<String> {
  let secret: String = fs::read_to_string(path).ok()?.trim().to_owned();

  if secret.len() < consts::MIN_SECRET_LEN {
    return None;
  }

  Some(secret)
}

/// Generates a secret and tries to persist it.
///
/// A secret that cannot be persisted is still used for this process.
fn generate(path: &Path) -> String {
  let mut bytes: [u8; consts::GENERATED_SECRET_LEN] = [0; consts::GENERATED_SECRET_LEN];

  OsRng.fill_bytes(&mut bytes);

  let secret: String = hex::encode(bytes);

  match persist(path, &secret) {
    Ok(()) => {
      info!(target: "splinter", path = %path.display(), "encryption key generated");
      secret
    }
    Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
      // Another process won the race; use its key.
      read_key_file(path).unwrap_or(secret)
    }
    Err(error) => {
      warn!(
        target: "splinter",
        path = %path.display(),
        %error,
        "failed to persist generated encryption key",
      );

      secret
    }
  }
}

fn persist(path: &Path, secret: &str) -> io::Result<()> {
  if let Some(parent) = path.parent() {
    DirBuilder::new().recursive(true).mode(0o700).create(parent)?;
  }

  let mut file: File = OpenOptions::new()
    .write(true)
    .create_new(true)
    .mode(0o600)
    .open(path)?;

  file.write_all(secret.as_bytes())?;
  file.sync_all()
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::fs;
  use std::os::unix::fs::PermissionsExt;
  use tempfile::TempDir;

  use crate::consts;
  use crate::env::EnvConfig;
  use crate::error::ExceptionGroup;
  use crate::ipc::KeySource;
  use crate::ipc::KeyStatus;
  use crate::ipc::SecurityLevel;
  use crate::ipc::keys;
  use crate::ipc::validate_setup;

  const SECRET: &str = "0123456789abcdef0123456789abcdef";

  fn config(dir: &TempDir) -> EnvConfig {
    let mut config: EnvConfig = EnvConfig::new();
    config.key_dir = dir.path().join("keys");
    config
  }

  #[test]
  fn test_configured_secret() {
    let dir: TempDir = TempDir::new().unwrap();
    let mut config: EnvConfig = config(&dir);

    config.encryption_key = Some(SECRET.to_owned());

    assert!(keys::resolve(&config).unwrap().is_some());

    let status: KeyStatus = validate_setup(&config);

    assert_eq!(status.source, KeySource::Configured);
    assert_eq!(status.key_length, SECRET.len());
    assert_eq!(status.level, SecurityLevel::High);
  }

  #[test]
  fn test_short_secret_ignored() {
    let dir: TempDir = TempDir::new().unwrap();
    let mut config: EnvConfig = config(&dir);

    config.encryption_key = Some("short".to_owned());

    assert!(keys::resolve(&config).unwrap().is_none());
    assert_eq!(validate_setup(&config).source, KeySource::None);
  }

  #[test]
  fn test_no_key_required() {
    let dir: TempDir = TempDir::new().unwrap();
    let mut config: EnvConfig = config(&dir);

    config.require_encryption = true;

    let error = keys::resolve(&config).unwrap_err();

    assert_eq!(error.group(), ExceptionGroup::Setup);
  }

  #[test]
  fn test_generated_key_persisted() {
    let dir: TempDir = TempDir::new().unwrap();
    let mut config: EnvConfig = config(&dir);

    config.auto_generate_key = true;

    let first = keys::resolve(&config).unwrap().unwrap();
    let path = keys::key_file_path(&config);
    let mode: u32 = fs::metadata(&path).unwrap().permissions().mode();

    assert_eq!(mode & 0o777, 0o600);
    let stored: String = fs::read_to_string(&path).unwrap();

    assert_eq!(stored.len(), 64);
    assert_eq!(hex::decode(stored.trim()).unwrap().len(), consts::GENERATED_SECRET_LEN);

    // The persisted key is reused.
    let second = keys::resolve(&config).unwrap().unwrap();
    let sealed: String = first.encrypt(b"shared").unwrap();

    assert_eq!(second.decrypt(sealed).unwrap(), b"shared");

    let status: KeyStatus = validate_setup(&config);

    assert_eq!(status.source, KeySource::KeyFile);
    assert!(status.key_file_exists);
    assert!(status.key_file_secure);
    assert_eq!(status.level, SecurityLevel::Medium);
  }

  #[test]
  fn test_insecure_key_file() {
    let dir: TempDir = TempDir::new().unwrap();
    let config: EnvConfig = config(&dir);
    let path = keys::key_file_path(&config);

    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, SECRET).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

    let status: KeyStatus = validate_setup(&config);

    assert_eq!(status.source, KeySource::KeyFile);
    assert!(!status.key_file_secure);
    assert_eq!(status.level, SecurityLevel::Low);
  }
}
