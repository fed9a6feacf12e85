use std::env;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::consts;
use crate::error::Exception;
use crate::ipc::TransportKind;
use crate::runtime::Runtime;

/// Configuration of an [`Environment`].
///
/// [`Environment`]: crate::env::Environment
#[derive(Clone)]
pub struct EnvConfig {
  // ---------------------------------------------------------------------------
  // Execution
  // ---------------------------------------------------------------------------
  /// Runtime to use; detected when `None`.
  pub runtime: Option<Runtime>,
  /// Transport carrying results out of forked children.
  pub transport: TransportKind,
  // ---------------------------------------------------------------------------
  // Encryption
  // ---------------------------------------------------------------------------
  /// Secret from which the IPC encryption key is derived.
  pub encryption_key: Option<String>,
  /// Generate and persist a key when no other key is available.
  pub auto_generate_key: bool,
  /// Directory holding the persisted key file.
  pub key_dir: PathBuf,
  /// Refuse to build an environment without an encryption key.
  pub require_encryption: bool,
  // ---------------------------------------------------------------------------
  // Tracing Subscriber Configuration
  // ---------------------------------------------------------------------------
  pub tracing_source_file: bool,
  pub tracing_source_line: bool,
  pub tracing_source_name: bool,
  pub tracing_thread_info: bool,
  pub tracing_verbose: bool,
  pub tracing_very_verbose: bool,
}

impl EnvConfig {
  #[inline]
  pub fn new() -> Self {
    Self {
      runtime: None,
      transport: TransportKind::File,
      encryption_key: None,
      auto_generate_key: false,
      key_dir: env::temp_dir().join(consts::KEY_DIR_NAME),
      require_encryption: false,
      tracing_source_file: false,
      tracing_source_line: false,
      tracing_source_name: false,
      tracing_thread_info: false,
      tracing_verbose: false,
      tracing_very_verbose: false,
    }
  }

  /// Builds a configuration from the process environment.
  ///
  /// Unset variables keep their defaults; malformed values are reported and
  /// ignored.
  pub fn from_env() -> Self {
    let mut config: Self = Self::new();

    if let Some(runtime) = parse_var::<Runtime>(consts::ENV_RUNTIME) {
      config.runtime = Some(runtime);
    }

    if let Some(transport) = parse_var::<TransportKind>(consts::ENV_TRANSPORT) {
      config.transport = transport;
    }

    if let Some(secret) = read_var(consts::ENV_ENCRYPTION_KEY) {
      config.encryption_key = Some(secret);
    }

    if let Some(enabled) = flag_var(consts::ENV_AUTO_GENERATE_KEY) {
      config.auto_generate_key = enabled;
    }

    if let Some(path) = read_var(consts::ENV_CONFIG_PATH) {
      config.key_dir = PathBuf::from(path);
    }

    if let Some(required) = flag_var(consts::ENV_REQUIRE_ENCRYPTION) {
      config.require_encryption = required;
    }

    config
  }

  #[inline]
  pub const fn tracing_filter(&self) -> tracing::Level {
    if self.tracing_very_verbose {
      tracing::Level::TRACE
    } else if self.tracing_verbose {
      tracing::Level::DEBUG
    } else {
      tracing::Level::INFO
    }
  }
}

impl Default for EnvConfig {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl Debug for EnvConfig {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("EnvConfig")
      .field("runtime", &self.runtime)
      .field("transport", &self.transport)
      .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
      .field("auto_generate_key", &self.auto_generate_key)
      .field("key_dir", &self.key_dir)
      .field("require_encryption", &self.require_encryption)
      .finish_non_exhaustive()
  }
}

// -----------------------------------------------------------------------------
// Variable Parsing
// -----------------------------------------------------------------------------

fn read_var(name: &str) -> Option<String> {
  match env::var(name) {
    Ok(value) if !value.is_empty() => Some(value),
    Ok(_) | Err(env::VarError::NotPresent) => None,
    Err(env::VarError::NotUnicode(_)) => {
      warn!(target: "splinter", variable = name, "ignoring non-unicode environment variable");
      None
    }
  }
}

fn parse_var<T>(name: &str) -> Option<T>
where
  T: FromStr<Err = Exception>,
{
  let value: String = read_var(name)?;

  match value.parse() {
    Ok(parsed) => Some(parsed),
    Err(error) => {
      warn!(target: "splinter", variable = name, %error, "ignoring malformed environment variable");
      None
    }
  }
}

fn flag_var(name: &str) -> Option<bool> {
  let value: String = read_var(name)?;

  match parse_flag(&value) {
    Some(flag) => Some(flag),
    None => {
      warn!(target: "splinter", variable = name, value = %value, "ignoring malformed boolean flag");
      None
    }
  }
}

fn parse_flag(value: &str) -> Option<bool> {
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
