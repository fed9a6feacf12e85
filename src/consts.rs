use std::time::Duration;

// -----------------------------------------------------------------------------
// Exit Codes
// -----------------------------------------------------------------------------

/// Child process exit code: result written to the transport.
pub const E_CODE_SUCCESS: i32 = libc::EXIT_SUCCESS;

/// Child process exit code: the result could not be written.
pub const E_CODE_FAILURE_WRITE: i32 = 70;

// -----------------------------------------------------------------------------
// Promise Behavior
// -----------------------------------------------------------------------------

/// Maximum depth of nested promises unwrapped while settling a result.
///
/// The depth is tracked per thread and carried into forked children, so it
/// bounds nesting across process boundaries as well.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Longest sleep between readiness probes in [`Promise::race`].
///
/// [`Promise::race`]: crate::promise::Promise::race
pub const RACE_POLL_INTERVAL: Duration = Duration::from_millis(2);

// -----------------------------------------------------------------------------
// Channel Behavior
// -----------------------------------------------------------------------------

/// Size (in bytes) of the big-endian length header preceding each frame.
pub const FRAME_HEADER_LEN: usize = 4;

/// Maximum accepted payload size (in bytes) of a single channel frame.
pub const MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

// -----------------------------------------------------------------------------
// IPC Transport
// -----------------------------------------------------------------------------

/// File name prefix for temporary-file transports.
pub const IPC_FILE_PREFIX: &str = "splinter_ipc_";

/// Mask applied to randomly generated shared-memory keys (31-bit range).
pub const IPC_SHM_KEY_MASK: u32 = 0x7FFF_FFFF;

/// Number of attempts made to find an unused shared-memory key.
pub const IPC_SHM_KEY_ATTEMPTS: usize = 16;

// -----------------------------------------------------------------------------
// Encryption
// -----------------------------------------------------------------------------

/// Minimum length of a secret read from the environment or a key file.
pub const MIN_SECRET_LEN: usize = 32;

/// Number of random bytes in an auto-generated secret.
pub const GENERATED_SECRET_LEN: usize = 32;

/// File name of the persisted encryption key.
pub const KEY_FILE_NAME: &str = ".encryption_key";

/// Directory name (under the system temp dir) used when no key dir is set.
pub const KEY_DIR_NAME: &str = "splinter";

// -----------------------------------------------------------------------------
// Environment Variables
// -----------------------------------------------------------------------------

/// Selects the runtime: `sync` or `fork`.
pub const ENV_RUNTIME: &str = "SPLINTER_RUNTIME";

/// Selects the transport: `file`, `pipe`, or `shm`.
pub const ENV_TRANSPORT: &str = "SPLINTER_TRANSPORT";

/// Secret used to derive the IPC encryption key.
pub const ENV_ENCRYPTION_KEY: &str = "SPLINTER_ENCRYPTION_KEY";

/// Enables generating and persisting a key when none is supplied.
pub const ENV_AUTO_GENERATE_KEY: &str = "SPLINTER_AUTO_GENERATE_KEY";

/// Base directory of the persisted key file.
pub const ENV_CONFIG_PATH: &str = "SPLINTER_CONFIG_PATH";

/// Refuses to run IPC unencrypted when set.
pub const ENV_REQUIRE_ENCRYPTION: &str = "SPLINTER_REQUIRE_ENCRYPTION";
