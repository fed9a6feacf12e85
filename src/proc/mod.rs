//! Process ownership and lifecycle primitives.
//!
//! Thin wrappers over `fork`, `waitpid`, and `kill`, plus [`Owner`], the
//! pid stamp every fork-side resource carries so that copies inherited by a
//! child process stay inert.

mod exit;
mod owner;
mod wait;

pub(crate) use self::exit::ExitCode;
pub(crate) use self::owner::Owner;
pub(crate) use self::wait::Fork;
pub(crate) use self::wait::fork;
pub(crate) use self::wait::terminate;
pub(crate) use self::wait::try_wait;
pub(crate) use self::wait::wait;

pub use self::wait::ProcessExit;
