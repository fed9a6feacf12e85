//! Utility functions used throughout the crate.
//!
//! # Contents
//!
//! - [`catch_unwind`]: Runs a fallible closure, converting panics to exceptions
//! - [`measure_fn`]: Times a closure

mod catch_unwind;
mod measure;

pub(crate) use self::catch_unwind::catch_unwind;
pub(crate) use self::measure::measure_fn;
