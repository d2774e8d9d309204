#![allow(clippy::field_reassign_with_default)]
// TODO: uncomment when docs are somewhat mature to check for missing docs
// #![warn(missing_docs)]

//! Crate containing train envelope simulation: speed-limit and traction envelopes,
//! physics integration along a path, and running time allowances distributed linearly
//! or to save energy (MARECO).
//! # Features:
//! - logging: debug and warning messages through the `log` crate (default)

#[macro_use]
pub mod macros;

pub mod allowances;
pub mod envelope;
pub mod error;
pub mod imports;
pub mod pipelines;
pub mod prelude;
pub mod scenario;
pub mod search;
pub mod sim;
#[cfg(test)]
pub mod testing;
pub mod traits;
pub mod utils;
pub mod validate;
