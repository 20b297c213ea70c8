//! Shared helpers for the stackflow test suites.

pub mod lattice;

#[cfg(feature = "harness")]
mod harness;

#[cfg(feature = "harness")]
pub use harness::{Harness, Outcome, init_tracing};
